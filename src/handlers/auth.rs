use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, success_response, validate_input};
use crate::{auth::AuthenticatedCustomer, entities::customer, errors::ApiError, AppState};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "email": "jo@example.com",
    "name": "Jo Walker",
    "password": "a long and private passphrase"
}))]
pub struct RegisterRequest {
    /// Account email, unique per customer
    #[validate(email)]
    #[schema(example = "jo@example.com")]
    pub email: String,
    /// Display name
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Jo Walker")]
    pub name: String,
    /// Account password
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    #[schema(example = "jo@example.com")]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyPasswordRequest {
    #[validate(length(min = 1))]
    pub password: String,
}

/// Customer as returned to clients. Never carries the password hash.
#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[schema(value_type = String, example = "125.50")]
    pub wallet_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<customer::Model> for CustomerResponse {
    fn from(model: customer::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            wallet_balance: model.wallet_balance,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub customer: CustomerResponse,
    /// Bearer token for the Authorization header
    pub token: String,
    /// Token lifetime in seconds
    pub expires_in: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPasswordResponse {
    pub valid: bool,
}

/// Register a new customer account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let customer = state
        .services
        .customers
        .register(&request.email, &request.name, &request.password)
        .await?;
    let token = state
        .auth
        .issue_token(customer.id, &customer.email)
        .map_err(crate::errors::ServiceError::from)?;

    Ok(created_response(AuthResponse {
        customer: customer.into(),
        token,
        expires_in: state.auth.expiration_secs(),
    }))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let customer = state
        .services
        .customers
        .authenticate(&request.email, &request.password)
        .await?;
    let token = state
        .auth
        .issue_token(customer.id, &customer.email)
        .map_err(crate::errors::ServiceError::from)?;

    Ok(success_response(AuthResponse {
        customer: customer.into(),
        token,
        expires_in: state.auth.expiration_secs(),
    }))
}

/// Re-verify the password of the authenticated customer
///
/// Checkout clients call this to pre-validate the confirmation password
/// before submitting the confirm request.
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-password",
    request_body = VerifyPasswordRequest,
    responses(
        (status = 200, description = "Password matches", body = VerifyPasswordResponse),
        (status = 401, description = "Password does not match", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn verify_password(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(request): Json<VerifyPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let valid = state
        .services
        .customers
        .verify_password(customer.customer_id, &request.password)
        .await?;
    if !valid {
        return Err(ApiError::ServiceError(
            crate::errors::ServiceError::Unauthorized("Invalid password".to_string()),
        ));
    }

    Ok(success_response(VerifyPasswordResponse { valid: true }))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-password", post(verify_password))
}
