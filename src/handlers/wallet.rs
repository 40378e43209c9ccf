use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::common::{
    created_response, success_response, validate_input, PaginatedResponse, PaginationParams,
};
use crate::{
    auth::AuthenticatedCustomer,
    entities::wallet_transaction::{self, WalletTransactionKind},
    errors::ApiError,
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletResponse {
    #[schema(value_type = String, example = "125.50")]
    pub balance: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletTransactionResponse {
    pub id: Uuid,
    /// Signed amount; debits are negative
    #[schema(value_type = String, example = "-147.96")]
    pub amount: Decimal,
    pub kind: WalletTransactionKind,
    #[schema(example = "Payment for order ORD-AB12CD34")]
    pub description: String,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<wallet_transaction::Model> for WalletTransactionResponse {
    fn from(model: wallet_transaction::Model) -> Self {
        Self {
            id: model.id,
            amount: model.amount,
            kind: model.kind,
            description: model.description,
            order_id: model.order_id,
            created_at: model.created_at,
        }
    }
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount_not_positive"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({"amount": "50.00", "description": "Gift card redemption"}))]
pub struct DepositRequest {
    /// Amount to credit; must be positive
    #[validate(custom = "validate_positive_amount")]
    #[schema(value_type = String, example = "50.00")]
    pub amount: Decimal,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DepositResponse {
    #[schema(value_type = String, example = "175.50")]
    pub balance: Decimal,
    pub transaction: WalletTransactionResponse,
}

/// Current wallet balance of the authenticated customer
#[utoipa::path(
    get,
    path = "/api/v1/wallet",
    responses(
        (status = 200, description = "Wallet balance", body = WalletResponse),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn get_wallet(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
) -> Result<impl IntoResponse, ApiError> {
    let balance = state.services.wallet.balance(customer.customer_id).await?;
    Ok(success_response(WalletResponse { balance }))
}

/// Wallet ledger history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/wallet/transactions",
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of ledger entries", body = PaginatedResponse<WalletTransactionResponse>),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = pagination.page();
    let per_page = pagination.per_page_clamped(state.config.api_max_page_size);

    let (entries, total) = state
        .services
        .wallet
        .transactions(customer.customer_id, page, per_page)
        .await?;

    let data: Vec<WalletTransactionResponse> = entries
        .into_iter()
        .map(WalletTransactionResponse::from)
        .collect();
    Ok(success_response(PaginatedResponse::new(
        data, page, per_page, total,
    )))
}

/// Credit the wallet
///
/// Records a deposit ledger entry and returns the updated balance.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/deposit",
    request_body = DepositRequest,
    responses(
        (status = 201, description = "Deposit recorded", body = DepositResponse),
        (status = 400, description = "Non-positive amount", body = crate::errors::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn deposit(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(request): Json<DepositRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let (entry, balance) = state
        .services
        .wallet
        .deposit(customer.customer_id, request.amount, request.description)
        .await?;

    Ok(created_response(DepositResponse {
        balance,
        transaction: entry.into(),
    }))
}

pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wallet))
        .route("/transactions", get(list_transactions))
        .route("/deposit", post(deposit))
}
