use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::success_response;
use crate::{
    auth::AuthenticatedCustomer,
    entities::coupon::{self, CouponKind},
    errors::ApiError,
    AppState,
};

/// Coupon as shown when a customer previews a code. Exposes the terms,
/// not the bookkeeping.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CouponResponse {
    #[schema(example = "SAVE10")]
    pub code: String,
    pub kind: CouponKind,
    #[schema(value_type = String, example = "10")]
    pub value: Decimal,
    #[schema(value_type = Option<String>, example = "50.00")]
    pub min_order_amount: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "40.00")]
    pub max_cashback: Option<Decimal>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<coupon::Model> for CouponResponse {
    fn from(model: coupon::Model) -> Self {
        Self {
            code: model.code,
            kind: model.kind,
            value: model.value,
            min_order_amount: model.min_order_amount,
            max_cashback: model.max_cashback,
            expires_at: model.expires_at,
        }
    }
}

/// Look up an active coupon by code
///
/// Unknown, inactive and expired codes all come back 404; clients use
/// this to validate a code before quoting.
#[utoipa::path(
    get,
    path = "/api/v1/coupons/{code}",
    params(("code" = String, Path, description = "Coupon code")),
    responses(
        (status = 200, description = "Active coupon", body = CouponResponse),
        (status = 404, description = "No usable coupon with this code", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    _customer: AuthenticatedCustomer,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state
        .services
        .coupons
        .find_active(code.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Coupon {} not found", code)))?;

    Ok(success_response(CouponResponse::from(coupon)))
}

pub fn coupons_routes() -> Router<AppState> {
    Router::new().route("/:code", get(get_coupon))
}
