use axum::{extract::State, response::IntoResponse, routing::get, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::success_response;
use crate::{entities::shipping_company, errors::ApiError, AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ShippingCompanyResponse {
    pub id: Uuid,
    #[schema(example = "Fast Freight")]
    pub name: String,
    #[schema(value_type = String, example = "9.99")]
    pub price: Decimal,
    #[schema(example = 3)]
    pub estimated_days: i32,
}

impl From<shipping_company::Model> for ShippingCompanyResponse {
    fn from(model: shipping_company::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: model.price,
            estimated_days: model.estimated_days,
        }
    }
}

/// Active shipping companies, cheapest first
#[utoipa::path(
    get,
    path = "/api/v1/shipping-companies",
    responses(
        (status = 200, description = "Available carriers", body = [ShippingCompanyResponse])
    ),
    tag = "Shipping"
)]
pub async fn list_shipping_companies(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let companies = state.services.shipping.list_companies().await?;
    let data: Vec<ShippingCompanyResponse> = companies
        .into_iter()
        .map(ShippingCompanyResponse::from)
        .collect();
    Ok(success_response(data))
}

pub fn shipping_routes() -> Router<AppState> {
    Router::new().route("/", get(list_shipping_companies))
}
