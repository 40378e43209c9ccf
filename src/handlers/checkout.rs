use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{
    common::{created_response, success_response, validate_input},
    orders::OrderResponse,
};
use crate::{
    auth::AuthenticatedCustomer,
    entities::order::PaymentMethod,
    errors::ApiError,
    services::checkout::{CheckoutItem, CheckoutQuote, CheckoutRequest},
    services::pricing::PricedLine,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutLineRequest {
    /// Product the variant belongs to
    pub product_id: Uuid,
    /// Variant SKU within the product
    #[validate(length(min = 1))]
    #[schema(example = "TOTE-NAT-M")]
    pub variant_sku: String,
    #[validate(range(min = 1))]
    #[schema(example = 2)]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "items": [{"product_id": "550e8400-e29b-41d4-a716-446655440000", "variant_sku": "TOTE-NAT-M", "quantity": 2}],
    "shipping_company_id": "660e8400-e29b-41d4-a716-446655440001",
    "delivery_address": "1 Main St, Springfield",
    "payment_method": "wallet",
    "coupon_code": "SAVE10"
}))]
pub struct QuoteCheckoutRequest {
    /// Cart lines; duplicates merge by product and SKU
    #[validate]
    pub items: Vec<CheckoutLineRequest>,
    pub shipping_company_id: Uuid,
    #[validate(length(min = 1, max = 500))]
    pub delivery_address: String,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

impl QuoteCheckoutRequest {
    fn into_service_request(self) -> CheckoutRequest {
        CheckoutRequest {
            items: self
                .items
                .into_iter()
                .map(|line| CheckoutItem {
                    product_id: line.product_id,
                    variant_sku: line.variant_sku,
                    quantity: line.quantity,
                })
                .collect(),
            shipping_company_id: self.shipping_company_id,
            delivery_address: self.delivery_address,
            payment_method: self.payment_method,
            coupon_code: self.coupon_code,
        }
    }
}

/// The quote payload again, plus the account password that authorizes
/// settlement.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmCheckoutRequest {
    #[validate]
    pub items: Vec<CheckoutLineRequest>,
    pub shipping_company_id: Uuid,
    #[validate(length(min = 1, max = 500))]
    pub delivery_address: String,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    /// Account password, re-verified before any money moves
    #[validate(length(min = 1))]
    pub password: String,
}

impl ConfirmCheckoutRequest {
    fn into_service_request(self) -> (CheckoutRequest, String) {
        let request = CheckoutRequest {
            items: self
                .items
                .into_iter()
                .map(|line| CheckoutItem {
                    product_id: line.product_id,
                    variant_sku: line.variant_sku,
                    quantity: line.quantity,
                })
                .collect(),
            shipping_company_id: self.shipping_company_id,
            delivery_address: self.delivery_address,
            payment_method: self.payment_method,
            coupon_code: self.coupon_code,
        };
        (request, self.password)
    }
}

/// A priced cart line as shown to the buyer.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteLineResponse {
    pub product_id: Uuid,
    pub variant_sku: String,
    pub title: String,
    pub image_ref: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String, example = "49.99")]
    pub unit_price: Decimal,
    #[schema(value_type = String, example = "99.98")]
    pub line_total: Decimal,
}

impl From<&PricedLine> for QuoteLineResponse {
    fn from(line: &PricedLine) -> Self {
        Self {
            product_id: line.product_id,
            variant_sku: line.variant_sku.clone(),
            title: line.title.clone(),
            image_ref: line.image_ref.clone(),
            color: line.color.clone(),
            size: line.size.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total,
        }
    }
}

/// Priced quote for the submitted cart. Carries no operational fee
/// fields; those appear only on the stored order.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub lines: Vec<QuoteLineResponse>,
    #[schema(value_type = String, example = "119.97")]
    pub subtotal: Decimal,
    #[schema(value_type = String, example = "18.00")]
    pub vat_amount: Decimal,
    #[schema(value_type = String, example = "9.99")]
    pub shipping_cost: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub discount_amount: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub cashback_amount: Decimal,
    #[schema(value_type = String, example = "147.96")]
    pub total_amount: Decimal,
    #[schema(example = "USD")]
    pub currency: String,
    pub shipping_company_id: Uuid,
    #[schema(example = "Fast Freight")]
    pub shipping_method: String,
    pub coupon_code: Option<String>,
    /// Wallet balance at quote time; present when paying by wallet
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "250.00")]
    pub wallet_balance: Option<Decimal>,
}

impl From<CheckoutQuote> for QuoteResponse {
    fn from(quote: CheckoutQuote) -> Self {
        Self {
            lines: quote.draft.lines.iter().map(QuoteLineResponse::from).collect(),
            subtotal: quote.draft.subtotal,
            vat_amount: quote.draft.vat_amount,
            shipping_cost: quote.draft.shipping_cost,
            discount_amount: quote.draft.discount_amount,
            cashback_amount: quote.draft.cashback_amount,
            total_amount: quote.draft.total_amount,
            currency: quote.draft.currency,
            shipping_company_id: quote.shipping_company_id,
            shipping_method: quote.shipping_method,
            coupon_code: quote.coupon_code,
            wallet_balance: quote.wallet_balance,
        }
    }
}

/// Price a cart without committing to anything
///
/// Lines are re-priced from the catalog and the coupon is applied
/// server-side. Paying by wallet also checks the balance covers the
/// total. Nothing is written.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/quote",
    request_body = QuoteCheckoutRequest,
    responses(
        (status = 200, description = "Priced quote", body = QuoteResponse),
        (status = 400, description = "Invalid cart, coupon or carrier", body = crate::errors::ErrorResponse),
        (status = 402, description = "Wallet balance below total", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown variant or carrier", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn quote_checkout(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(request): Json<QuoteCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let quote = state
        .services
        .checkout
        .quote(customer.customer_id, &request.into_service_request())
        .await?;

    Ok(success_response(QuoteResponse::from(quote)))
}

/// Confirm a checkout and settle payment
///
/// Verifies the account password, re-quotes the cart, then creates the
/// order and settles the wallet in one transaction. A failed debit
/// leaves no order behind.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/confirm",
    request_body = ConfirmCheckoutRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Invalid cart, coupon or carrier", body = crate::errors::ErrorResponse),
        (status = 401, description = "Wrong confirmation password", body = crate::errors::ErrorResponse),
        (status = 402, description = "Wallet balance below total", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn confirm_checkout(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Json(request): Json<ConfirmCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let (service_request, password) = request.into_service_request();
    let (order, items) = state
        .services
        .checkout
        .confirm(customer.customer_id, &service_request, &password)
        .await?;

    Ok(created_response(OrderResponse::from_parts(order, items)))
}

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/quote", post(quote_checkout))
        .route("/confirm", post(confirm_checkout))
}
