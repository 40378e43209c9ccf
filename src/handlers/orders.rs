use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{success_response, PaginatedResponse, PaginationParams};
use crate::{
    auth::AuthenticatedCustomer,
    entities::{
        order::{self, OrderStatus, PaymentMethod, PaymentStatus},
        order_item,
    },
    errors::ApiError,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub variant_sku: String,
    pub title: String,
    pub image_ref: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String, example = "49.99")]
    pub unit_price: Decimal,
    #[schema(value_type = String, example = "34.99")]
    pub unit_cost: Decimal,
    #[schema(value_type = String, example = "99.98")]
    pub line_total: Decimal,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(model: order_item::Model) -> Self {
        Self {
            product_id: model.product_id,
            variant_sku: model.variant_sku,
            title: model.title,
            image_ref: model.image_ref,
            color: model.color,
            size: model.size,
            quantity: model.quantity,
            unit_price: model.unit_price,
            unit_cost: model.unit_cost,
            line_total: model.line_total,
        }
    }
}

/// Full order record. List responses omit `items`; the detail endpoint
/// and checkout confirmation include them.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    #[schema(example = "ORD-AB12CD34")]
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
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
    #[schema(value_type = String, example = "2.96")]
    pub processor_fee: Decimal,
    #[schema(value_type = String, example = "14.80")]
    pub net_margin: Decimal,
    #[schema(value_type = String, example = "147.96")]
    pub total_amount: Decimal,
    #[schema(example = "USD")]
    pub currency: String,
    pub coupon_code: Option<String>,
    pub shipping_company_id: Uuid,
    pub shipping_method: String,
    pub delivery_address: String,
    pub tracking_number: Option<String>,
    pub shipment_registered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub fn from_order(order: order::Model) -> Self {
        Self::from_parts(order, Vec::new())
    }

    pub fn from_parts(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            subtotal: order.subtotal,
            vat_amount: order.vat_amount,
            shipping_cost: order.shipping_cost,
            discount_amount: order.discount_amount,
            cashback_amount: order.cashback_amount,
            processor_fee: order.processor_fee,
            net_margin: order.net_margin,
            total_amount: order.total_amount,
            currency: order.currency,
            coupon_code: order.coupon_code,
            shipping_company_id: order.shipping_company_id,
            shipping_method: order.shipping_method,
            delivery_address: order.delivery_address,
            tracking_number: order.tracking_number,
            shipment_registered: order.shipment_registered,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// Target status; only transitions the status machine allows succeed
    pub status: OrderStatus,
}

/// List the authenticated customer's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of orders", body = PaginatedResponse<OrderResponse>),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = pagination.page();
    let per_page = pagination.per_page_clamped(state.config.api_max_page_size);

    let (orders, total) = state
        .services
        .orders
        .list_for_customer(customer.customer_id, page, per_page)
        .await?;

    let data: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from_order).collect();
    Ok(success_response(PaginatedResponse::new(
        data, page, per_page, total,
    )))
}

/// Fetch one of the authenticated customer's orders with its items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items", body = OrderResponse),
        (status = 404, description = "No such order for this customer", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (order, items) = state
        .services
        .orders
        .get_for_customer(id, customer.customer_id)
        .await?;

    Ok(success_response(OrderResponse::from_parts(order, items)))
}

/// Transition an order's status
///
/// Rejects transitions the status machine forbids. Cancelling a paid
/// wallet order refunds the net charge to the wallet.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderResponse),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    customer: AuthenticatedCustomer,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .services
        .orders
        .update_status(id, customer.customer_id, request.status)
        .await?;

    Ok(success_response(OrderResponse::from_order(updated)))
}

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", post(update_order_status))
}
