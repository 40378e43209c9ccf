use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.3.0",
        description = r#"
# Storefront Checkout & Wallet API

A checkout and settlement API for a storefront where customers pay from a
prepaid wallet or choose cash on delivery.

## Features

- **Accounts**: Customer registration and JWT login
- **Wallet**: Prepaid balance with a full transaction ledger
- **Checkout**: Two-phase flow, quote first, then confirm with your password
- **Coupons**: Percentage and fixed discounts plus cashback codes
- **Orders**: Order history and a fulfilment status machine with wallet refunds
- **Shipping**: Carrier price list and asynchronous shipment registration

## Authentication

Most endpoints require a JWT obtained from `/api/v1/auth/login`. Include it in
the Authorization header:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Errors use a consistent envelope with appropriate HTTP status codes:

```json
{
  "error": "Validation Error",
  "message": "Coupon SAVE10 is not valid",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 20) query
parameters and return a `pagination` block alongside the data.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Auth", description = "Registration and login endpoints"),
        (name = "Checkout", description = "Quote and confirm endpoints"),
        (name = "Orders", description = "Order history and status endpoints"),
        (name = "Wallet", description = "Balance, ledger and deposit endpoints"),
        (name = "Coupons", description = "Coupon lookup endpoints"),
        (name = "Shipping", description = "Carrier listing endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Auth
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::verify_password,

        // Checkout
        crate::handlers::checkout::quote_checkout,
        crate::handlers::checkout::confirm_checkout,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,

        // Wallet
        crate::handlers::wallet::get_wallet,
        crate::handlers::wallet::list_transactions,
        crate::handlers::wallet::deposit,

        // Coupons
        crate::handlers::coupons::get_coupon,

        // Shipping
        crate::handlers::shipping::list_shipping_companies,

        // Health intentionally omitted from OpenAPI paths for now
    ),
    components(
        schemas(
            // Common types
            crate::handlers::common::PaginationMeta,
            crate::handlers::common::PaginatedResponse<crate::handlers::orders::OrderResponse>,
            crate::handlers::common::PaginatedResponse<crate::handlers::wallet::WalletTransactionResponse>,

            // Auth types
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::VerifyPasswordRequest,
            crate::handlers::auth::CustomerResponse,
            crate::handlers::auth::AuthResponse,
            crate::handlers::auth::VerifyPasswordResponse,

            // Checkout types
            crate::handlers::checkout::CheckoutLineRequest,
            crate::handlers::checkout::QuoteCheckoutRequest,
            crate::handlers::checkout::ConfirmCheckoutRequest,
            crate::handlers::checkout::QuoteLineResponse,
            crate::handlers::checkout::QuoteResponse,

            // Order types
            crate::handlers::orders::OrderResponse,
            crate::handlers::orders::OrderItemResponse,
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentStatus,
            crate::entities::order::PaymentMethod,

            // Wallet types
            crate::handlers::wallet::WalletResponse,
            crate::handlers::wallet::WalletTransactionResponse,
            crate::handlers::wallet::DepositRequest,
            crate::handlers::wallet::DepositResponse,
            crate::entities::wallet_transaction::WalletTransactionKind,

            // Coupon types
            crate::handlers::coupons::CouponResponse,
            crate::entities::coupon::CouponKind,

            // Shipping types
            crate::handlers::shipping::ShippingCompanyResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/checkout/confirm"));
        assert!(json.contains("bearer_auth"));
    }
}
