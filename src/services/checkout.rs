//! Two-phase checkout orchestration.
//!
//! **Quote** re-prices the submitted cart against the catalog, applies the
//! coupon and checks wallet sufficiency without writing anything.
//! **Confirm** re-verifies the account password, re-quotes, then settles in
//! one database transaction: order + items insert, conditional wallet
//! debit, cashback credit and the paid flag all commit or roll back as a
//! unit. Shipment registration happens after commit, fire-and-forget.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        order::{self, OrderStatus, PaymentMethod, PaymentStatus},
        order_item,
        wallet_transaction::WalletTransactionKind,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        catalog::CatalogService,
        coupons::{self, CouponService},
        customers::CustomerService,
        pricing::{self, FeeSchedule, OrderDraft, PricedLine, PricingSettings},
        shipping::{ShipmentRegistrar, ShippingService},
        wallet::WalletService,
    },
};

/// One cart line as the client submits it. Prices are never part of the
/// payload; checkout looks them up itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub variant_sku: String,
    pub quantity: i32,
}

/// Checkout input shared by both phases.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub shipping_company_id: Uuid,
    pub delivery_address: String,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

/// A priced quote. Nothing has been written; the client replays the same
/// payload to confirm.
#[derive(Debug, Clone)]
pub struct CheckoutQuote {
    pub draft: OrderDraft,
    pub shipping_company_id: Uuid,
    pub shipping_method: String,
    pub coupon_code: Option<String>,
    /// Present when paying by wallet.
    pub wallet_balance: Option<Decimal>,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    catalog: CatalogService,
    coupons: CouponService,
    customers: CustomerService,
    wallet: WalletService,
    shipping: ShippingService,
    registrar: ShipmentRegistrar,
    fees: Arc<dyn FeeSchedule>,
    settings: PricingSettings,
    event_sender: EventSender,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: CatalogService,
        coupons: CouponService,
        customers: CustomerService,
        wallet: WalletService,
        shipping: ShippingService,
        registrar: ShipmentRegistrar,
        fees: Arc<dyn FeeSchedule>,
        settings: PricingSettings,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            catalog,
            coupons,
            customers,
            wallet,
            shipping,
            registrar,
            fees,
            settings,
            event_sender,
        }
    }

    /// Prices the submitted cart without side effects.
    ///
    /// Re-prices every line from the catalog, resolves carrier and coupon,
    /// and when paying by wallet rejects quotes the balance cannot cover.
    #[instrument(skip(self, request), fields(customer_id = %customer_id))]
    pub async fn quote(
        &self,
        customer_id: Uuid,
        request: &CheckoutRequest,
    ) -> Result<CheckoutQuote, ServiceError> {
        validate_request(request)?;
        let merged = merge_items(&request.items)?;

        let company = self
            .shipping
            .require_company(request.shipping_company_id)
            .await?;

        let coupon_code = normalized_coupon_code(request).map(str::to_string);
        let coupon = match coupon_code.as_deref() {
            Some(code) => Some(self.coupons.require_active(code).await?),
            None => None,
        };

        let mut lines = Vec::with_capacity(merged.len());
        for item in &merged {
            let variant = self
                .catalog
                .require_active_variant(item.product_id, &item.variant_sku)
                .await?;
            lines.push(PricedLine::from_variant(
                &variant,
                item.quantity,
                self.fees.as_ref(),
            ));
        }

        let outcome = coupons::evaluate(pricing::subtotal_of(&lines), coupon.as_ref());
        let draft = pricing::build_draft(
            lines,
            company.price,
            outcome.discount_amount,
            outcome.cashback_amount,
            &self.settings,
            self.fees.as_ref(),
        );

        let wallet_balance = match request.payment_method {
            PaymentMethod::Wallet => {
                let balance = self.wallet.balance(customer_id).await?;
                if balance < draft.total_amount {
                    return Err(ServiceError::InsufficientFunds {
                        available: balance,
                        required: draft.total_amount,
                    });
                }
                Some(balance)
            }
            PaymentMethod::CashOnDelivery => None,
        };

        Ok(CheckoutQuote {
            draft,
            shipping_company_id: company.id,
            shipping_method: company.name,
            coupon_code,
            wallet_balance,
        })
    }

    /// Confirms a checkout: password gate, fresh quote, then the
    /// all-or-nothing settlement transaction.
    ///
    /// A failed wallet debit rolls back the order and its items; no
    /// pending order survives a rejected payment. Cash on delivery skips
    /// the debit and leaves the order pending payment.
    #[instrument(skip(self, request, password), fields(customer_id = %customer_id))]
    pub async fn confirm(
        &self,
        customer_id: Uuid,
        request: &CheckoutRequest,
        password: &str,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        if password.is_empty() {
            return Err(ServiceError::Unauthorized("Invalid password".to_string()));
        }
        if !self.customers.verify_password(customer_id, password).await? {
            return Err(ServiceError::Unauthorized("Invalid password".to_string()));
        }

        // Amounts come from a fresh quote, never from the client.
        let quote = self.quote(customer_id, request).await?;
        let draft = &quote.draft;

        let order_id = Uuid::new_v4();
        let order_number = format!("ORD-{}", order_id.to_string()[..8].to_uppercase());
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let mut created = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            customer_id: Set(customer_id),
            status: Set(OrderStatus::New),
            payment_status: Set(PaymentStatus::Pending),
            payment_method: Set(request.payment_method),
            subtotal: Set(draft.subtotal),
            vat_amount: Set(draft.vat_amount),
            shipping_cost: Set(draft.shipping_cost),
            discount_amount: Set(draft.discount_amount),
            cashback_amount: Set(draft.cashback_amount),
            processor_fee: Set(draft.processor_fee),
            net_margin: Set(draft.net_margin),
            total_amount: Set(draft.total_amount),
            currency: Set(draft.currency.clone()),
            coupon_code: Set(quote.coupon_code.clone()),
            shipping_company_id: Set(quote.shipping_company_id),
            shipping_method: Set(quote.shipping_method.clone()),
            delivery_address: Set(request.delivery_address.trim().to_string()),
            tracking_number: Set(None),
            shipment_registered: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                variant_sku: Set(line.variant_sku.clone()),
                title: Set(line.title.clone()),
                image_ref: Set(line.image_ref.clone()),
                color: Set(line.color.clone()),
                size: Set(line.size.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                unit_cost: Set(line.unit_cost),
                line_total: Set(line.line_total),
                created_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        if request.payment_method == PaymentMethod::Wallet {
            // Conditional atomic debit; failure rolls back the order rows.
            self.wallet
                .debit(
                    &txn,
                    customer_id,
                    draft.total_amount,
                    WalletTransactionKind::Payment,
                    &format!("Payment for order {}", order_number),
                    Some(order_id),
                )
                .await?;

            if draft.cashback_amount > Decimal::ZERO {
                self.wallet
                    .credit(
                        &txn,
                        customer_id,
                        draft.cashback_amount,
                        WalletTransactionKind::Cashback,
                        &format!("Cashback for order {}", order_number),
                        Some(order_id),
                    )
                    .await?;
            }

            let mut mark_paid: order::ActiveModel = created.into();
            mark_paid.payment_status = Set(PaymentStatus::Paid);
            mark_paid.updated_at = Set(Utc::now());
            created = mark_paid.update(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        if created.payment_status == PaymentStatus::Paid {
            self.event_sender
                .send_or_log(Event::WalletDebited {
                    customer_id,
                    amount: draft.total_amount,
                    order_id,
                })
                .await;
            self.event_sender.send_or_log(Event::OrderPaid(order_id)).await;
            if draft.cashback_amount > Decimal::ZERO {
                self.event_sender
                    .send_or_log(Event::CashbackGranted {
                        customer_id,
                        amount: draft.cashback_amount,
                        order_id,
                    })
                    .await;
            }
        }

        self.registrar.spawn_registration(created.clone());

        info!(
            %order_id,
            %order_number,
            total = %created.total_amount,
            payment_method = ?created.payment_method,
            "Checkout confirmed"
        );

        Ok((created, items))
    }
}

fn validate_request(request: &CheckoutRequest) -> Result<(), ServiceError> {
    if request.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "Checkout requires at least one item".to_string(),
        ));
    }
    if request.items.iter().any(|item| item.quantity < 1) {
        return Err(ServiceError::ValidationError(
            "Item quantities must be at least 1".to_string(),
        ));
    }
    if request.delivery_address.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Delivery address must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Merges duplicate cart lines by (product, SKU), preserving first-seen
/// order, so the stored order satisfies the per-order item uniqueness.
fn merge_items(items: &[CheckoutItem]) -> Result<Vec<CheckoutItem>, ServiceError> {
    let mut merged: Vec<CheckoutItem> = Vec::with_capacity(items.len());
    for item in items {
        match merged
            .iter_mut()
            .find(|m| m.product_id == item.product_id && m.variant_sku == item.variant_sku)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(item.quantity).ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Combined quantity for SKU {} is too large",
                        item.variant_sku
                    ))
                })?;
            }
            None => merged.push(item.clone()),
        }
    }
    Ok(merged)
}

fn normalized_coupon_code(request: &CheckoutRequest) -> Option<&str> {
    request
        .coupon_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: Uuid, sku: &str, quantity: i32) -> CheckoutItem {
        CheckoutItem {
            product_id,
            variant_sku: sku.to_string(),
            quantity,
        }
    }

    fn request(items: Vec<CheckoutItem>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            shipping_company_id: Uuid::new_v4(),
            delivery_address: "1 Main St".to_string(),
            payment_method: PaymentMethod::Wallet,
            coupon_code: None,
        }
    }

    #[test]
    fn merge_combines_duplicate_lines_preserving_order() {
        let product_a = Uuid::new_v4();
        let product_b = Uuid::new_v4();

        let merged = merge_items(&[
            item(product_a, "SKU-1", 2),
            item(product_b, "SKU-2", 1),
            item(product_a, "SKU-1", 3),
        ])
        .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].variant_sku, "SKU-1");
        assert_eq!(merged[0].quantity, 5);
        assert_eq!(merged[1].variant_sku, "SKU-2");
        assert_eq!(merged[1].quantity, 1);
    }

    #[test]
    fn merge_keeps_same_sku_of_different_products_apart() {
        let product_a = Uuid::new_v4();
        let product_b = Uuid::new_v4();

        let merged =
            merge_items(&[item(product_a, "SKU-1", 1), item(product_b, "SKU-1", 1)]).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_rejects_quantities_that_overflow() {
        let product = Uuid::new_v4();

        let result = merge_items(&[
            item(product, "SKU-1", 2_000_000_000),
            item(product, "SKU-1", 2_000_000_000),
        ]);

        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[test]
    fn validate_rejects_empty_cart() {
        let result = validate_request(&request(vec![]));
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[test]
    fn validate_rejects_non_positive_quantity() {
        let result = validate_request(&request(vec![item(Uuid::new_v4(), "SKU-1", 0)]));
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[test]
    fn validate_rejects_blank_address() {
        let mut req = request(vec![item(Uuid::new_v4(), "SKU-1", 1)]);
        req.delivery_address = "   ".to_string();
        assert!(matches!(
            validate_request(&req),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn blank_coupon_code_counts_as_absent() {
        let mut req = request(vec![item(Uuid::new_v4(), "SKU-1", 1)]);
        req.coupon_code = Some("   ".to_string());
        assert_eq!(normalized_coupon_code(&req), None);

        req.coupon_code = Some(" SAVE10 ".to_string());
        assert_eq!(normalized_coupon_code(&req), Some("SAVE10"));
    }
}
