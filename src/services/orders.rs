use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        order::{self, Entity as Order, OrderStatus, PaymentMethod, PaymentStatus},
        order_item::{self, Entity as OrderItem},
        wallet_transaction::WalletTransactionKind,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::wallet::WalletService,
};

/// Order reads and the status transition machine. Orders are created only
/// by checkout; everything here operates on existing rows.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    wallet: WalletService,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        wallet: WalletService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            wallet,
            event_sender,
        }
    }

    pub async fn get(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    pub async fn items(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    /// Fetches an order with its items for the owning customer. Orders
    /// belonging to someone else look exactly like missing ones.
    #[instrument(skip(self))]
    pub async fn get_for_customer(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = self.items(order.id).await?;
        Ok((order, items))
    }

    /// Paginated order history for a customer, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_customer(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let page = page.max(1);
        let paginator = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok((orders, total))
    }

    /// Applies a status transition for the owning customer, rejecting any
    /// move the status machine does not allow. Orders belonging to someone
    /// else look exactly like missing ones. Cancelling a paid wallet order
    /// refunds the net charge (total minus the cashback the customer keeps)
    /// in the same transaction as the status change.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot transition order from {} to {}",
                old_status, new_status
            )));
        }

        let order_number = order.order_number.clone();
        let needs_refund = new_status == OrderStatus::Cancelled
            && order.payment_status == PaymentStatus::Paid
            && order.payment_method == PaymentMethod::Wallet;
        let refund_amount = order.total_amount - order.cashback_amount;

        let mut update: order::ActiveModel = order.into();
        update.status = Set(new_status);
        update.updated_at = Set(Utc::now());
        let updated = update.update(&txn).await?;

        if needs_refund && refund_amount > Decimal::ZERO {
            self.wallet
                .credit(
                    &txn,
                    customer_id,
                    refund_amount,
                    WalletTransactionKind::Refund,
                    &format!("Refund for cancelled order {}", order_number),
                    Some(order_id),
                )
                .await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;
        if needs_refund && refund_amount > Decimal::ZERO {
            self.event_sender
                .send_or_log(Event::WalletRefunded {
                    customer_id,
                    amount: refund_amount,
                    order_id,
                })
                .await;
        }

        info!(%order_id, %old_status, %new_status, "Order status updated");
        Ok(updated)
    }
}
