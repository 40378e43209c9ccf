//! Wallet ledger. The cached `wallet_balance` on the customer row and the
//! append-only `wallet_transactions` log always move together, inside the
//! same database transaction. Balance changes go through a conditional
//! atomic UPDATE, never a read-check-write sequence.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::{
        customer::{self, Entity as Customer},
        wallet_transaction::{self, Entity as WalletTransaction, WalletTransactionKind},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Clone)]
pub struct WalletService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl WalletService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    pub async fn balance(&self, customer_id: Uuid) -> Result<Decimal, ServiceError> {
        fetch_balance(&*self.db, customer_id).await
    }

    /// Debits the wallet on `conn`, which may be a surrounding transaction.
    ///
    /// The sufficiency check and the subtraction are one conditional UPDATE
    /// (`WHERE id = ? AND wallet_balance >= ?`), so concurrent debits can
    /// never drive the balance negative. A matched row gets a negative
    /// ledger entry on the same connection; no match with an existing
    /// customer is `InsufficientFunds`.
    pub async fn debit<C>(
        &self,
        conn: &C,
        customer_id: Uuid,
        amount: Decimal,
        kind: WalletTransactionKind,
        description: &str,
        order_id: Option<Uuid>,
    ) -> Result<wallet_transaction::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Debit amount must be positive".to_string(),
            ));
        }
        if kind.is_credit() {
            return Err(ServiceError::InvalidOperation(format!(
                "{:?} is not a debit transaction kind",
                kind
            )));
        }

        let result = Customer::update_many()
            .col_expr(
                customer::Column::WalletBalance,
                Expr::col(customer::Column::WalletBalance).sub(amount),
            )
            .col_expr(customer::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(customer::Column::Id.eq(customer_id))
            .filter(customer::Column::WalletBalance.gte(amount))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let available = fetch_balance(conn, customer_id).await?;
            return Err(ServiceError::InsufficientFunds {
                available,
                required: amount,
            });
        }

        self.append_entry(conn, customer_id, -amount, kind, description, order_id)
            .await
    }

    /// Credits the wallet on `conn` and appends the matching ledger entry.
    pub async fn credit<C>(
        &self,
        conn: &C,
        customer_id: Uuid,
        amount: Decimal,
        kind: WalletTransactionKind,
        description: &str,
        order_id: Option<Uuid>,
    ) -> Result<wallet_transaction::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Credit amount must be positive".to_string(),
            ));
        }
        if !kind.is_credit() {
            return Err(ServiceError::InvalidOperation(format!(
                "{:?} is not a credit transaction kind",
                kind
            )));
        }

        let result = Customer::update_many()
            .col_expr(
                customer::Column::WalletBalance,
                Expr::col(customer::Column::WalletBalance).add(amount),
            )
            .col_expr(customer::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(customer::Column::Id.eq(customer_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Customer {} not found",
                customer_id
            )));
        }

        self.append_entry(conn, customer_id, amount, kind, description, order_id)
            .await
    }

    /// Tops up the wallet in its own transaction and reports the new
    /// balance alongside the ledger entry.
    #[instrument(skip(self))]
    pub async fn deposit(
        &self,
        customer_id: Uuid,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<(wallet_transaction::Model, Decimal), ServiceError> {
        let txn = self.db.begin().await?;
        let entry = self
            .credit(
                &txn,
                customer_id,
                amount,
                WalletTransactionKind::Deposit,
                description.as_deref().unwrap_or("Wallet deposit"),
                None,
            )
            .await?;
        let balance = fetch_balance(&txn, customer_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::WalletDeposited {
                customer_id,
                amount,
            })
            .await;

        Ok((entry, balance))
    }

    /// Returns money for an order in its own transaction.
    #[instrument(skip(self))]
    pub async fn refund(
        &self,
        customer_id: Uuid,
        amount: Decimal,
        order_id: Uuid,
        description: &str,
    ) -> Result<wallet_transaction::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let entry = self
            .credit(
                &txn,
                customer_id,
                amount,
                WalletTransactionKind::Refund,
                description,
                Some(order_id),
            )
            .await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::WalletRefunded {
                customer_id,
                amount,
                order_id,
            })
            .await;

        Ok(entry)
    }

    /// Paginated ledger history, newest first. Returns the page of entries
    /// and the total entry count.
    #[instrument(skip(self))]
    pub async fn transactions(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<wallet_transaction::Model>, u64), ServiceError> {
        let page = page.max(1);
        let paginator = WalletTransaction::find()
            .filter(wallet_transaction::Column::CustomerId.eq(customer_id))
            .order_by_desc(wallet_transaction::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(page - 1).await?;

        Ok((entries, total))
    }

    async fn append_entry<C>(
        &self,
        conn: &C,
        customer_id: Uuid,
        amount: Decimal,
        kind: WalletTransactionKind,
        description: &str,
        order_id: Option<Uuid>,
    ) -> Result<wallet_transaction::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let entry = wallet_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            amount: Set(amount),
            kind: Set(kind),
            description: Set(description.to_string()),
            order_id: Set(order_id),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        Ok(entry)
    }
}

async fn fetch_balance<C>(conn: &C, customer_id: Uuid) -> Result<Decimal, ServiceError>
where
    C: ConnectionTrait,
{
    let customer = Customer::find_by_id(customer_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;
    Ok(customer.wallet_balance)
}
