use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One wallet ledger entry.
///
/// `amount` is signed: credits are positive, debits negative. The sum of a
/// customer's entries always equals `customers.wallet_balance`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    pub kind: WalletTransactionKind,
    pub description: String,
    #[sea_orm(nullable)]
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Wallet ledger entry kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionKind {
    /// Customer-initiated top up (credit)
    #[sea_orm(string_value = "deposit")]
    Deposit,
    /// Customer-initiated withdrawal (debit)
    #[sea_orm(string_value = "withdrawal")]
    Withdrawal,
    /// Order settlement (debit)
    #[sea_orm(string_value = "payment")]
    Payment,
    /// Returned funds for a cancelled or refunded order (credit)
    #[sea_orm(string_value = "refund")]
    Refund,
    /// Coupon reward granted after payment (credit)
    #[sea_orm(string_value = "cashback")]
    Cashback,
}

impl WalletTransactionKind {
    /// Kinds that increase the balance
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::Deposit | Self::Refund | Self::Cashback)
    }
}
