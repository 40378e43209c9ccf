use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Coupon entity
///
/// `value` is a percentage for `Percentage` and `Cashback` coupons and an
/// absolute amount for `Fixed` ones.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub kind: CouponKind,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub min_order_amount: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub max_cashback: Option<Decimal>,
    pub active: bool,
    #[sea_orm(nullable)]
    pub starts_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Coupon kind enumeration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// Deducts a percentage of the subtotal from the total
    #[sea_orm(string_value = "percentage")]
    Percentage,
    /// Deducts a flat amount, clamped to the subtotal
    #[sea_orm(string_value = "fixed")]
    Fixed,
    /// Leaves the total untouched and credits the wallet after payment
    #[sea_orm(string_value = "cashback")]
    Cashback,
}
