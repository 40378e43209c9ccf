//! Coupon lookup and evaluation. Lookup hits the database; evaluation is
//! pure so both checkout phases apply exactly the same rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::instrument;

use crate::{
    entities::coupon::{self, CouponKind, Entity as Coupon},
    errors::ServiceError,
    services::pricing::round_money,
};

#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Finds a coupon by code, returning it only when it is active and
    /// inside its validity window.
    #[instrument(skip(self))]
    pub async fn find_active(&self, code: &str) -> Result<Option<coupon::Model>, ServiceError> {
        let found = Coupon::find()
            .filter(coupon::Column::Code.eq(code))
            .one(&*self.db)
            .await?;

        Ok(found.filter(|c| is_redeemable(c, Utc::now())))
    }

    /// Resolves a coupon code that the caller expects to work. Unknown,
    /// inactive and expired codes all collapse into one validation error
    /// so responses do not reveal which codes exist.
    pub async fn require_active(&self, code: &str) -> Result<coupon::Model, ServiceError> {
        self.find_active(code)
            .await?
            .ok_or_else(|| ServiceError::ValidationError(format!("Coupon {} is not valid", code)))
    }
}

fn is_redeemable(coupon: &coupon::Model, now: DateTime<Utc>) -> bool {
    if !coupon.active {
        return false;
    }
    if let Some(starts_at) = coupon.starts_at {
        if now < starts_at {
            return false;
        }
    }
    if let Some(expires_at) = coupon.expires_at {
        if now >= expires_at {
            return false;
        }
    }
    true
}

/// What a coupon yields against a given subtotal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CouponOutcome {
    /// Amount subtracted from the order total.
    pub discount_amount: Decimal,
    /// Amount credited back to the wallet after payment.
    pub cashback_amount: Decimal,
}

/// Applies a coupon to a subtotal.
///
/// A coupon whose minimum order amount is not met yields a zero outcome
/// rather than an error; the customer keeps the code attached and simply
/// gets nothing from it. Discounts never exceed the subtotal.
pub fn evaluate(subtotal: Decimal, coupon: Option<&coupon::Model>) -> CouponOutcome {
    let Some(coupon) = coupon else {
        return CouponOutcome::default();
    };

    if let Some(min) = coupon.min_order_amount {
        if subtotal < min {
            return CouponOutcome::default();
        }
    }

    match coupon.kind {
        CouponKind::Percentage => {
            let discount = round_money(subtotal * coupon.value / Decimal::ONE_HUNDRED);
            CouponOutcome {
                discount_amount: discount.min(subtotal),
                cashback_amount: Decimal::ZERO,
            }
        }
        CouponKind::Fixed => CouponOutcome {
            discount_amount: coupon.value.min(subtotal),
            cashback_amount: Decimal::ZERO,
        },
        CouponKind::Cashback => {
            let raw = round_money(subtotal * coupon.value / Decimal::ONE_HUNDRED);
            let cashback = match coupon.max_cashback {
                Some(cap) => raw.min(cap),
                None => raw,
            };
            CouponOutcome {
                discount_amount: Decimal::ZERO,
                cashback_amount: cashback,
            }
        }
    }
}
