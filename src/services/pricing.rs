//! Order pricing: line totals, VAT, fees and the draft that both checkout
//! phases share. All arithmetic is `Decimal`; money values round to two
//! decimal places, half away from zero.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, entities::product_variant};

/// Rounds a money amount to two decimal places, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Fee policy applied to an order total.
///
/// Implementations compute the payment processor fee withheld per order,
/// the margin retained after fees, and the cost assumed for a variant with
/// no recorded cost.
pub trait FeeSchedule: Send + Sync {
    fn processor_fee(&self, total: Decimal) -> Decimal;
    fn net_margin(&self, total: Decimal) -> Decimal;
    fn fallback_unit_cost(&self, unit_price: Decimal) -> Decimal;
}

/// Flat percentage fee schedule: a fixed rate of the order total for the
/// processor fee and the net margin, and a fixed fraction of the sale
/// price for the assumed cost.
#[derive(Debug, Clone)]
pub struct FlatRateSchedule {
    processor_fee_rate: Decimal,
    net_margin_rate: Decimal,
    item_cost_factor: Decimal,
}

impl Default for FlatRateSchedule {
    fn default() -> Self {
        Self {
            processor_fee_rate: Decimal::new(2, 2),
            net_margin_rate: Decimal::new(10, 2),
            item_cost_factor: Decimal::new(70, 2),
        }
    }
}

impl FlatRateSchedule {
    pub fn new(
        processor_fee_rate: Decimal,
        net_margin_rate: Decimal,
        item_cost_factor: Decimal,
    ) -> Self {
        Self {
            processor_fee_rate,
            net_margin_rate,
            item_cost_factor,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let defaults = Self::default();
        Self {
            processor_fee_rate: Decimal::from_f64(config.processor_fee_rate)
                .unwrap_or(defaults.processor_fee_rate),
            net_margin_rate: Decimal::from_f64(config.net_margin_rate)
                .unwrap_or(defaults.net_margin_rate),
            item_cost_factor: Decimal::from_f64(config.item_cost_factor)
                .unwrap_or(defaults.item_cost_factor),
        }
    }
}

impl FeeSchedule for FlatRateSchedule {
    fn processor_fee(&self, total: Decimal) -> Decimal {
        round_money(total * self.processor_fee_rate)
    }

    fn net_margin(&self, total: Decimal) -> Decimal {
        round_money(total * self.net_margin_rate)
    }

    fn fallback_unit_cost(&self, unit_price: Decimal) -> Decimal {
        round_money(unit_price * self.item_cost_factor)
    }
}

/// VAT rate and currency applied to every draft.
#[derive(Debug, Clone)]
pub struct PricingSettings {
    pub vat_rate: Decimal,
    pub currency: String,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            vat_rate: Decimal::new(15, 2),
            currency: "USD".to_string(),
        }
    }
}

impl PricingSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let defaults = Self::default();
        Self {
            vat_rate: Decimal::from_f64(config.vat_rate).unwrap_or(defaults.vat_rate),
            currency: config.default_currency.clone(),
        }
    }
}

/// A cart line priced against the catalog at quote time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub variant_sku: String,
    pub title: String,
    pub image_ref: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub line_total: Decimal,
}

impl PricedLine {
    /// Prices a quantity of a catalog variant. Cost falls back to the fee
    /// schedule's assumed fraction of the sale price when the variant has
    /// none recorded.
    pub fn from_variant(
        variant: &product_variant::Model,
        quantity: i32,
        fees: &dyn FeeSchedule,
    ) -> Self {
        let unit_cost = variant
            .cost
            .unwrap_or_else(|| fees.fallback_unit_cost(variant.price));

        Self {
            product_id: variant.product_id,
            variant_sku: variant.sku.clone(),
            title: variant.title.clone(),
            image_ref: variant.image_ref.clone(),
            color: variant.color.clone(),
            size: variant.size.clone(),
            quantity,
            unit_price: variant.price,
            unit_cost,
            line_total: variant.price * Decimal::from(quantity),
        }
    }
}

pub fn subtotal_of(lines: &[PricedLine]) -> Decimal {
    lines.iter().map(|line| line.line_total).sum()
}

/// Fully priced order, shared by the quote and confirm phases. Confirm
/// recomputes the draft from current data rather than trusting amounts
/// echoed back by the client.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDraft {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub vat_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub cashback_amount: Decimal,
    pub processor_fee: Decimal,
    pub net_margin: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
}

/// Assembles the priced draft.
///
/// VAT applies to the undiscounted subtotal. The discount is assumed to be
/// clamped to the subtotal already, so the total never goes negative.
pub fn build_draft(
    lines: Vec<PricedLine>,
    shipping_cost: Decimal,
    discount_amount: Decimal,
    cashback_amount: Decimal,
    settings: &PricingSettings,
    fees: &dyn FeeSchedule,
) -> OrderDraft {
    let subtotal = subtotal_of(&lines);
    let vat_amount = round_money(subtotal * settings.vat_rate);
    let total_amount = subtotal + vat_amount + shipping_cost - discount_amount;

    OrderDraft {
        lines,
        subtotal,
        vat_amount,
        shipping_cost,
        discount_amount,
        cashback_amount,
        processor_fee: fees.processor_fee(total_amount),
        net_margin: fees.net_margin(total_amount),
        total_amount,
        currency: settings.currency.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn variant(price: Decimal, cost: Option<Decimal>) -> product_variant::Model {
        product_variant::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            sku: "SKU-1".to_string(),
            title: "Canvas Tote".to_string(),
            image_ref: None,
            color: Some("natural".to_string()),
            size: None,
            price,
            cost,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
        assert_eq!(round_money(dec!(17.9955)), dec!(18.00));
    }

    #[test]
    fn unit_cost_prefers_recorded_cost() {
        let fees = FlatRateSchedule::default();

        let with_cost = PricedLine::from_variant(&variant(dec!(10.00), Some(dec!(6.50))), 1, &fees);
        assert_eq!(with_cost.unit_cost, dec!(6.50));

        let without_cost = PricedLine::from_variant(&variant(dec!(10.00), None), 1, &fees);
        assert_eq!(without_cost.unit_cost, dec!(7.00));
    }

    #[test]
    fn line_total_scales_with_quantity() {
        let fees = FlatRateSchedule::default();
        let line = PricedLine::from_variant(&variant(dec!(49.99), None), 3, &fees);
        assert_eq!(line.line_total, dec!(149.97));
    }

    #[test]
    fn draft_without_discount() {
        let fees = FlatRateSchedule::default();
        let settings = PricingSettings::default();
        let lines = vec![
            PricedLine::from_variant(&variant(dec!(49.99), None), 2, &fees),
            PricedLine::from_variant(&variant(dec!(19.99), None), 1, &fees),
        ];

        let draft = build_draft(
            lines,
            dec!(9.99),
            Decimal::ZERO,
            Decimal::ZERO,
            &settings,
            &fees,
        );

        assert_eq!(draft.subtotal, dec!(119.97));
        assert_eq!(draft.vat_amount, dec!(18.00));
        assert_eq!(draft.total_amount, dec!(147.96));
        assert_eq!(draft.processor_fee, dec!(2.96));
        assert_eq!(draft.net_margin, dec!(14.80));
        assert_eq!(draft.currency, "USD");
    }

    #[test]
    fn draft_applies_discount_after_vat() {
        let fees = FlatRateSchedule::default();
        let settings = PricingSettings::default();
        let lines = vec![PricedLine::from_variant(&variant(dec!(100.00), None), 2, &fees)];

        let draft = build_draft(
            lines,
            dec!(5.00),
            dec!(20.00),
            Decimal::ZERO,
            &settings,
            &fees,
        );

        // VAT is charged on the undiscounted subtotal.
        assert_eq!(draft.subtotal, dec!(200.00));
        assert_eq!(draft.vat_amount, dec!(30.00));
        assert_eq!(draft.total_amount, dec!(215.00));
        assert_eq!(draft.processor_fee, dec!(4.30));
        assert_eq!(draft.net_margin, dec!(21.50));
    }

    #[test]
    fn cashback_rides_along_without_reducing_total() {
        let fees = FlatRateSchedule::default();
        let settings = PricingSettings::default();
        let lines = vec![PricedLine::from_variant(&variant(dec!(80.00), None), 1, &fees)];

        let draft = build_draft(
            lines,
            dec!(7.50),
            Decimal::ZERO,
            dec!(3.00),
            &settings,
            &fees,
        );

        assert_eq!(draft.cashback_amount, dec!(3.00));
        assert_eq!(draft.total_amount, dec!(99.50));
    }

    #[test]
    fn discount_equal_to_subtotal_keeps_total_non_negative() {
        let fees = FlatRateSchedule::default();
        let settings = PricingSettings::default();
        let lines = vec![PricedLine::from_variant(&variant(dec!(40.00), None), 1, &fees)];

        let draft = build_draft(
            lines,
            Decimal::ZERO,
            dec!(40.00),
            Decimal::ZERO,
            &settings,
            &fees,
        );

        // 40.00 + 6.00 VAT - 40.00 discount
        assert_eq!(draft.total_amount, dec!(6.00));
        assert!(draft.total_amount >= Decimal::ZERO);
    }
}
