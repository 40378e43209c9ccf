// Pure pricing and coupon math
pub mod coupons;
pub mod pricing;

// Catalog and carrier lookups
pub mod catalog;
pub mod shipping;

// Accounts and money
pub mod customers;
pub mod wallet;

// Orders and the checkout orchestrator
pub mod checkout;
pub mod orders;
