pub mod coupon;
pub mod customer;
pub mod order;
pub mod order_item;
pub mod product_variant;
pub mod shipping_company;
pub mod wallet_transaction;
