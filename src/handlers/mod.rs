pub mod auth;
pub mod checkout;
pub mod common;
pub mod coupons;
pub mod orders;
pub mod shipping;
pub mod wallet;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    config::AppConfig,
    events::EventSender,
    services::{
        catalog::CatalogService,
        checkout::CheckoutService,
        coupons::CouponService,
        customers::CustomerService,
        orders::OrderService,
        pricing::{FeeSchedule, FlatRateSchedule, PricingSettings},
        shipping::{ShipmentRegistrar, ShippingService},
        wallet::WalletService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub customers: CustomerService,
    pub coupons: CouponService,
    pub catalog: CatalogService,
    pub wallet: WalletService,
    pub orders: OrderService,
    pub shipping: ShippingService,
    pub checkout: CheckoutService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Result<Self, crate::errors::ServiceError> {
        let catalog = CatalogService::new(db.clone());
        let coupons = CouponService::new(db.clone());
        let customers = CustomerService::new(db.clone(), event_sender.clone());
        let wallet = WalletService::new(db.clone(), event_sender.clone());
        let shipping = ShippingService::new(db.clone());
        let orders = OrderService::new(db.clone(), wallet.clone(), event_sender.clone());

        let registrar = ShipmentRegistrar::new(db.clone(), event_sender.clone(), config)?;
        let fees: Arc<dyn FeeSchedule> = Arc::new(FlatRateSchedule::from_config(config));
        let settings = PricingSettings::from_config(config);
        let checkout = CheckoutService::new(
            db,
            catalog.clone(),
            coupons.clone(),
            customers.clone(),
            wallet.clone(),
            shipping.clone(),
            registrar,
            fees,
            settings,
            event_sender,
        );

        Ok(Self {
            customers,
            coupons,
            catalog,
            wallet,
            orders,
            shipping,
            checkout,
        })
    }
}
