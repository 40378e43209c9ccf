//! Shipping companies and the carrier-facing shipment adapter. Shipment
//! registration is a best-effort side effect: it runs after the checkout
//! transaction commits and its failures never reach the customer.

use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    entities::{
        order::{self, Entity as Order},
        shipping_company::{self, Entity as ShippingCompany},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Clone)]
pub struct ShippingService {
    db: Arc<DatabaseConnection>,
}

impl ShippingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Active carriers, cheapest first.
    #[instrument(skip(self))]
    pub async fn list_companies(&self) -> Result<Vec<shipping_company::Model>, ServiceError> {
        let companies = ShippingCompany::find()
            .filter(shipping_company::Column::Active.eq(true))
            .order_by_asc(shipping_company::Column::Price)
            .all(&*self.db)
            .await?;
        Ok(companies)
    }

    /// Resolves the carrier a checkout selected, rejecting unknown and
    /// inactive ones.
    pub async fn require_company(
        &self,
        company_id: Uuid,
    ) -> Result<shipping_company::Model, ServiceError> {
        let company = ShippingCompany::find_by_id(company_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shipping company {} not found", company_id))
            })?;

        if !company.active {
            return Err(ServiceError::ValidationError(format!(
                "Shipping company {} is not available",
                company.name
            )));
        }

        Ok(company)
    }
}

/// Payload posted to the shipping partner.
#[derive(Debug, Clone, Serialize)]
pub struct ShipmentRequest {
    pub order_number: String,
    pub carrier: String,
    pub delivery_address: String,
}

/// Partner response carrying the assigned tracking number.
#[derive(Debug, Clone, Deserialize)]
pub struct ShipmentConfirmation {
    pub tracking_number: String,
}

/// Registers paid orders with the shipping partner, fire-and-forget.
///
/// Retries with exponential backoff; on success the order row records the
/// tracking number and flips `shipment_registered`, on final failure the
/// flag stays false so reconciliation can pick the order up later.
#[derive(Clone)]
pub struct ShipmentRegistrar {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    max_attempts: u32,
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ShipmentRegistrar {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("Failed to build shipping client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.shipping_partner_url.clone(),
            api_key: config.shipping_partner_api_key.clone(),
            max_attempts: config.shipping_retry_attempts.max(1),
            db,
            event_sender,
        })
    }

    /// Spawns registration as a detached task.
    pub fn spawn_registration(&self, order: order::Model) {
        let registrar = self.clone();
        tokio::spawn(async move {
            registrar.register(order).await;
        });
    }

    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn register(&self, order: order::Model) {
        let Some(endpoint) = self.endpoint.clone() else {
            debug!("No shipping partner configured, skipping registration");
            return;
        };

        let request = ShipmentRequest {
            order_number: order.order_number.clone(),
            carrier: order.shipping_method.clone(),
            delivery_address: order.delivery_address.clone(),
        };

        match self.call_partner(&endpoint, &request).await {
            Ok(confirmation) => {
                if let Err(e) = self
                    .persist_registration(order.id, &confirmation.tracking_number)
                    .await
                {
                    error!(order_id = %order.id, "Failed to record shipment registration: {}", e);
                    return;
                }
                info!(
                    order_id = %order.id,
                    tracking_number = %confirmation.tracking_number,
                    "Shipment registered"
                );
                self.event_sender
                    .send_or_log(Event::ShipmentRegistered {
                        order_id: order.id,
                        tracking_number: confirmation.tracking_number,
                    })
                    .await;
            }
            Err(e) => {
                error!(order_id = %order.id, "Shipment registration failed: {}", e);
                self.event_sender
                    .send_or_log(Event::ShipmentRegistrationFailed {
                        order_id: order.id,
                        attempts: self.max_attempts,
                    })
                    .await;
            }
        }
    }

    async fn call_partner(
        &self,
        endpoint: &str,
        request: &ShipmentRequest,
    ) -> Result<ShipmentConfirmation, ServiceError> {
        for attempt in 1..=self.max_attempts {
            let mut builder = self.client.post(endpoint).json(request);
            if let Some(ref key) = self.api_key {
                builder = builder.bearer_auth(key);
            }

            match builder.send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<ShipmentConfirmation>().await {
                        Ok(confirmation) => return Ok(confirmation),
                        Err(e) => {
                            warn!(
                                "Unreadable shipment confirmation: {} (attempt {}/{})",
                                e, attempt, self.max_attempts
                            );
                        }
                    }
                }
                Ok(response) => {
                    warn!(
                        "Shipment registration failed with status: {} (attempt {}/{})",
                        response.status(),
                        attempt,
                        self.max_attempts
                    );
                }
                Err(e) => {
                    warn!(
                        "Shipment registration error: {} (attempt {}/{})",
                        e, attempt, self.max_attempts
                    );
                }
            }

            // Exponential backoff: 1s, 2s, 4s
            if attempt < self.max_attempts {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }

        Err(ServiceError::ExternalServiceError(format!(
            "Shipment registration failed after {} attempts",
            self.max_attempts
        )))
    }

    async fn persist_registration(
        &self,
        order_id: Uuid,
        tracking_number: &str,
    ) -> Result<(), ServiceError> {
        Order::update_many()
            .col_expr(
                order::Column::TrackingNumber,
                Expr::value(tracking_number.to_string()),
            )
            .col_expr(order::Column::ShipmentRegistered, Expr::value(true))
            .col_expr(order::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2_u64.pow(attempt.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn backoff_handles_zero_attempt() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn registrar_builds_from_config() {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let config = AppConfig::new(
            "sqlite://storefront.db?mode=memory".to_string(),
            "storefront_wallet_checkout_jwt_rotation_key_v3_qwertyuiop_zxcvbnm_13579_xK"
                .to_string(),
            "127.0.0.1".to_string(),
            8080,
            "test".to_string(),
        );

        let registrar = ShipmentRegistrar::new(
            Arc::new(DatabaseConnection::Disconnected),
            EventSender::new(tx),
            &config,
        )
        .expect("registrar construction should succeed");
        assert_eq!(registrar.max_attempts, 3);
        assert!(registrar.endpoint.is_none());
    }

    #[test]
    fn shipment_request_serializes_expected_fields() {
        let request = ShipmentRequest {
            order_number: "ORD-AB12CD34".to_string(),
            carrier: "Fast Freight".to_string(),
            delivery_address: "1 Main St, Springfield".to_string(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["order_number"], "ORD-AB12CD34");
        assert_eq!(value["carrier"], "Fast Freight");
        assert_eq!(value["delivery_address"], "1 Main St, Springfield");
    }
}
