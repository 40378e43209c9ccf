use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth,
    entities::customer::{self, Entity as Customer},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Customer accounts: registration, credential checks and lookups.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates an account with a zero wallet balance. Emails are stored
    /// lowercased; a duplicate registers as a conflict.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<customer::Model, ServiceError> {
        let email = email.trim().to_lowercase();

        let existing = Customer::find()
            .filter(customer::Column::Email.eq(&email))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Email {} is already registered",
                email
            )));
        }

        let password_hash = auth::hash_password(password)?;
        let now = Utc::now();
        let created = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            name: Set(name.to_string()),
            password_hash: Set(password_hash),
            wallet_balance: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::CustomerRegistered(created.id))
            .await;
        info!(customer_id = %created.id, "Registered new customer");

        Ok(created)
    }

    /// Checks an email/password pair. Unknown emails and wrong passwords
    /// produce the same error so login responses do not reveal which
    /// addresses have accounts.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<customer::Model, ServiceError> {
        let email = email.trim().to_lowercase();
        let customer = Customer::find()
            .filter(customer::Column::Email.eq(&email))
            .one(&*self.db)
            .await?;

        let Some(customer) = customer else {
            return Err(ServiceError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        };

        if auth::verify_password(password, &customer.password_hash)? {
            Ok(customer)
        } else {
            Err(ServiceError::Unauthorized(
                "Invalid email or password".to_string(),
            ))
        }
    }

    pub async fn get(&self, customer_id: Uuid) -> Result<customer::Model, ServiceError> {
        Customer::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))
    }

    /// Re-checks the password of an already-authenticated customer. The
    /// confirm step of checkout gates the wallet debit on this.
    #[instrument(skip(self, password))]
    pub async fn verify_password(
        &self,
        customer_id: Uuid,
        password: &str,
    ) -> Result<bool, ServiceError> {
        let customer = self.get(customer_id).await?;
        Ok(auth::verify_password(password, &customer.password_hash)?)
    }
}
