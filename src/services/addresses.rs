use crate::{
    entities::{address, Address, AddressModel, User},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Fields accepted when creating an address. Format validation (pincode,
/// mobile) happens at the handler boundary; the service receives parsed
/// values.
#[derive(Debug, Clone)]
pub struct CreateAddressInput {
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub pincode: String,
    pub mobile: i64,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateAddressInput {
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
    pub mobile: Option<i64>,
}

/// Delivery address store. Deletion is a status flip, never a row delete,
/// and every read filters on the flag.
#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateAddressInput,
    ) -> Result<AddressModel, ServiceError> {
        let txn = self.db.begin().await?;

        let user = User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let address_id = Uuid::new_v4();
        let now = Utc::now();
        let address = address::ActiveModel {
            id: Set(address_id),
            user_id: Set(user_id),
            address_line: Set(input.address_line),
            city: Set(input.city),
            state: Set(input.state),
            country: Set(input.country),
            pincode: Set(input.pincode),
            mobile: Set(input.mobile),
            status: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let address = address.insert(&txn).await?;

        let mut details = user.address_details.clone();
        details.push_unique(address_id);
        let mut user: crate::entities::user::ActiveModel = user.into();
        user.address_details = Set(details);
        user.updated_at = Set(now);
        user.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::AddressCreated {
                user_id,
                address_id,
            })
            .await;

        info!(%user_id, %address_id, "Created address");
        Ok(address)
    }

    /// Live addresses for a user, newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AddressModel>, ServiceError> {
        Ok(Address::find()
            .filter(address::Column::UserId.eq(user_id))
            .filter(address::Column::Status.eq(true))
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Collaborator interface used by both checkout paths: `None` when the
    /// address does not exist, belongs to another user, or is soft-deleted.
    pub async fn find_for_user(
        &self,
        address_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AddressModel>, ServiceError> {
        Ok(Address::find()
            .filter(address::Column::Id.eq(address_id))
            .filter(address::Column::UserId.eq(user_id))
            .filter(address::Column::Status.eq(true))
            .one(&*self.db)
            .await?)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        input: UpdateAddressInput,
    ) -> Result<AddressModel, ServiceError> {
        let existing = self.find_for_user(address_id, user_id).await?.ok_or_else(|| {
            ServiceError::NotFound("Address not found or not associated with the user".to_string())
        })?;

        let mut active: address::ActiveModel = existing.into();
        if let Some(address_line) = input.address_line {
            active.address_line = Set(address_line);
        }
        if let Some(city) = input.city {
            active.city = Set(city);
        }
        if let Some(state) = input.state {
            active.state = Set(state);
        }
        if let Some(country) = input.country {
            active.country = Set(country);
        }
        if let Some(pincode) = input.pincode {
            active.pincode = Set(pincode);
        }
        if let Some(mobile) = input.mobile {
            active.mobile = Set(mobile);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::AddressUpdated(address_id))
            .await;

        Ok(updated)
    }

    /// Soft delete: the row stays, `status` flips to false, and the
    /// address disappears from every subsequent read.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, user_id: Uuid, address_id: Uuid) -> Result<(), ServiceError> {
        let existing = self.find_for_user(address_id, user_id).await?.ok_or_else(|| {
            ServiceError::NotFound("Address not found or does not belong to the user".to_string())
        })?;

        let mut active: address::ActiveModel = existing.into();
        active.status = Set(false);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::AddressDeleted(address_id))
            .await;

        info!(%user_id, %address_id, "Soft-deleted address");
        Ok(())
    }
}
