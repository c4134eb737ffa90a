use crate::{
    entities::{
        cart_item, order, AddressModel, CartItem, Order, OrderModel, PaymentStatus, PaymentType,
        ProductSnapshot, User,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

/// One product line of a checkout event.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub snapshot: ProductSnapshot,
}

/// Everything the commit needs, independent of which path produced it.
/// The COD controller fills it from the request body; the webhook
/// reconciler fills it from the gateway's record of the session.
#[derive(Debug, Clone)]
pub struct OrderBatch {
    pub user_id: Uuid,
    /// Shared by every row of this checkout event
    pub order_token: String,
    pub lines: Vec<OrderLine>,
    pub payment_id: String,
    pub payment_status: PaymentStatus,
    pub payment_type: PaymentType,
    pub delivery_address: Uuid,
    /// Request-level totals, stamped identically on every row
    pub sub_total_amt: Decimal,
    pub total_amt: Decimal,
}

/// Checkout-event token. Shared across the rows of one event; row
/// identity is the row's own uuid primary key.
pub fn generate_order_token() -> String {
    format!("ORD-{}", Uuid::new_v4())
}

/// Registry of per-user commit mutexes. Two commits for the same user
/// (double-submitted COD, or COD racing a webhook for the same cart)
/// serialize here instead of interleaving on the shared cart. The lock
/// does not deduplicate: a second identical submission still commits its
/// own batch.
#[derive(Clone, Default)]
struct CommitLocks {
    inner: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CommitLocks {
    fn for_user(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.inner.entry(user_id).or_default().clone()
    }
}

/// Append-only order ledger plus the single atomic commit both checkout
/// paths share.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    locks: CommitLocks,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            locks: CommitLocks::default(),
        }
    }

    /// Commits a checkout event: inserts one order row per line, appends
    /// the new row ids to the user's order history, empties the user's
    /// cart mirror and deletes the cart rows, all in one transaction.
    /// Any failure rolls the whole batch back; partial state is never
    /// observable to a concurrent reader.
    #[instrument(skip(self, batch), fields(user_id = %batch.user_id, lines = batch.lines.len()))]
    pub async fn commit_order_batch(
        &self,
        batch: OrderBatch,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        if batch.lines.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Order batch has no lines".to_string(),
            ));
        }
        if batch.sub_total_amt < Decimal::ZERO || batch.total_amt < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Order amounts must be non-negative".to_string(),
            ));
        }

        let lock = self.locks.for_user(batch.user_id);
        let _guard = lock.lock().await;

        let txn = self.db.begin().await?;

        let now = Utc::now();
        let mut created = Vec::with_capacity(batch.lines.len());
        for line in &batch.lines {
            let row = order::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(batch.user_id),
                order_token: Set(batch.order_token.clone()),
                product_id: Set(line.product_id),
                product_details: Set(line.snapshot.clone()),
                payment_id: Set(batch.payment_id.clone()),
                payment_status: Set(batch.payment_status),
                payment_type: Set(batch.payment_type),
                delivery_address: Set(batch.delivery_address),
                sub_total_amt: Set(batch.sub_total_amt),
                total_amt: Set(batch.total_amt),
                invoice_receipt: Set(String::new()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            created.push(row.insert(&txn).await?);
        }

        let user = User::find_by_id(batch.user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let mut history = user.order_history.clone();
        for row in &created {
            history.0.push(row.id);
        }
        let mut user: crate::entities::user::ActiveModel = user.into();
        user.order_history = Set(history);
        user.shopping_cart = Set(Default::default());
        user.updated_at = Set(now);
        user.update(&txn).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(batch.user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        let order_ids: Vec<Uuid> = created.iter().map(|row| row.id).collect();
        self.event_sender
            .send_or_log(Event::OrderBatchCommitted {
                user_id: batch.user_id,
                order_ids,
                payment_type: batch.payment_type,
            })
            .await;

        info!(
            user_id = %batch.user_id,
            order_token = %batch.order_token,
            rows = created.len(),
            "Committed order batch"
        );
        Ok(created)
    }

    /// The user's order rows, newest first, with the delivery address
    /// populated.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(OrderModel, Option<AddressModel>)>, ServiceError> {
        Ok(Order::find()
            .find_also_related(crate::entities::Address)
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_tokens_are_prefixed_and_unique() {
        let a = generate_order_token();
        let b = generate_order_token();
        assert!(a.starts_with("ORD-"));
        assert!(b.starts_with("ORD-"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn commit_locks_hand_out_the_same_mutex_per_user() {
        let locks = CommitLocks::default();
        let user = Uuid::new_v4();
        let first = locks.for_user(user);
        let second = locks.for_user(user);
        assert!(Arc::ptr_eq(&first, &second));

        let other = locks.for_user(Uuid::new_v4());
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
