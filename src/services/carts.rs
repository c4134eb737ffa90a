use crate::{
    entities::{cart_item, CartItem, CartItemModel, Product, ProductModel, User},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Per-user cart lines. One row per (user, product); duplicates are
/// rejected by this service, not by a database constraint. The
/// `users.shopping_cart` column mirrors the product ids as a denormalized
/// secondary index and is kept in step inside the same transaction.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds a product to the cart at quantity 1. A product already in the
    /// cart is rejected; quantity changes go through `update_quantity`.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartItemModel, ServiceError> {
        let txn = self.db.begin().await?;

        let user = User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        if existing.is_some() {
            return Err(ServiceError::InvalidOperation(
                "Item already in cart".to_string(),
            ));
        }

        let now = Utc::now();
        let item = cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            quantity: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let item = item.insert(&txn).await?;

        let mut mirror = user.shopping_cart.clone();
        mirror.push_unique(product_id);
        let mut user: crate::entities::user::ActiveModel = user.into();
        user.shopping_cart = Set(mirror);
        user.updated_at = Set(now);
        user.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                user_id,
                product_id,
            })
            .await;

        info!(%user_id, %product_id, "Added item to cart");
        Ok(item)
    }

    /// Cart lines with the live product populated, oldest line first.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(CartItemModel, Option<ProductModel>)>, ServiceError> {
        Ok(CartItem::find()
            .find_also_related(Product)
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Sets the quantity of an existing line. Quantities below 1 are
    /// rejected; removal is explicit via `remove_item`.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartItemModel, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let item = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                user_id,
                product_id,
                quantity,
            })
            .await;

        Ok(updated)
    }

    /// Removes a line and pulls the product id out of the user's cart
    /// mirror.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartItemModel, ServiceError> {
        let txn = self.db.begin().await?;

        let item = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        let removed = item.clone();
        item.delete(&txn).await?;

        let user = User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        let mut mirror = user.shopping_cart.clone();
        mirror.remove(product_id);
        let mut user: crate::entities::user::ActiveModel = user.into();
        user.shopping_cart = Set(mirror);
        user.updated_at = Set(Utc::now());
        user.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                user_id,
                product_id,
            })
            .await;

        info!(%user_id, %product_id, "Removed item from cart");
        Ok(removed)
    }
}
