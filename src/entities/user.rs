use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON-backed list of entity ids. Used for the denormalized per-user
/// lists (cart mirror, order history, address back-references).
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult,
)]
pub struct IdList(pub Vec<Uuid>);

impl IdList {
    pub fn push_unique(&mut self, id: Uuid) {
        if !self.0.contains(&id) {
            self.0.push(id);
        }
    }

    pub fn remove(&mut self, id: Uuid) {
        self.0.retain(|existing| *existing != id);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Storefront user entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    /// Product ids currently in the cart; mirrors cart_items rows and is
    /// cleared transactionally on order commit.
    #[sea_orm(column_type = "Json")]
    pub shopping_cart: IdList,
    /// Order row ids, append-only, updated transactionally with order
    /// creation.
    #[sea_orm(column_type = "Json")]
    pub order_history: IdList,
    /// Address ids owned by this user; the address row is the authority
    /// on liveness.
    #[sea_orm(column_type = "Json")]
    pub address_details: IdList,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItem,
    #[sea_orm(has_many = "super::address::Entity")]
    Address,
    #[sea_orm(has_many = "super::order::Entity")]
    Order,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItem.def()
    }
}

impl Related<super::address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Address.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
