use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "PAID")]
    Paid,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentType {
    #[sea_orm(string_value = "COD")]
    Cod,
    #[sea_orm(string_value = "ONLINE")]
    Online,
}

/// Immutable copy of the product fields an order row keeps. Taken at
/// commit time so the row survives later edits or deletion of the live
/// product; never a resolvable reference.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult,
)]
pub struct ProductSnapshot {
    pub name: String,
    #[serde(default)]
    pub image: Vec<String>,
}

/// Order ledger row. One row per product line per checkout event; the
/// `order_token` is shared by every row of one event, while `id` is the
/// unique row identity. Rows are append-only.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    /// Checkout-event token, `ORD-<uuid>` shape
    pub order_token: String,
    pub product_id: Uuid,
    #[sea_orm(column_type = "Json")]
    pub product_details: ProductSnapshot,
    /// Gateway payment intent id; empty for cash on delivery
    pub payment_id: String,
    pub payment_status: PaymentStatus,
    pub payment_type: PaymentType,
    pub delivery_address: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub sub_total_amt: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub total_amt: Decimal,
    /// Receipt URL, populated only for online payments
    pub invoice_receipt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::address::Entity",
        from = "Column::DeliveryAddress",
        to = "super::address::Column::Id"
    )]
    Address,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Address.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_through_json() {
        let snapshot = ProductSnapshot {
            name: "Basmati Rice 5kg".to_string(),
            image: vec!["https://cdn.example/rice.jpg".to_string()],
        };
        let value = serde_json::to_value(&snapshot).expect("serialize snapshot");
        let back: ProductSnapshot = serde_json::from_value(value).expect("deserialize snapshot");
        assert_eq!(back, snapshot);
    }

    #[test]
    fn snapshot_tolerates_missing_image_list() {
        let back: ProductSnapshot =
            serde_json::from_value(serde_json::json!({ "name": "Salt" })).expect("deserialize");
        assert!(back.image.is_empty());
    }
}
