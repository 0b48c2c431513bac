use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// "purchase" or "sale"; serials and codes are scoped per type.
    pub order_type: String,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Order code must be between 1 and 50 characters"
    ))]
    pub order_code: String,

    /// Monotonic across all companies for this order type. Assigned once
    /// at creation, immutable afterwards.
    pub global_serial: i64,

    /// Monotonic within the owning company for this order type. Assigned
    /// once at creation, immutable afterwards.
    pub company_serial: i64,

    pub company_id: Uuid,

    pub subtotal: Decimal,
    pub overall_discount: Decimal,
    pub total_after_discount: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,

    /// "pending" or "approved".
    pub status: String,

    /// "active" or "trashed". Soft deletion is an explicit state tag;
    /// `deleted_at` only records when the trashing happened.
    pub record_state: String,

    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_line_item::Entity")]
    OrderLineItems,
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
}

impl Related<super::order_line_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLineItems.def()
    }
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Ok(self)
    }
}
