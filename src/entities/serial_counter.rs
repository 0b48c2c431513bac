use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One counter row per (order type, scope). The per-company counters are
/// keyed by the company id; the global counter for an order type is the
/// row keyed by the nil UUID.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "serial_counters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_type: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub company_id: Uuid,
    pub last_serial: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
