use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Order type. Serials, codes and counters are all scoped per type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Purchase,
    Sale,
}

/// Approval status. Pending -> Approved is the only transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
}

/// Soft-delete lifecycle tag. Trashed orders are invisible to mutation
/// until restored; only trashed orders may be physically purged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Active,
    Trashed,
}
