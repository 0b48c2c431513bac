//! Serial allocation for order numbering.
//!
//! Counters are explicit rows in `serial_counters`, one per
//! `(order_type, company_id)`, with the nil UUID keying the global counter
//! for an order type. The increment is a single upsert
//! (`INSERT .. ON CONFLICT .. DO UPDATE SET last_serial = last_serial + 1`)
//! returning the updated row, so two concurrent allocations for the same
//! scope can never read the same value: Postgres serializes them on the
//! counter row lock, SQLite on its single-writer transaction model. The
//! unique indexes on the orders table back this up; a violation there maps
//! to `AllocationConflict`.

use crate::entities::{company, order, serial_counter};
use crate::errors::ServiceError;
use crate::models::OrderType;
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::instrument;
use uuid::Uuid;

/// Serial pair plus rendered code for a new order. Assigned exactly once,
/// at creation, and never altered by update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialAllocation {
    pub global_serial: i64,
    pub company_serial: i64,
    pub order_code: String,
}

/// Allocates the next `(global_serial, company_serial)` pair for the given
/// order type and company and renders the order code. Must run inside the
/// caller's transaction so a rollback releases the counter increments.
#[instrument(skip(conn, company), fields(order_type = %order_type, company_id = %company.id))]
pub async fn allocate<C: ConnectionTrait>(
    conn: &C,
    order_type: OrderType,
    company: &company::Model,
) -> Result<SerialAllocation, ServiceError> {
    let today = Utc::now().date_naive();

    let global_serial = next_serial(conn, order_type, Uuid::nil()).await?;
    let mut company_serial = next_serial(conn, order_type, company.id).await?;
    let mut order_code = render_order_code(order_type, &company.code, company_serial, today);

    // Sale codes embed the date, so the upstream system re-checks them for
    // collisions and regenerates once. Codes derive from unique serials,
    // which makes this unreachable in practice; it is kept as the
    // documented mitigation, not a guarantee.
    if order_type == OrderType::Sale && code_exists(conn, order_type, &order_code).await? {
        company_serial = next_serial(conn, order_type, company.id).await?;
        order_code = render_order_code(order_type, &company.code, company_serial, today);

        if code_exists(conn, order_type, &order_code).await? {
            return Err(ServiceError::AllocationConflict(format!(
                "order code {} already exists after regeneration",
                order_code
            )));
        }
    }

    Ok(SerialAllocation {
        global_serial,
        company_serial,
        order_code,
    })
}

/// Atomically increments and returns the counter for one scope.
async fn next_serial<C: ConnectionTrait>(
    conn: &C,
    order_type: OrderType,
    scope: Uuid,
) -> Result<i64, ServiceError> {
    let seed = serial_counter::ActiveModel {
        order_type: Set(order_type.to_string()),
        company_id: Set(scope),
        last_serial: Set(1),
    };

    let counter = serial_counter::Entity::insert(seed)
        .on_conflict(
            OnConflict::columns([
                serial_counter::Column::OrderType,
                serial_counter::Column::CompanyId,
            ])
            .value(
                serial_counter::Column::LastSerial,
                Expr::col(serial_counter::Column::LastSerial).add(1),
            )
            .to_owned(),
        )
        .exec_with_returning(conn)
        .await?;

    Ok(counter.last_serial)
}

async fn code_exists<C: ConnectionTrait>(
    conn: &C,
    order_type: OrderType,
    code: &str,
) -> Result<bool, ServiceError> {
    let existing = order::Entity::find()
        .filter(order::Column::OrderType.eq(order_type.to_string()))
        .filter(order::Column::OrderCode.eq(code))
        .one(conn)
        .await?;

    Ok(existing.is_some())
}

/// Renders the human-readable order code.
///
/// Sales: `SO-<companyCode>-<YYYYMMDD>-<serial, 4 digits>`.
/// Purchases: `<companyCode>-<serial, 4 digits>`.
pub fn render_order_code(
    order_type: OrderType,
    company_code: &str,
    company_serial: i64,
    date: NaiveDate,
) -> String {
    match order_type {
        OrderType::Sale => format!(
            "SO-{}-{}-{:04}",
            company_code,
            date.format("%Y%m%d"),
            company_serial
        ),
        OrderType::Purchase => format!("{}-{:04}", company_code, company_serial),
    }
}
