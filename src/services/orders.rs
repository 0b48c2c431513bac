use crate::{
    db::DbPool,
    entities::company,
    entities::order::{
        ActiveModel as OrderActiveModel, Column as OrderColumn, Entity as OrderEntity,
        Model as OrderModel,
    },
    entities::order_line_item::{
        self, ActiveModel as LineItemActiveModel, Entity as LineItemEntity,
        Model as LineItemModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderStatus, OrderType, RecordState},
    services::{pricing, pricing::LineItemInput, serials},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub order_type: OrderType,
    pub company_id: Uuid,
    #[validate(length(min = 1, message = "Order must contain at least one line item"))]
    pub line_items: Vec<LineItemInput>,
    #[serde(default)]
    pub overall_discount: Decimal,
    #[serde(default)]
    pub tax_percentage: Decimal,
}

/// Identity fields (`order_code`, serials, `company_id`, `order_type`) are
/// immutable after creation and intentionally not representable here.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
    pub line_items: Option<Vec<LineItemInput>>,
    pub overall_discount: Option<Decimal>,
    pub tax_percentage: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LineItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub position: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_type: OrderType,
    pub order_code: String,
    pub global_serial: i64,
    pub company_serial: i64,
    pub company_id: Uuid,
    pub line_items: Vec<LineItemResponse>,
    pub subtotal: Decimal,
    pub overall_discount: Decimal,
    pub total_after_discount: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: i32,
}

/// Service for order creation, recomputation and lifecycle transitions.
/// Every mutation runs in a single transaction: a partially-numbered or
/// partially-priced order is never visible.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates an order: resolves the company, allocates serials, prices
    /// the line items, derives totals and persists everything atomically.
    #[instrument(skip(self, request), fields(order_type = %request.order_type, company_id = %request.company_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        request.validate()?;

        // Price before touching the store; caller errors should not cost a
        // transaction.
        let (priced_lines, subtotal) = pricing::aggregate(&request.line_items)?;
        let totals =
            pricing::compute_totals(subtotal, request.overall_discount, request.tax_percentage)?;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let company = company::Entity::find_by_id(request.company_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                warn!(company_id = %request.company_id, "Company not found for order creation");
                ServiceError::not_found("Company", request.company_id)
            })?;

        let allocation = serials::allocate(&txn, request.order_type, &company).await?;

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            order_type: Set(request.order_type.to_string()),
            order_code: Set(allocation.order_code.clone()),
            global_serial: Set(allocation.global_serial),
            company_serial: Set(allocation.company_serial),
            company_id: Set(company.id),
            subtotal: Set(subtotal),
            overall_discount: Set(request.overall_discount),
            total_after_discount: Set(totals.total_after_discount),
            tax_percentage: Set(request.tax_percentage),
            tax_amount: Set(totals.tax_amount),
            grand_total: Set(totals.grand_total),
            status: Set(OrderStatus::Pending.to_string()),
            record_state: Set(RecordState::Active.to_string()),
            approved_by: Set(None),
            approved_at: Set(None),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };

        let order_model = order_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to insert order");
            ServiceError::from_write_error(e)
        })?;

        insert_line_items(&txn, order_id, &priced_lines, now).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            order_code = %allocation.order_code,
            company_serial = allocation.company_serial,
            global_serial = allocation.global_serial,
            "Order created successfully"
        );

        self.emit(Event::OrderCreated(order_id)).await;

        let line_items = load_line_items(db, order_id).await?;
        model_to_response(order_model, line_items)
    }

    /// Retrieves an order by ID, including trashed orders (the response
    /// carries `deleted_at` so callers can tell).
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id).one(db).await?;

        match order {
            Some(order_model) => {
                let line_items = load_line_items(db, order_id).await?;
                Ok(Some(model_to_response(order_model, line_items)?))
            }
            None => {
                info!(order_id = %order_id, "Order not found");
                Ok(None)
            }
        }
    }

    /// Updates an order's line items, overall discount and/or tax
    /// percentage, recomputing all derived totals. Serials, code, company
    /// and type are untouched. Replacing line items is all-or-nothing.
    ///
    /// Trashed orders are invisible to mutation and report `NotFound`.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start transaction for order update");
            ServiceError::DatabaseError(e)
        })?;

        let order = find_active_order(&txn, order_id).await?;

        let overall_discount = request.overall_discount.unwrap_or(order.overall_discount);
        let tax_percentage = request.tax_percentage.unwrap_or(order.tax_percentage);

        let subtotal = match &request.line_items {
            Some(new_items) => {
                let (priced_lines, subtotal) = pricing::aggregate(new_items)?;

                LineItemEntity::delete_many()
                    .filter(order_line_item::Column::OrderId.eq(order_id))
                    .exec(&txn)
                    .await?;
                insert_line_items(&txn, order_id, &priced_lines, now).await?;

                subtotal
            }
            None => order.subtotal,
        };

        let totals = pricing::compute_totals(subtotal, overall_discount, tax_percentage)?;

        let version = order.version;
        let mut order_active_model: OrderActiveModel = order.into();
        order_active_model.subtotal = Set(subtotal);
        order_active_model.overall_discount = Set(overall_discount);
        order_active_model.total_after_discount = Set(totals.total_after_discount);
        order_active_model.tax_percentage = Set(tax_percentage);
        order_active_model.tax_amount = Set(totals.tax_amount);
        order_active_model.grand_total = Set(totals.grand_total);
        order_active_model.updated_at = Set(Some(now));
        order_active_model.version = Set(version + 1);

        let updated_order = order_active_model.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order update transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, "Order updated successfully");

        self.emit(Event::OrderUpdated(order_id)).await;

        let line_items = load_line_items(db, order_id).await?;
        model_to_response(updated_order, line_items)
    }

    /// Approves a pending order. One-way: approving an already-approved
    /// order reports `InvalidTransition`, not success. The status predicate
    /// lives in the UPDATE itself, so concurrent callers race for exactly
    /// one winner.
    #[instrument(skip(self), fields(order_id = %order_id, actor_id = %actor_id))]
    pub async fn approve_order(
        &self,
        order_id: Uuid,
        actor_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let result = OrderEntity::update_many()
            .col_expr(
                OrderColumn::Status,
                Expr::value(OrderStatus::Approved.to_string()),
            )
            .col_expr(OrderColumn::ApprovedBy, Expr::value(actor_id))
            .col_expr(OrderColumn::ApprovedAt, Expr::value(now))
            .col_expr(OrderColumn::UpdatedAt, Expr::value(now))
            .col_expr(
                OrderColumn::Version,
                Expr::col(OrderColumn::Version).add(1),
            )
            .filter(OrderColumn::Id.eq(order_id))
            .filter(OrderColumn::Status.eq(OrderStatus::Pending.to_string()))
            .filter(OrderColumn::RecordState.eq(RecordState::Active.to_string()))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to approve order");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            // The guard rejected the write: missing, trashed, or already
            // approved (possibly by a concurrent caller).
            let current = OrderEntity::find_by_id(order_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

            let state: RecordState = parse_stored(&current.record_state, "order record state")?;
            if state == RecordState::Trashed {
                warn!(order_id = %order_id, "Order is trashed");
                return Err(ServiceError::not_found("Order", order_id));
            }

            warn!(order_id = %order_id, "Order is already approved");
            return Err(ServiceError::invalid_transition(
                current.status,
                OrderStatus::Approved.to_string(),
            ));
        }

        let approved_order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        info!(order_id = %order_id, approved_by = %actor_id, "Order approved");

        self.emit(Event::OrderApproved {
            order_id,
            approved_by: actor_id,
        })
        .await;

        let line_items = load_line_items(db, order_id).await?;
        model_to_response(approved_order, line_items)
    }

    /// Soft-deletes an order. Reversible via [`Self::restore_order`]. The
    /// record-state predicate in the UPDATE makes double-trash lose the
    /// race instead of silently rewriting `deleted_at`.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn trash_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let result = OrderEntity::update_many()
            .col_expr(
                OrderColumn::RecordState,
                Expr::value(RecordState::Trashed.to_string()),
            )
            .col_expr(OrderColumn::DeletedAt, Expr::value(now))
            .col_expr(OrderColumn::UpdatedAt, Expr::value(now))
            .col_expr(
                OrderColumn::Version,
                Expr::col(OrderColumn::Version).add(1),
            )
            .filter(OrderColumn::Id.eq(order_id))
            .filter(OrderColumn::RecordState.eq(RecordState::Active.to_string()))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to trash order");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            OrderEntity::find_by_id(order_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

            // Row exists but was not active: already trashed.
            return Err(ServiceError::invalid_transition(
                RecordState::Trashed.to_string(),
                RecordState::Trashed.to_string(),
            ));
        }

        let trashed_order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        info!(order_id = %order_id, "Order trashed");

        self.emit(Event::OrderTrashed(order_id)).await;

        let line_items = load_line_items(db, order_id).await?;
        model_to_response(trashed_order, line_items)
    }

    /// Restores a trashed order to its previous state; the approval status
    /// is retained across trash/restore.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn restore_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let result = OrderEntity::update_many()
            .col_expr(
                OrderColumn::RecordState,
                Expr::value(RecordState::Active.to_string()),
            )
            .col_expr(
                OrderColumn::DeletedAt,
                Expr::value(None::<DateTime<Utc>>),
            )
            .col_expr(OrderColumn::UpdatedAt, Expr::value(now))
            .col_expr(
                OrderColumn::Version,
                Expr::col(OrderColumn::Version).add(1),
            )
            .filter(OrderColumn::Id.eq(order_id))
            .filter(OrderColumn::RecordState.eq(RecordState::Trashed.to_string()))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to restore order");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            OrderEntity::find_by_id(order_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

            // Row exists but was not trashed: nothing to restore.
            return Err(ServiceError::invalid_transition(
                RecordState::Active.to_string(),
                RecordState::Active.to_string(),
            ));
        }

        let restored_order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        info!(order_id = %order_id, "Order restored");

        self.emit(Event::OrderRestored(order_id)).await;

        let line_items = load_line_items(db, order_id).await?;
        model_to_response(restored_order, line_items)
    }

    /// Permanently deletes a trashed order and its line items. Purging a
    /// non-trashed order fails instead of silently trashing it first.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn purge_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start transaction for order purge");
            ServiceError::DatabaseError(e)
        })?;

        // Guarded delete: the record-state predicate takes the row lock, so
        // a concurrent restore cannot slip in between a check and the
        // delete. Zero rows affected rolls back before items are touched.
        let result = OrderEntity::delete_many()
            .filter(OrderColumn::Id.eq(order_id))
            .filter(OrderColumn::RecordState.eq(RecordState::Trashed.to_string()))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            OrderEntity::find_by_id(order_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

            warn!(order_id = %order_id, "Refusing to purge an order that is not trashed");
            return Err(ServiceError::invalid_transition(
                RecordState::Active.to_string(),
                "purged".to_string(),
            ));
        }

        LineItemEntity::delete_many()
            .filter(order_line_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order purge transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, "Order purged");

        self.emit(Event::OrderPurged(order_id)).await;

        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send event");
            }
        }
    }
}

/// Finds an order that is visible to mutation: exists and not trashed.
async fn find_active_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<OrderModel, ServiceError> {
    let order = OrderEntity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            warn!(order_id = %order_id, "Order not found");
            ServiceError::not_found("Order", order_id)
        })?;

    let state: RecordState = parse_stored(&order.record_state, "order record state")?;
    if state == RecordState::Trashed {
        // Soft-deleted orders are invisible to mutation until restored.
        warn!(order_id = %order_id, "Order is trashed");
        return Err(ServiceError::not_found("Order", order_id));
    }

    Ok(order)
}

async fn insert_line_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    priced_lines: &[pricing::PricedLine],
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if priced_lines.is_empty() {
        return Ok(());
    }

    let active_models: Vec<LineItemActiveModel> = priced_lines
        .iter()
        .enumerate()
        .map(|(position, line)| LineItemActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(line.product_id),
            position: Set(position as i32),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            discount: Set(line.discount),
            line_total: Set(line.line_total),
            created_at: Set(now),
        })
        .collect();

    LineItemEntity::insert_many(active_models)
        .exec(conn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to insert order line items");
            ServiceError::DatabaseError(e)
        })?;

    Ok(())
}

async fn load_line_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<LineItemModel>, ServiceError> {
    let items = LineItemEntity::find()
        .filter(order_line_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_line_item::Column::Position)
        .all(conn)
        .await?;

    Ok(items)
}

fn parse_stored<T: FromStr>(value: &str, what: &str) -> Result<T, ServiceError> {
    T::from_str(value).map_err(|_| {
        ServiceError::DatabaseError(DbErr::Custom(format!("corrupt {}: {:?}", what, value)))
    })
}

/// Converts an order model plus its line items to response format
fn model_to_response(
    model: OrderModel,
    line_items: Vec<LineItemModel>,
) -> Result<OrderResponse, ServiceError> {
    let order_type = parse_stored(&model.order_type, "order type")?;
    let status = parse_stored(&model.status, "order status")?;

    Ok(OrderResponse {
        id: model.id,
        order_type,
        order_code: model.order_code,
        global_serial: model.global_serial,
        company_serial: model.company_serial,
        company_id: model.company_id,
        line_items: line_items
            .into_iter()
            .map(|item| LineItemResponse {
                id: item.id,
                product_id: item.product_id,
                position: item.position,
                quantity: item.quantity,
                unit_price: item.unit_price,
                discount: item.discount,
                line_total: item.line_total,
            })
            .collect(),
        subtotal: model.subtotal,
        overall_discount: model.overall_discount,
        total_after_discount: model.total_after_discount,
        tax_percentage: model.tax_percentage,
        tax_amount: model.tax_amount,
        grand_total: model.grand_total,
        status,
        created_at: model.created_at,
        updated_at: model.updated_at,
        deleted_at: model.deleted_at,
        version: model.version,
    })
}
