mod common;

use common::{create_company, line, setup, TestContext};
use orderdesk_api::errors::ServiceError;
use orderdesk_api::models::{OrderStatus, OrderType};
use orderdesk_api::services::orders::CreateOrderRequest;
use rust_decimal::Decimal;
use uuid::Uuid;

async fn create_pending_order(ctx: &TestContext, company_id: Uuid) -> Uuid {
    ctx.orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Purchase,
            company_id,
            line_items: vec![line(1, "10.00", "0")],
            overall_discount: Decimal::ZERO,
            tax_percentage: Decimal::ZERO,
        })
        .await
        .expect("create order")
        .id
}

/// Concurrent approvals of one pending order must produce exactly one
/// winner; every other caller reports a failed transition, never success.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_let_exactly_one_caller_win() {
    let ctx = setup().await;
    let company_id = create_company(&ctx.companies, "RACE", "Race Co").await;
    let order_id = create_pending_order(&ctx, company_id).await;

    const CALLERS: usize = 8;

    let mut tasks = Vec::new();
    for _ in 0..CALLERS {
        let orders = ctx.orders.clone();
        tasks.push(tokio::spawn(async move {
            orders.approve_order(order_id, Uuid::new_v4()).await
        }));
    }

    let mut approved = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.expect("join") {
            Ok(_) => approved += 1,
            Err(ServiceError::InvalidTransition { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(approved, 1, "exactly one concurrent approve may succeed");
    assert_eq!(rejected, CALLERS - 1);

    let order = ctx
        .orders
        .get_order(order_id)
        .await
        .expect("get order")
        .expect("order exists");
    assert_eq!(order.status, OrderStatus::Approved);
    // A single transition happened, so the version advanced exactly once.
    assert_eq!(order.version, 2);
}

/// Double-trash under concurrency: one caller soft-deletes, the rest see
/// the order already trashed.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_trashes_let_exactly_one_caller_win() {
    let ctx = setup().await;
    let company_id = create_company(&ctx.companies, "BIN", "Bin Co").await;
    let order_id = create_pending_order(&ctx, company_id).await;

    const CALLERS: usize = 6;

    let mut tasks = Vec::new();
    for _ in 0..CALLERS {
        let orders = ctx.orders.clone();
        tasks.push(tokio::spawn(async move { orders.trash_order(order_id).await }));
    }

    let mut trashed = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.expect("join") {
            Ok(response) => {
                assert!(response.deleted_at.is_some());
                trashed += 1;
            }
            Err(ServiceError::InvalidTransition { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(trashed, 1, "exactly one concurrent trash may succeed");
    assert_eq!(rejected, CALLERS - 1);

    let order = ctx
        .orders
        .get_order(order_id)
        .await
        .expect("get order")
        .expect("order exists");
    assert!(order.deleted_at.is_some());
    assert_eq!(order.version, 2);
}

/// A restore racing a purge must not resurrect the order: either the
/// restore wins and the purge refuses, or the purge wins and the restore
/// finds nothing.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn restore_and_purge_cannot_both_succeed() {
    let ctx = setup().await;
    let company_id = create_company(&ctx.companies, "TUG", "Tug Co").await;
    let order_id = create_pending_order(&ctx, company_id).await;
    ctx.orders.trash_order(order_id).await.expect("trash order");

    let restore = {
        let orders = ctx.orders.clone();
        tokio::spawn(async move { orders.restore_order(order_id).await })
    };
    let purge = {
        let orders = ctx.orders.clone();
        tokio::spawn(async move { orders.purge_order(order_id).await })
    };

    let restored = restore.await.expect("join").is_ok();
    let purged = purge.await.expect("join").is_ok();
    assert!(
        restored != purged,
        "exactly one of restore/purge must win (restored={restored}, purged={purged})"
    );

    let order = ctx.orders.get_order(order_id).await.expect("get order");
    if purged {
        assert!(order.is_none());
    } else {
        assert!(order.expect("order exists").deleted_at.is_none());
    }
}
