mod common;

use common::{create_company, line, setup};
use orderdesk_api::models::OrderType;
use orderdesk_api::services::orders::CreateOrderRequest;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// N concurrent creates for the same company must be assigned exactly the
/// serial set {1, ..., N}: no duplicates, no skipped values.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_never_collide_on_serials() {
    let ctx = setup().await;
    let company_id = create_company(&ctx.companies, "ABC", "Acme Business Co").await;

    const CALLERS: i64 = 12;

    let mut tasks = Vec::new();
    for _ in 0..CALLERS {
        let orders = ctx.orders.clone();
        tasks.push(tokio::spawn(async move {
            orders
                .create_order(CreateOrderRequest {
                    order_type: OrderType::Purchase,
                    company_id,
                    line_items: vec![line(1, "1.00", "0")],
                    overall_discount: Decimal::ZERO,
                    tax_percentage: Decimal::ZERO,
                })
                .await
        }));
    }

    let mut company_serials = BTreeSet::new();
    let mut global_serials = BTreeSet::new();
    for task in tasks {
        let created = task.await.expect("join").expect("create order");
        assert!(
            company_serials.insert(created.company_serial),
            "duplicate company serial {}",
            created.company_serial
        );
        assert!(
            global_serials.insert(created.global_serial),
            "duplicate global serial {}",
            created.global_serial
        );
    }

    let expected: BTreeSet<i64> = (1..=CALLERS).collect();
    assert_eq!(company_serials, expected);
    assert_eq!(global_serials, expected);
}

// Requires a real Postgres and migrations; SQLite serializes writers and
// cannot exercise true row-lock contention.
// Run with: DATABASE_URL=postgres://... cargo test -- --ignored postgres_concurrency
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn postgres_concurrency() {
    use orderdesk_api::db;
    use orderdesk_api::events;
    use orderdesk_api::services::{CompanyService, OrderService};
    use std::sync::Arc;

    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at Postgres");
    let pool = db::establish_connection(&url).await.expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");
    let pool = Arc::new(pool);

    let (sender, receiver) = events::channel(100);
    tokio::spawn(events::process_events(receiver));
    let sender = Arc::new(sender);

    let companies = CompanyService::new(pool.clone(), Some(sender.clone()));
    let orders = OrderService::new(pool.clone(), Some(sender));

    // Unique code per run so the test can be repeated against one database.
    let code = format!("T{}", chrono::Utc::now().format("%H%M"));
    let company_id = create_company(&companies, &code, "Concurrency Probe").await;

    const CALLERS: i64 = 20;

    let mut tasks = Vec::new();
    for _ in 0..CALLERS {
        let orders = orders.clone();
        tasks.push(tokio::spawn(async move {
            orders
                .create_order(CreateOrderRequest {
                    order_type: OrderType::Sale,
                    company_id,
                    line_items: vec![line(1, "1.00", "0")],
                    overall_discount: Decimal::ZERO,
                    tax_percentage: Decimal::ZERO,
                })
                .await
        }));
    }

    let mut company_serials = BTreeSet::new();
    for task in tasks {
        let created = task.await.expect("join").expect("create order");
        assert!(
            company_serials.insert(created.company_serial),
            "duplicate company serial {}",
            created.company_serial
        );
    }

    let expected: BTreeSet<i64> = (1..=CALLERS).collect();
    assert_eq!(company_serials, expected);
}
