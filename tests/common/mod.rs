#![allow(dead_code)]

use orderdesk_api::config::AppConfig;
use orderdesk_api::db::{self, DbPool};
use orderdesk_api::events;
use orderdesk_api::services::companies::{CompanyService, CreateCompanyRequest};
use orderdesk_api::services::orders::OrderService;
use orderdesk_api::services::pricing::LineItemInput;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Connects an in-memory SQLite pool and applies migrations. The pool is
/// pinned to one connection: each pooled sqlite `::memory:` connection
/// would otherwise get its own private database.
pub async fn setup_db() -> Arc<DbPool> {
    let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;

    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    Arc::new(pool)
}

pub struct TestContext {
    pub db: Arc<DbPool>,
    pub orders: OrderService,
    pub companies: CompanyService,
}

pub async fn setup() -> TestContext {
    let db = setup_db().await;

    let (sender, receiver) = events::channel(100);
    tokio::spawn(events::process_events(receiver));
    let sender = Arc::new(sender);

    TestContext {
        orders: OrderService::new(db.clone(), Some(sender.clone())),
        companies: CompanyService::new(db.clone(), Some(sender)),
        db,
    }
}

pub async fn create_company(companies: &CompanyService, code: &str, name: &str) -> Uuid {
    companies
        .create_company(CreateCompanyRequest {
            code: code.to_string(),
            name: name.to_string(),
        })
        .await
        .expect("create company")
        .id
}

pub fn money(s: &str) -> Decimal {
    Decimal::from_str(s).expect("decimal literal")
}

pub fn line(quantity: i32, unit_price: &str, discount: &str) -> LineItemInput {
    LineItemInput {
        product_id: Uuid::new_v4(),
        quantity,
        unit_price: money(unit_price),
        discount: money(discount),
    }
}
