//! Orderdesk API Library
//!
//! Order numbering and totals core for multi-company purchase and sales
//! orders: serial allocation, line-item pricing, discount/tax derivation
//! and the order lifecycle, behind whatever web layer a deployment brings.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod models;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub order_service: services::OrderService,
    pub company_service: services::CompanyService,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let sender = Arc::new(event_sender.clone());
        Self {
            order_service: services::OrderService::new(db.clone(), Some(sender.clone())),
            company_service: services::CompanyService::new(db.clone(), Some(sender)),
            db,
            config,
            event_sender,
        }
    }
}
