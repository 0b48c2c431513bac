mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use common::{create_company, line, money, setup};
use orderdesk_api::entities::order;
use orderdesk_api::errors::ServiceError;
use orderdesk_api::models::{OrderStatus, OrderType};
use orderdesk_api::services::orders::CreateOrderRequest;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

#[tokio::test]
async fn first_purchase_for_a_company_starts_both_serials_at_one() {
    let ctx = setup().await;
    let company_id = create_company(&ctx.companies, "ABC", "Acme Business Co").await;

    let created = ctx
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Purchase,
            company_id,
            line_items: vec![line(10, "5.00", "0")],
            overall_discount: Decimal::ZERO,
            tax_percentage: Decimal::ZERO,
        })
        .await
        .expect("create order");

    assert_eq!(created.company_serial, 1);
    assert_eq!(created.global_serial, 1);
    assert_eq!(created.order_code, "ABC-0001");
    assert_eq!(created.subtotal, money("50.00"));
    assert_eq!(created.total_after_discount, money("50.00"));
    assert_eq!(created.tax_amount, Decimal::ZERO);
    assert_eq!(created.grand_total, money("50.00"));
    assert_eq!(created.status, OrderStatus::Pending);
    assert_eq!(created.line_items.len(), 1);
    assert_eq!(created.line_items[0].line_total, money("50.00"));
}

#[tokio::test]
async fn second_purchase_increments_serial_and_applies_discount_and_tax() {
    let ctx = setup().await;
    let company_id = create_company(&ctx.companies, "ABC", "Acme Business Co").await;

    ctx.orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Purchase,
            company_id,
            line_items: vec![line(10, "5.00", "0")],
            overall_discount: Decimal::ZERO,
            tax_percentage: Decimal::ZERO,
        })
        .await
        .expect("first order");

    let second = ctx
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Purchase,
            company_id,
            line_items: vec![line(2, "100.00", "10.00")],
            overall_discount: money("5"),
            tax_percentage: money("10"),
        })
        .await
        .expect("second order");

    assert_eq!(second.company_serial, 2);
    assert_eq!(second.order_code, "ABC-0002");
    assert_eq!(second.subtotal, money("190.00"));
    assert_eq!(second.total_after_discount, money("185.00"));
    assert_eq!(second.tax_amount, money("18.50"));
    assert_eq!(second.grand_total, money("203.50"));
}

#[tokio::test]
async fn sale_codes_embed_company_code_and_date() {
    let ctx = setup().await;
    let company_id = create_company(&ctx.companies, "ABC", "Acme Business Co").await;

    let sale = ctx
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Sale,
            company_id,
            line_items: vec![line(1, "9.99", "0")],
            overall_discount: Decimal::ZERO,
            tax_percentage: Decimal::ZERO,
        })
        .await
        .expect("create sale");

    let expected = format!("SO-ABC-{}-0001", Utc::now().format("%Y%m%d"));
    assert_eq!(sale.order_code, expected);
}

#[tokio::test]
async fn serials_are_scoped_per_company_and_per_type() {
    let ctx = setup().await;
    let abc = create_company(&ctx.companies, "ABC", "Acme Business Co").await;
    let xyz = create_company(&ctx.companies, "XYZ", "Xylo Zone").await;

    let mut global_serials = Vec::new();

    for (order_type, company_id, expected_company_serial) in [
        (OrderType::Purchase, abc, 1),
        (OrderType::Purchase, xyz, 1),
        (OrderType::Purchase, abc, 2),
        (OrderType::Sale, abc, 1),
        (OrderType::Purchase, xyz, 2),
        (OrderType::Sale, xyz, 1),
    ] {
        let created = ctx
            .orders
            .create_order(CreateOrderRequest {
                order_type,
                company_id,
                line_items: vec![line(1, "1.00", "0")],
                overall_discount: Decimal::ZERO,
                tax_percentage: Decimal::ZERO,
            })
            .await
            .expect("create order");

        assert_eq!(
            created.company_serial, expected_company_serial,
            "company serial for {:?} {:?}",
            order_type, company_id
        );
        global_serials.push((order_type, created.global_serial));
    }

    // Global serials are strictly increasing in assignment order within
    // each order type, with no duplicates.
    let purchases: Vec<i64> = global_serials
        .iter()
        .filter(|(t, _)| *t == OrderType::Purchase)
        .map(|(_, s)| *s)
        .collect();
    let sales: Vec<i64> = global_serials
        .iter()
        .filter(|(t, _)| *t == OrderType::Sale)
        .map(|(_, s)| *s)
        .collect();

    assert_eq!(purchases, vec![1, 2, 3, 4]);
    assert_eq!(sales, vec![1, 2]);
}

#[tokio::test]
async fn unknown_company_is_not_found() {
    let ctx = setup().await;

    let err = ctx
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Purchase,
            company_id: Uuid::new_v4(),
            line_items: vec![line(1, "1.00", "0")],
            overall_discount: Decimal::ZERO,
            tax_percentage: Decimal::ZERO,
        })
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound { entity: "Company", .. });
}

#[tokio::test]
async fn failed_create_persists_nothing_and_consumes_no_serials() {
    let ctx = setup().await;
    let company_id = create_company(&ctx.companies, "ABC", "Acme Business Co").await;

    // Discount exceeds the line amount.
    let err = ctx
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Purchase,
            company_id,
            line_items: vec![line(1, "5.00", "0"), line(2, "3.00", "7.00")],
            overall_discount: Decimal::ZERO,
            tax_percentage: Decimal::ZERO,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidLineItem(_));

    let remaining = order::Entity::find()
        .filter(order::Column::CompanyId.eq(company_id))
        .all(&*ctx.db)
        .await
        .expect("query orders");
    assert!(remaining.is_empty(), "no order rows may survive a failed create");

    // The would-be code was never consumed either: the next create still
    // gets serial 1.
    let created = ctx
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Purchase,
            company_id,
            line_items: vec![line(1, "5.00", "0")],
            overall_discount: Decimal::ZERO,
            tax_percentage: Decimal::ZERO,
        })
        .await
        .expect("create order");
    assert_eq!(created.company_serial, 1);
    assert_eq!(created.order_code, "ABC-0001");
}

#[tokio::test]
async fn order_without_line_items_is_rejected() {
    let ctx = setup().await;
    let company_id = create_company(&ctx.companies, "EMP", "Empty Co").await;

    let err = ctx
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Purchase,
            company_id,
            line_items: vec![],
            overall_discount: Decimal::ZERO,
            tax_percentage: Decimal::ZERO,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // The rejected request consumed no serial.
    let created = ctx
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Purchase,
            company_id,
            line_items: vec![line(1, "1.00", "0")],
            overall_discount: Decimal::ZERO,
            tax_percentage: Decimal::ZERO,
        })
        .await
        .expect("create order");
    assert_eq!(created.company_serial, 1);
}
