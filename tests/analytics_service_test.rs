//! Unit tests for the aggregation engine.
//!
//! Covers:
//! - Empty-range metrics (all zeros, never an error)
//! - KPI sums and the zero-count average guard
//! - Top-product ranking, cap, and deterministic tie-break
//! - Regional revenue grouping and ordering
//! - Integrity-fault handling for missing products and customers

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sales_analytics_api::{
    entities::{customer, product, sale},
    services::analytics::AnalyticsService,
};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
use std::sync::Arc;
use uuid::Uuid;

fn range_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn range_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap()
}

fn uuid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn test_sale(
    product_id: Uuid,
    customer_id: Uuid,
    quantity: i32,
    revenue: Decimal,
) -> sale::Model {
    sale::Model {
        id: Uuid::new_v4(),
        product_id,
        customer_id,
        quantity,
        total_revenue: revenue,
        report_date: range_start(),
        created_at: range_start(),
    }
}

fn test_product(id: Uuid, name: &str) -> product::Model {
    product::Model {
        id,
        name: name.to_string(),
        category: product::ProductCategory::Electronics,
        price: dec!(99.99),
        created_at: range_start(),
    }
}

fn test_customer(id: Uuid, region: customer::CustomerRegion) -> customer::Model {
    customer::Model {
        id,
        name: format!("Customer {}", id),
        region,
        customer_type: customer::CustomerType::Individual,
        created_at: range_start(),
    }
}

fn service(db: DatabaseConnection) -> AnalyticsService {
    AnalyticsService::new(Arc::new(db))
}

#[tokio::test]
async fn empty_range_yields_all_zero_metrics() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<sale::Model>::new()])
        .into_connection();

    let metrics = service(db)
        .compute_metrics(range_start(), range_end())
        .await
        .expect("empty range must not error");

    assert_eq!(metrics.total_revenue, Decimal::ZERO);
    assert_eq!(metrics.total_sales, 0);
    assert_eq!(metrics.avg_order_value, Decimal::ZERO);
    assert!(metrics.top_selling_products.is_empty());
    assert!(metrics.sales_by_region.is_empty());
}

#[tokio::test]
async fn aggregates_kpis_top_products_and_regions() {
    let product_a = uuid(0xa);
    let product_b = uuid(0xb);
    let customer_x = uuid(0x1);
    let customer_y = uuid(0x2);

    // The out-of-range sale from the scenario never leaves the store: the
    // range filter is part of the query, so the mock returns only the two
    // in-range sales.
    let sales = vec![
        test_sale(product_a, customer_x, 3, dec!(300)),
        test_sale(product_b, customer_y, 10, dec!(500)),
    ];

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([sales])
        .append_query_results([vec![
            test_product(product_a, "Product A"),
            test_product(product_b, "Product B"),
        ]])
        .append_query_results([vec![
            test_customer(customer_x, customer::CustomerRegion::North),
            test_customer(customer_y, customer::CustomerRegion::South),
        ]])
        .into_connection();

    let metrics = service(db)
        .compute_metrics(range_start(), range_end())
        .await
        .expect("aggregation should succeed");

    assert_eq!(metrics.total_revenue, dec!(800));
    assert_eq!(metrics.total_sales, 2);
    assert_eq!(metrics.avg_order_value, dec!(400));

    let names: Vec<(&str, i64)> = metrics
        .top_selling_products
        .iter()
        .map(|p| (p.name.as_str(), p.total_quantity))
        .collect();
    assert_eq!(names, vec![("Product B", 10), ("Product A", 3)]);

    // Regional revenue covers each region exactly once and sums to the KPI
    // total when no integrity faults occurred.
    let region_total: Decimal = metrics.sales_by_region.iter().map(|r| r.total_revenue).sum();
    assert_eq!(region_total, metrics.total_revenue);
    assert_eq!(metrics.sales_by_region.len(), 2);
    assert_eq!(
        metrics.sales_by_region[0].region,
        customer::CustomerRegion::South
    );
    assert_eq!(metrics.sales_by_region[0].total_revenue, dec!(500));
}

#[tokio::test]
async fn top_products_caps_at_five_with_id_tie_break() {
    let customer_x = uuid(0x1);
    let product_ids: Vec<Uuid> = (1..=6).map(|n| uuid(0x100 + n)).collect();

    // Six products: quantities 9, 9, 7, 6, 5, 4. The two nines tie and must
    // order by product id ascending; the six-quantity product with the
    // largest id is the one cut by the cap.
    let quantities = [9, 9, 7, 6, 5, 4];
    let sales: Vec<sale::Model> = product_ids
        .iter()
        .zip(quantities)
        .map(|(pid, qty)| test_sale(*pid, customer_x, qty, dec!(10)))
        .collect();

    let products: Vec<product::Model> = product_ids
        .iter()
        .enumerate()
        .map(|(i, pid)| test_product(*pid, &format!("P{}", i + 1)))
        .collect();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([sales])
        .append_query_results([products[..5].to_vec()])
        .append_query_results([vec![test_customer(
            customer_x,
            customer::CustomerRegion::West,
        )]])
        .into_connection();

    let metrics = service(db)
        .compute_metrics(range_start(), range_end())
        .await
        .expect("aggregation should succeed");

    let ranking: Vec<(&str, i64)> = metrics
        .top_selling_products
        .iter()
        .map(|p| (p.name.as_str(), p.total_quantity))
        .collect();
    assert_eq!(
        ranking,
        vec![("P1", 9), ("P2", 9), ("P3", 7), ("P4", 6), ("P5", 5)]
    );

    // Strictly non-increasing by quantity.
    for pair in metrics.top_selling_products.windows(2) {
        assert!(pair[0].total_quantity >= pair[1].total_quantity);
    }
}

#[tokio::test]
async fn missing_product_is_dropped_from_ranking_only() {
    let product_known = uuid(0xa);
    let product_gone = uuid(0xb);
    let customer_x = uuid(0x1);

    let sales = vec![
        test_sale(product_known, customer_x, 2, dec!(100)),
        test_sale(product_gone, customer_x, 8, dec!(400)),
    ];

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([sales])
        // Only one of the two referenced products still exists.
        .append_query_results([vec![test_product(product_known, "Known")]])
        .append_query_results([vec![test_customer(
            customer_x,
            customer::CustomerRegion::East,
        )]])
        .into_connection();

    let metrics = service(db)
        .compute_metrics(range_start(), range_end())
        .await
        .expect("integrity fault must not abort the report");

    // The faulted group is gone from the ranking, but its revenue still
    // counts everywhere else.
    assert_eq!(metrics.top_selling_products.len(), 1);
    assert_eq!(metrics.top_selling_products[0].name, "Known");
    assert_eq!(metrics.total_revenue, dec!(500));
    assert_eq!(metrics.total_sales, 2);
    assert_eq!(metrics.sales_by_region[0].total_revenue, dec!(500));
}

#[tokio::test]
async fn missing_customer_is_excluded_from_regions_only() {
    let product_a = uuid(0xa);
    let customer_known = uuid(0x1);
    let customer_gone = uuid(0x2);

    let sales = vec![
        test_sale(product_a, customer_known, 1, dec!(250)),
        test_sale(product_a, customer_gone, 4, dec!(750)),
    ];

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([sales])
        .append_query_results([vec![test_product(product_a, "Product A")]])
        // The second customer no longer exists.
        .append_query_results([vec![test_customer(
            customer_known,
            customer::CustomerRegion::Central,
        )]])
        .into_connection();

    let metrics = service(db)
        .compute_metrics(range_start(), range_end())
        .await
        .expect("integrity fault must not abort the report");

    // KPIs and the ranking still count the orphaned sale.
    assert_eq!(metrics.total_revenue, dec!(1000));
    assert_eq!(metrics.total_sales, 2);
    assert_eq!(metrics.top_selling_products[0].total_quantity, 5);

    // The regional breakdown covers only resolvable customers; there is no
    // fabricated bucket for the missing one.
    assert_eq!(metrics.sales_by_region.len(), 1);
    assert_eq!(
        metrics.sales_by_region[0].region,
        customer::CustomerRegion::Central
    );
    assert_eq!(metrics.sales_by_region[0].total_revenue, dec!(250));
}

#[tokio::test]
async fn equal_region_revenue_orders_by_region_name() {
    let product_a = uuid(0xa);
    let customer_w = uuid(0x1);
    let customer_c = uuid(0x2);

    let sales = vec![
        test_sale(product_a, customer_w, 1, dec!(100)),
        test_sale(product_a, customer_c, 1, dec!(100)),
    ];

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([sales])
        .append_query_results([vec![test_product(product_a, "Product A")]])
        .append_query_results([vec![
            test_customer(customer_w, customer::CustomerRegion::West),
            test_customer(customer_c, customer::CustomerRegion::Central),
        ]])
        .into_connection();

    let metrics = service(db)
        .compute_metrics(range_start(), range_end())
        .await
        .expect("aggregation should succeed");

    let regions: Vec<customer::CustomerRegion> =
        metrics.sales_by_region.iter().map(|r| r.region).collect();
    assert_eq!(
        regions,
        vec![
            customer::CustomerRegion::Central,
            customer::CustomerRegion::West
        ]
    );
}
