use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::customer::CustomerRegion;

/// Persisted analytics report.
///
/// Reports are immutable once written: `generated_at` is assigned exactly
/// once and the row is never updated or deleted by this service.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Report)]
#[sea_orm(table_name = "analytics_reports")]
pub struct Model {
    /// Primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Inclusive start of the reporting range (caller-supplied)
    pub start_date: DateTime<Utc>,

    /// Inclusive end of the reporting range (caller-supplied)
    pub end_date: DateTime<Utc>,

    /// Server-assigned creation timestamp; reports sort newest-first on this
    pub generated_at: DateTime<Utc>,

    /// Aggregated metrics, embedded in the report row. The metrics have no
    /// lifecycle of their own.
    #[sea_orm(column_type = "JsonBinary")]
    pub metrics: ReportMetrics,
}

/// The computed metrics for one report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct ReportMetrics {
    /// Sum of `total_revenue` over the filtered sale set
    pub total_revenue: Decimal,
    /// Number of sales in the filtered set
    pub total_sales: i64,
    /// `total_revenue / total_sales`, exactly zero when there are no sales
    pub avg_order_value: Decimal,
    /// At most 5 products, sorted by quantity sold descending
    pub top_selling_products: Vec<TopProduct>,
    /// Every region present in the filtered set exactly once, sorted by
    /// revenue descending
    pub sales_by_region: Vec<RegionRevenue>,
}

impl ReportMetrics {
    /// Metrics for a range containing no sales. All zeros, never an error.
    pub fn empty() -> Self {
        Self {
            total_revenue: Decimal::ZERO,
            total_sales: 0,
            avg_order_value: Decimal::ZERO,
            top_selling_products: Vec::new(),
            sales_by_region: Vec::new(),
        }
    }
}

/// One entry of the top-selling-products ranking
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct TopProduct {
    pub name: String,
    pub total_quantity: i64,
}

/// Revenue attributed to one customer region
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct RegionRevenue {
    pub region: CustomerRegion,
    pub total_revenue: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
