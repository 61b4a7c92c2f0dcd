//! Aggregation engine for sales analytics reports.
//!
//! Given an inclusive date range, computes revenue KPIs, the top products
//! by quantity sold, and revenue grouped by customer region. Pure reads:
//! nothing here writes to the store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        customer::{self, CustomerRegion},
        product,
        report::{RegionRevenue, ReportMetrics, TopProduct},
        sale,
    },
    errors::ServiceError,
};

/// Maximum number of entries in the top-selling-products ranking
const TOP_PRODUCTS_LIMIT: usize = 5;

/// Computes report metrics from raw sale/product/customer records
#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<DbPool>,
}

impl AnalyticsService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Compute the full metrics set for `[start, end]`, inclusive both ends.
    ///
    /// Precondition: `start <= end` (the report service validates before
    /// calling). The filtered sale set is fetched once and shared by all
    /// three passes, so every pass sees the identical snapshot.
    #[instrument(skip(self))]
    pub async fn compute_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ReportMetrics, ServiceError> {
        let sales = sale::Entity::find()
            .filter(sale::Column::ReportDate.gte(start))
            .filter(sale::Column::ReportDate.lte(end))
            .all(&*self.db)
            .await?;

        if sales.is_empty() {
            return Ok(ReportMetrics::empty());
        }

        let (total_revenue, total_sales, avg_order_value) = kpi_pass(&sales);
        let top_selling_products = self.top_products_pass(&sales).await?;
        let sales_by_region = self.sales_by_region_pass(&sales).await?;

        Ok(ReportMetrics {
            total_revenue,
            total_sales,
            avg_order_value,
            top_selling_products,
            sales_by_region,
        })
    }

    /// Group sales by product, rank by quantity sold, resolve names.
    ///
    /// Ties on summed quantity break by product id ascending so the ranking
    /// is deterministic across runs. A group whose product no longer exists
    /// is an integrity fault: it is dropped from the ranking with a warning
    /// and does not abort the report.
    async fn top_products_pass(
        &self,
        sales: &[sale::Model],
    ) -> Result<Vec<TopProduct>, ServiceError> {
        let mut quantity_by_product: BTreeMap<Uuid, i64> = BTreeMap::new();
        for sale in sales {
            *quantity_by_product.entry(sale.product_id).or_insert(0) += i64::from(sale.quantity);
        }

        let mut groups: Vec<(Uuid, i64)> = quantity_by_product.into_iter().collect();
        groups.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        groups.truncate(TOP_PRODUCTS_LIMIT);

        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = groups.iter().map(|(id, _)| *id).collect();
        let names: HashMap<Uuid, String> = product::Entity::find()
            .filter(product::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let mut ranking = Vec::with_capacity(groups.len());
        for (product_id, total_quantity) in groups {
            match names.get(&product_id) {
                Some(name) => ranking.push(TopProduct {
                    name: name.clone(),
                    total_quantity,
                }),
                None => {
                    warn!(
                        %product_id,
                        "sales reference a missing product; dropped from top-products ranking"
                    );
                }
            }
        }

        Ok(ranking)
    }

    /// Join sales to their customers and group revenue by region.
    ///
    /// A sale whose customer no longer exists is dropped from this pass only
    /// (warned, never bucketed under a fabricated region); its revenue still
    /// counts in the KPI and top-products passes. Ties on revenue break by
    /// region name ascending.
    async fn sales_by_region_pass(
        &self,
        sales: &[sale::Model],
    ) -> Result<Vec<RegionRevenue>, ServiceError> {
        let customer_ids: Vec<Uuid> = sales
            .iter()
            .map(|s| s.customer_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        if customer_ids.is_empty() {
            return Ok(Vec::new());
        }

        let regions: HashMap<Uuid, CustomerRegion> = customer::Entity::find()
            .filter(customer::Column::Id.is_in(customer_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.region))
            .collect();

        let mut revenue_by_region: BTreeMap<CustomerRegion, Decimal> = BTreeMap::new();
        for sale in sales {
            match regions.get(&sale.customer_id) {
                Some(region) => {
                    *revenue_by_region.entry(*region).or_insert(Decimal::ZERO) +=
                        sale.total_revenue;
                }
                None => {
                    warn!(
                        sale_id = %sale.id,
                        customer_id = %sale.customer_id,
                        "sale references a missing customer; excluded from regional breakdown"
                    );
                }
            }
        }

        let mut breakdown: Vec<RegionRevenue> = revenue_by_region
            .into_iter()
            .map(|(region, total_revenue)| RegionRevenue {
                region,
                total_revenue,
            })
            .collect();
        breakdown.sort_by(|a, b| {
            b.total_revenue
                .cmp(&a.total_revenue)
                .then(a.region.as_str().cmp(b.region.as_str()))
        });

        Ok(breakdown)
    }
}

/// Single traversal over the filtered set: revenue sum, row count, and the
/// average guarded against the empty case so it can never divide by zero.
fn kpi_pass(sales: &[sale::Model]) -> (Decimal, i64, Decimal) {
    let total_revenue: Decimal = sales.iter().map(|s| s.total_revenue).sum();
    let total_sales = sales.len() as i64;
    let avg_order_value = if total_sales > 0 {
        total_revenue / Decimal::from(total_sales)
    } else {
        Decimal::ZERO
    };
    (total_revenue, total_sales, avg_order_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sale_with_revenue(revenue: Decimal) -> sale::Model {
        let now = Utc::now();
        sale::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            quantity: 1,
            total_revenue: revenue,
            report_date: now,
            created_at: now,
        }
    }

    #[test]
    fn kpi_pass_sums_and_averages() {
        let sales = vec![
            sale_with_revenue(dec!(300)),
            sale_with_revenue(dec!(500)),
        ];
        let (revenue, count, avg) = kpi_pass(&sales);
        assert_eq!(revenue, dec!(800));
        assert_eq!(count, 2);
        assert_eq!(avg, dec!(400));
    }

    #[test]
    fn kpi_pass_on_empty_set_is_all_zero() {
        let (revenue, count, avg) = kpi_pass(&[]);
        assert_eq!(revenue, Decimal::ZERO);
        assert_eq!(count, 0);
        assert_eq!(avg, Decimal::ZERO);
    }

    #[test]
    fn kpi_average_identity_holds() {
        let sales = vec![
            sale_with_revenue(dec!(10.50)),
            sale_with_revenue(dec!(0)),
            sale_with_revenue(dec!(99.99)),
        ];
        let (revenue, count, avg) = kpi_pass(&sales);
        assert_eq!(avg, revenue / Decimal::from(count));
    }
}
