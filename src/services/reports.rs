//! Report orchestration: validate the range, run the aggregation engine,
//! persist the result, and notify real-time observers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, QueryOrder, QuerySelect};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    broadcast::ReportBroadcaster,
    db::DbPool,
    entities::report,
    errors::ServiceError,
    services::analytics::AnalyticsService,
};

/// Number of reports returned by history listing when the caller does not
/// ask for a specific limit (matching the dashboard's history table).
pub const DEFAULT_HISTORY_LIMIT: u64 = 20;

/// Hard cap on the history listing; unbounded history is not served
/// through this operation.
pub const MAX_HISTORY_LIMIT: u64 = 100;

/// Orchestrates report generation and retrieval
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DbPool>,
    analytics: AnalyticsService,
    broadcaster: ReportBroadcaster,
    aggregation_timeout: Duration,
}

impl ReportService {
    pub fn new(
        db: Arc<DbPool>,
        broadcaster: ReportBroadcaster,
        aggregation_timeout: Duration,
    ) -> Self {
        let analytics = AnalyticsService::new(db.clone());
        Self {
            db,
            analytics,
            broadcaster,
            aggregation_timeout,
        }
    }

    /// Generate, persist, and broadcast a report for `[start, end]`.
    ///
    /// The range is validated before any store read. The insert completes
    /// (or fails) before anything is broadcast, so an observer can always
    /// fetch a report id it was notified about. Broadcast delivery is
    /// fire-and-forget: it never fails or delays this call.
    #[instrument(skip(self))]
    pub async fn generate_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<report::Model, ServiceError> {
        if end < start {
            return Err(ServiceError::InvalidDateRange(format!(
                "end date {} is earlier than start date {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }

        let metrics = bounded(
            self.aggregation_timeout,
            self.analytics.compute_metrics(start, end),
        )
        .await?;

        // Single insert: either the whole report row persists or none of it.
        let persisted = report::ActiveModel {
            id: Set(Uuid::new_v4()),
            start_date: Set(start),
            end_date: Set(end),
            generated_at: Set(Utc::now()),
            metrics: Set(metrics),
        }
        .insert(&*self.db)
        .await?;

        self.broadcaster.publish(persisted.clone());

        info!(
            report_id = %persisted.id,
            total_sales = persisted.metrics.total_sales,
            %persisted.metrics.total_revenue,
            "analytics report generated"
        );

        Ok(persisted)
    }

    /// Most recently generated reports, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_HISTORY_LIMIT`] and is clamped to
    /// `1..=MAX_HISTORY_LIMIT`.
    #[instrument(skip(self))]
    pub async fn list_recent_reports(
        &self,
        limit: Option<u64>,
    ) -> Result<Vec<report::Model>, ServiceError> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);

        let reports = report::Entity::find()
            .order_by_desc(report::Column::GeneratedAt)
            .limit(limit)
            .all(&*self.db)
            .await?;

        Ok(reports)
    }
}

/// Runs an aggregation future under a deadline. Expiry maps to
/// [`ServiceError::AggregationTimeout`]; the future's own error passes
/// through unchanged.
async fn bounded<F, T>(limit: Duration, fut: F) -> Result<T, ServiceError>
where
    F: std::future::Future<Output = Result<T, ServiceError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ServiceError::AggregationTimeout)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::report::ReportMetrics;

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_surfaces_aggregation_timeout() {
        let result = bounded(
            Duration::from_secs(30),
            std::future::pending::<Result<ReportMetrics, ServiceError>>(),
        )
        .await;

        assert!(matches!(result, Err(ServiceError::AggregationTimeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_aggregation_passes_through() {
        let result = bounded(Duration::from_secs(30), async {
            Ok(ReportMetrics::empty())
        })
        .await;

        assert_eq!(result.unwrap(), ReportMetrics::empty());
    }

    #[tokio::test(start_paused = true)]
    async fn aggregation_error_is_not_masked_by_the_deadline() {
        let result = bounded(Duration::from_secs(30), async {
            Err::<ReportMetrics, _>(ServiceError::InternalError("pass failed".into()))
        })
        .await;

        assert!(matches!(result, Err(ServiceError::InternalError(_))));
    }
}
