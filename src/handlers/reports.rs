use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    entities::report,
    errors::ServiceError,
    ApiResponse, AppState,
};

/// Build the reports Router scoped under `/api/reports`.
pub fn reports_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(generate_report))
        .route("/history", get(report_history))
}

/// Request body for report generation
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateReportRequest {
    /// Inclusive start of the reporting range, ISO 8601
    #[schema(example = "2026-01-01T00:00:00Z")]
    pub start_date: String,
    /// Inclusive end of the reporting range, ISO 8601
    #[schema(example = "2026-01-31T00:00:00Z")]
    pub end_date: String,
}

/// Query parameters for the report history listing
#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Maximum number of reports to return (default: 20, max: 100)
    #[param(minimum = 1, maximum = 100)]
    pub limit: Option<u64>,
}

/// Accepts a full RFC 3339 datetime or a plain `YYYY-MM-DD` date (taken as
/// midnight UTC, matching what dashboard clients send).
fn parse_report_date(raw: &str, field: &str, errors: &mut Vec<String>) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    errors.push(format!("{} must be a valid ISO 8601 date", field));
    None
}

/// Generate a new analytics report for a date range
#[utoipa::path(
    post,
    path = "/api/reports",
    request_body = GenerateReportRequest,
    responses(
        (status = 201, description = "Report generated and persisted", body = ApiResponse<report::Model>),
        (status = 400, description = "Malformed or inverted date range", body = ApiResponse<report::Model>),
        (status = 500, description = "Report generation failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Reports"
)]
pub async fn generate_report(
    State(state): State<AppState>,
    Json(request): Json<GenerateReportRequest>,
) -> Result<Response, ServiceError> {
    let mut errors = Vec::new();
    let start = parse_report_date(&request.start_date, "start_date", &mut errors);
    let end = parse_report_date(&request.end_date, "end_date", &mut errors);

    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            errors.push("end_date must not be earlier than start_date".to_string());
        }
    }

    // Validation failures short-circuit: the report service is never invoked.
    if !errors.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<report::Model>::validation_errors(errors)),
        )
            .into_response());
    }

    let (start, end) = (start.unwrap(), end.unwrap());
    let persisted = state.report_service.generate_report(start, end).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(persisted))).into_response())
}

/// Retrieve the most recently generated reports, newest first
#[utoipa::path(
    get,
    path = "/api/reports/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Recent reports retrieved", body = ApiResponse<Vec<report::Model>>),
        (status = 500, description = "History retrieval failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Reports"
)]
pub async fn report_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<report::Model>>>, ServiceError> {
    let reports = state.report_service.list_recent_reports(params.limit).await?;
    Ok(Json(ApiResponse::success(reports)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_and_plain_dates() {
        let mut errors = Vec::new();
        let full = parse_report_date("2026-03-01T12:30:00Z", "start_date", &mut errors);
        let plain = parse_report_date("2026-03-01", "start_date", &mut errors);
        assert!(errors.is_empty());
        assert!(full.unwrap() > plain.unwrap());
    }

    #[test]
    fn rejects_garbage_with_a_field_level_message() {
        let mut errors = Vec::new();
        assert!(parse_report_date("not-a-date", "end_date", &mut errors).is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("end_date"));
    }
}
