use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    entities::{
        customer::CustomerRegion,
        report::{self, RegionRevenue, ReportMetrics, TopProduct},
    },
    errors::ErrorResponse,
    handlers,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sales Analytics API",
        version = "0.1.0",
        description = r#"
Sales analytics reporting backend.

Aggregates transactional sales records over an arbitrary date range into a
summary report (revenue KPIs, top products by quantity, revenue by customer
region), persists each generated report, and pushes new reports to connected
WebSocket viewers in real time.

Real-time events are served on `GET /api/ws`; each generated report is
delivered as a `report_generated` event carrying the full report payload.
Late joiners catch up via `GET /api/reports/history`.
"#
    ),
    paths(
        handlers::reports::generate_report,
        handlers::reports::report_history,
        handlers::health::health_check,
    ),
    components(schemas(
        handlers::reports::GenerateReportRequest,
        handlers::health::HealthStatus,
        report::Model,
        ReportMetrics,
        TopProduct,
        RegionRevenue,
        CustomerRegion,
        ErrorResponse,
    )),
    tags(
        (name = "Reports", description = "Report generation and history"),
        (name = "Health", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the OpenAPI document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
