//! Sales Analytics API Library
//!
//! This crate provides date-range sales aggregation, persisted analytics
//! reports, and real-time report broadcasting to connected viewers.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod broadcast;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::Router;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::broadcast::ReportBroadcaster;
use crate::db::DbPool;
use crate::services::reports::ReportService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub broadcaster: ReportBroadcaster,
    pub report_service: ReportService,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: config::AppConfig) -> Self {
        let broadcaster = ReportBroadcaster::new(config.broadcast_capacity);
        let report_service = ReportService::new(
            db.clone(),
            broadcaster.clone(),
            config.aggregation_timeout(),
        );
        Self {
            db,
            config,
            broadcaster,
            report_service,
        }
    }
}

/// Assemble the application router with all API routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/reports", handlers::reports::reports_routes())
        .nest("/api/ws", handlers::ws::ws_routes())
        .nest("/health", handlers::health::health_routes())
        .merge(openapi::swagger_ui())
        .with_state(state)
}

// Common response wrapper
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn success_response_carries_data_and_timestamp() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, Some("ok"));
        DateTime::parse_from_rfc3339(&response.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn validation_errors_response_lists_field_messages() {
        let response = ApiResponse::<()>::validation_errors(vec![
            "start_date must be a valid ISO 8601 date".into(),
        ]);
        assert!(!response.success);
        assert_eq!(response.errors.as_ref().map(Vec::len), Some(1));
        assert_eq!(response.message.as_deref(), Some("Validation failed"));
    }
}
