//! Orderflow API Library
//!
//! Order-to-fulfillment workflow engine: quotation lifecycle, sale order
//! conversion, credit gating and exclusive rider assignment.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::Authorizer;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
    pub authorizer: Arc<dyn Authorizer>,
}

// Common response wrapper
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_response_carries_data() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, Some("ok"));
        assert!(response.message.is_none());
    }

    #[test]
    fn error_response_carries_message() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("oops"));
    }
}
