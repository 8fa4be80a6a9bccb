//! Shared types, errors, and configuration for Kasa.
//!
//! This crate provides common types used across all other crates:
//! - Decimal money helpers (minor-unit rounding)
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, DatabaseConfig, LogConfig, NotifierConfig, WalletConfig};
pub use error::{AppError, AppResult};
