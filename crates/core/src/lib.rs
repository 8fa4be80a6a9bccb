//! Core business logic for Kasa.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All wallet rules and calculations live here.
//!
//! # Modules
//!
//! - `wallet` - Charges, balance guard, deposit lifecycle, reconciliation decisions

pub mod wallet;
