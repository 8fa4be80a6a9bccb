//! Common types used across the application.

pub mod id;
pub mod money;
pub mod pagination;

pub use id::*;
pub use money::{MINOR_UNIT_SCALE, is_minor_unit_amount, round_minor};
pub use pagination::{PageMeta, PageRequest, PageResponse};
