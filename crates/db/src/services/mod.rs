//! Wallet services: orchestration over the repositories.

mod admin;
mod charge;
mod reconciliation;

pub use admin::{ManualDeposit, WalletAdminService};
pub use charge::ChargeService;
pub use reconciliation::{ReconciliationService, VerifyDepositOutcome};
