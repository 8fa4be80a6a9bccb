//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod deposit;
pub mod payment;
pub mod receiver_account;
pub mod wallet;

pub use deposit::{DepositRepository, PendingDeposit};
pub use payment::PaymentRepository;
pub use receiver_account::{
    CreateReceiverAccountInput, ReceiverAccountRepository, UpdateReceiverAccountInput,
};
pub use wallet::{LedgerAudit, TransactionHistoryFilter, WalletRepository};
