//! Shared value types and constants.

pub mod account;
pub mod keys;
pub mod payload;

pub use account::AccountId;
pub use payload::{SubmissionId, TransactionPayload};
