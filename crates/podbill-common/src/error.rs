//! Error types for the PodBill engine
//!
//! Provides a unified error type and domain-specific error variants

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using PodBillError
pub type Result<T> = std::result::Result<T, PodBillError>;

/// Unified error type for PodBill operations
#[derive(Debug, Error)]
pub enum PodBillError {
    // Input errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Wallet errors
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    // Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // Rate limiting
    #[error("Rate limited: {action} exceeded {limit} per window")]
    RateLimited { action: String, limit: u64 },

    // Compute executor failures
    #[error("External execution error: {0}")]
    ExternalExecution(String),

    // Webhook rejection
    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wallet ledger errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WalletError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Account not found: {0}")]
    AccountNotFound(u64),

    #[error("Account is inactive: {0}")]
    AccountInactive(u64),
}

/// Session lifecycle errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("{kind} session already running")]
    AlreadyRunning { kind: String },

    #[error("{kind} session not running")]
    NotRunning { kind: String },
}

// Implement From for common external error types
impl From<serde_json::Error> for PodBillError {
    fn from(err: serde_json::Error) -> Self {
        PodBillError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for PodBillError {
    fn from(err: std::io::Error) -> Self {
        PodBillError::ExternalExecution(err.to_string())
    }
}

impl From<anyhow::Error> for PodBillError {
    fn from(err: anyhow::Error) -> Self {
        PodBillError::Internal(err.to_string())
    }
}
