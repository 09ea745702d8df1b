//! Ephemeral key-value store
//!
//! Session state, scheduler leases, and rate-limit windows all live behind
//! one interface with atomic primitives:
//! - `try_open`: atomic check-then-set for session creation
//! - `close`: idempotent delete
//! - `list_active`: point-in-time snapshot for the billing scan
//! - `acquire_lease`: named lease with bounded TTL (set-if-absent-with-expiry)
//! - `incr_window`: fixed-window counter, expiry set on first increment
//!
//! The engine never read-modify-writes raw state outside these operations;
//! any store offering atomic conditional writes with expiration satisfies
//! the contract.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use podbill_common::{AccountId, ResourceKind, Result, SessionState};
use std::time::Duration;

/// Atomic ephemeral store shared by the session manager and the scheduler
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Record a new session unless one is already running for the key.
    ///
    /// Returns `false` without mutation if a session exists; the check and
    /// the set are one atomic unit, so two concurrent starts cannot both
    /// succeed.
    async fn try_open(
        &self,
        account: AccountId,
        kind: ResourceKind,
        state: SessionState,
    ) -> Result<bool>;

    /// Read current session state for a key
    async fn read(&self, account: AccountId, kind: ResourceKind) -> Result<Option<SessionState>>;

    /// Remove a session entry. Closing an absent session is a no-op.
    async fn close(&self, account: AccountId, kind: ResourceKind) -> Result<()>;

    /// Snapshot of currently running sessions for one resource kind.
    ///
    /// Point-in-time only: sessions opened during a billing scan need not
    /// appear in the same pass.
    async fn list_active(&self, kind: ResourceKind) -> Result<Vec<(AccountId, SessionState)>>;

    /// Acquire a named lease with the given TTL.
    ///
    /// Returns `false` if the lease is currently held. A crashed holder
    /// self-heals by letting the lease expire.
    async fn acquire_lease(&self, name: &str, ttl: Duration) -> Result<bool>;

    /// Increment a fixed-window counter, returning the new count.
    ///
    /// The expiry is set only on the first increment in a window.
    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64>;
}
