//! crates/gophermart_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the loyalty system's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the concrete database and of the accrual system's wire format.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{
    AccrualOutcome, AccrualReport, Balance, Order, OrderStatus, OrderSubmission, UserCredentials,
    Withdrawal,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: f64, available: f64 },
    #[error("Rate limited by remote service (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---

    /// Creates the user together with its zero balance.
    /// Fails with `PortError::Conflict` if the login is taken.
    async fn register_user(&self, login: &str, password_hash: &str) -> PortResult<()>;

    async fn get_user(&self, login: &str) -> PortResult<UserCredentials>;

    // --- Orders ---

    async fn add_order(&self, login: &str, number: &str) -> PortResult<OrderSubmission>;

    async fn get_order(&self, number: &str) -> PortResult<Order>;

    /// Orders of one login, oldest upload first.
    async fn get_orders_by_user(&self, login: &str) -> PortResult<Vec<Order>>;

    /// Every order whose status is not terminal.
    async fn get_orders_undone(&self) -> PortResult<Vec<Order>>;

    async fn modify_order(&self, number: &str, status: OrderStatus, accrual: f64)
        -> PortResult<()>;

    // --- Balances ---

    async fn get_balance(&self, login: &str) -> PortResult<Balance>;

    async fn modify_balance(&self, login: &str, current: f64, withdrawn: f64) -> PortResult<()>;

    // --- Withdrawals ---

    /// Debits `sum` from the balance and records the withdrawal.
    /// Fails with `PortError::InsufficientFunds` and leaves the balance untouched
    /// when `sum` exceeds the current points.
    async fn withdraw(&self, login: &str, order: &str, sum: f64) -> PortResult<Withdrawal>;

    /// Withdrawals of one login, oldest first.
    async fn get_withdrawals(&self, login: &str) -> PortResult<Vec<Withdrawal>>;

    // --- Accrual ---

    /// Applies a status report from the accrual system to an order and its owner's balance.
    ///
    /// Only forward transitions are written, and the balance is credited only on the
    /// transition into `Processed`, so replaying a report never credits twice.
    ///
    /// This default composes the single-record operations and is not atomic;
    /// adapters that support transactions should override it.
    async fn apply_accrual(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: f64,
    ) -> PortResult<AccrualOutcome> {
        let order = self.get_order(number).await?;
        if !order.status.can_advance_to(status) {
            return Ok(AccrualOutcome::Unchanged);
        }

        let credited = if status == OrderStatus::Processed { accrual } else { 0.0 };
        self.modify_order(number, status, credited).await?;

        if credited > 0.0 {
            let balance = self.get_balance(&order.login).await?.credited(credited);
            self.modify_balance(&balance.login, balance.current, balance.withdrawn)
                .await?;
        }

        Ok(AccrualOutcome::Advanced { status, credited })
    }
}

#[async_trait]
pub trait AccrualService: Send + Sync {
    /// Fetches the accrual system's view of one order.
    ///
    /// `Ok(None)` means the order is not known there yet. Implementations must not
    /// retry; retry policy belongs to the caller.
    async fn fetch_order(&self, number: &str) -> PortResult<Option<AccrualReport>>;
}
