//! crates/gophermart_core/src/domain.rs
//!
//! Defines the pure, core data structures for the loyalty system.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Processing state of an uploaded order, mirrored from the accrual system.
///
/// Transitions only ever move forward: `New -> Processing -> {Invalid | Processed}`.
/// `Invalid` and `Processed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Invalid | OrderStatus::Processed => 2,
        }
    }

    /// Whether moving from `self` to `next` is a strictly forward transition.
    ///
    /// Repeating the current status is not an advance, and nothing leaves a
    /// terminal status.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    /// Accepts the accrual system's `REGISTERED` as a synonym for `NEW`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" | "REGISTERED" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// An order number uploaded by a user for points accrual.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub number: String,
    pub login: String,
    pub status: OrderStatus,
    /// Points credited for this order. Zero until the order is `Processed`.
    pub accrual: f64,
    pub uploaded_at: DateTime<Utc>,
    pub last_changed: DateTime<Utc>,
}

/// Result of uploading an order number.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderSubmission {
    /// The number was unknown and now belongs to the uploader.
    Created(Order),
    /// The uploader had already submitted this number.
    AlreadyUploaded(Order),
    /// Another login owns this number.
    OwnedByAnother,
}

/// Points account of a single login.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub login: String,
    pub current: f64,
    pub withdrawn: f64,
}

impl Balance {
    pub fn empty(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            current: 0.0,
            withdrawn: 0.0,
        }
    }

    pub fn credited(&self, amount: f64) -> Balance {
        Balance {
            login: self.login.clone(),
            current: self.current + amount,
            withdrawn: self.withdrawn,
        }
    }

    /// Returns the balance after debiting `sum`, or `None` when the current
    /// points do not cover it.
    pub fn debited(&self, sum: f64) -> Option<Balance> {
        if sum > self.current {
            return None;
        }
        Some(Balance {
            login: self.login.clone(),
            current: self.current - sum,
            withdrawn: self.withdrawn + sum,
        })
    }
}

/// Append-only record of points spent against an order.
#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    pub order: String,
    pub login: String,
    pub sum: f64,
    pub processed_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub login: String,
    pub password_hash: String,
}

/// What the accrual system currently reports for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualReport {
    pub order: String,
    pub status: OrderStatus,
    /// Meaningful only when `status` is `Processed`; zero otherwise.
    pub accrual: f64,
}

/// Effect of applying an [`AccrualReport`] to local state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccrualOutcome {
    /// The order moved forward to `status`; `credited` points were added to the balance.
    Advanced { status: OrderStatus, credited: f64 },
    /// The report was not a forward transition and nothing was written.
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        assert!(OrderStatus::New.can_advance_to(OrderStatus::Processing));
        assert!(OrderStatus::New.can_advance_to(OrderStatus::Processed));
        assert!(OrderStatus::Processing.can_advance_to(OrderStatus::Invalid));
        assert!(!OrderStatus::Processing.can_advance_to(OrderStatus::Processing));
        assert!(!OrderStatus::Processing.can_advance_to(OrderStatus::New));
        assert!(!OrderStatus::Processed.can_advance_to(OrderStatus::Invalid));
        assert!(!OrderStatus::Invalid.can_advance_to(OrderStatus::Processed));
    }

    #[test]
    fn registered_parses_as_new() {
        assert_eq!("REGISTERED".parse::<OrderStatus>(), Ok(OrderStatus::New));
        assert_eq!("PROCESSED".parse::<OrderStatus>(), Ok(OrderStatus::Processed));
        assert!("DONE".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn debit_never_goes_negative() {
        let balance = Balance::empty("alice").credited(100.0);
        let after = balance.debited(40.0).unwrap();
        assert_eq!(after.current, 60.0);
        assert_eq!(after.withdrawn, 40.0);
        assert!(after.debited(60.5).is_none());
    }
}
