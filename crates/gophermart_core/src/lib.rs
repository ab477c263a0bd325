pub mod domain;
pub mod luhn;
pub mod ports;
pub mod token_cache;

pub use domain::{
    AccrualOutcome, AccrualReport, Balance, Order, OrderStatus, OrderSubmission, UserCredentials,
    Withdrawal,
};
pub use ports::{AccrualService, DatabaseService, PortError, PortResult};
pub use token_cache::{Session, TokenCache, TokenLookup};
