//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between HTTP clients and the GopherMart API.

use chrono::{DateTime, Utc};
use gophermart_core::domain::{Balance, Order, OrderStatus, Withdrawal};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

//=========================================================================================
// Requests
//=========================================================================================

/// Body of `/api/user/register` and `/api/user/login`.
#[derive(Deserialize, ToSchema, Debug)]
pub struct CredentialsRequest {
    pub login: String,
    pub password: String,
}

/// Body of `/api/user/balance/withdraw`.
#[derive(Deserialize, ToSchema, Debug)]
pub struct WithdrawRequest {
    /// Number of the order paid with points; must pass the Luhn check.
    pub order: String,
    /// Points to spend; strictly positive.
    pub sum: f64,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, ToSchema, Debug)]
pub struct AuthResponse {
    pub login: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct OrderResponse {
    pub number: String,
    /// One of `NEW`, `PROCESSING`, `INVALID`, `PROCESSED`.
    pub status: String,
    /// Present only for processed orders.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accrual: Option<f64>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let accrual = (order.status == OrderStatus::Processed).then_some(order.accrual);
        Self {
            number: order.number,
            status: order.status.as_str().to_string(),
            accrual,
            uploaded_at: order.uploaded_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct BalanceResponse {
    pub current: f64,
    pub withdrawn: f64,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            current: balance.current,
            withdrawn: balance.withdrawn,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct WithdrawalResponse {
    pub order: String,
    pub sum: f64,
    pub processed_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            order: withdrawal.order,
            sum: withdrawal.sum,
            processed_at: withdrawal.processed_at,
        }
    }
}
