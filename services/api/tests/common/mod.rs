//! In-memory implementations of the ports, shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use gophermart_core::domain::{
    AccrualReport, Balance, Order, OrderStatus, OrderSubmission, UserCredentials, Withdrawal,
};
use gophermart_core::ports::{AccrualService, DatabaseService, PortError, PortResult};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

//=========================================================================================
// MemoryDb
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: HashMap<String, String>,
    orders: Vec<Order>,
    balances: HashMap<String, Balance>,
    withdrawals: Vec<Withdrawal>,
}

/// A `DatabaseService` backed by plain collections.
///
/// It does not override `apply_accrual`, so the trait's default composition is
/// what the reconciliation tests exercise.
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an order directly, creating its owner's balance if needed.
    pub fn seed_order(&self, login: &str, number: &str, status: OrderStatus) {
        let mut tables = self.tables.lock().unwrap();
        tables
            .balances
            .entry(login.to_string())
            .or_insert_with(|| Balance::empty(login));
        let now = Utc::now();
        tables.orders.push(Order {
            number: number.to_string(),
            login: login.to_string(),
            status,
            accrual: 0.0,
            uploaded_at: now,
            last_changed: now,
        });
    }

    pub fn order(&self, number: &str) -> Option<Order> {
        let tables = self.tables.lock().unwrap();
        tables.orders.iter().find(|o| o.number == number).cloned()
    }

    pub fn balance_of(&self, login: &str) -> Option<Balance> {
        self.tables.lock().unwrap().balances.get(login).cloned()
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn register_user(&self, login: &str, password_hash: &str) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.contains_key(login) {
            return Err(PortError::Conflict(format!("login {} is taken", login)));
        }
        tables
            .users
            .insert(login.to_string(), password_hash.to_string());
        tables
            .balances
            .insert(login.to_string(), Balance::empty(login));
        Ok(())
    }

    async fn get_user(&self, login: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .get(login)
            .map(|hash| UserCredentials {
                login: login.to_string(),
                password_hash: hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("user {}", login)))
    }

    async fn add_order(&self, login: &str, number: &str) -> PortResult<OrderSubmission> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(existing) = tables.orders.iter().find(|o| o.number == number) {
            if existing.login == login {
                return Ok(OrderSubmission::AlreadyUploaded(existing.clone()));
            }
            return Ok(OrderSubmission::OwnedByAnother);
        }
        let now = Utc::now();
        let order = Order {
            number: number.to_string(),
            login: login.to_string(),
            status: OrderStatus::New,
            accrual: 0.0,
            uploaded_at: now,
            last_changed: now,
        };
        tables.orders.push(order.clone());
        Ok(OrderSubmission::Created(order))
    }

    async fn get_order(&self, number: &str) -> PortResult<Order> {
        self.order(number)
            .ok_or_else(|| PortError::NotFound(format!("order {}", number)))
    }

    async fn get_orders_by_user(&self, login: &str) -> PortResult<Vec<Order>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.login == login)
            .cloned()
            .collect())
    }

    async fn get_orders_undone(&self) -> PortResult<Vec<Order>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .orders
            .iter()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn modify_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: f64,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.number == number)
            .ok_or_else(|| PortError::NotFound(format!("order {}", number)))?;
        order.status = status;
        order.accrual = accrual;
        order.last_changed = Utc::now();
        Ok(())
    }

    async fn get_balance(&self, login: &str) -> PortResult<Balance> {
        self.balance_of(login)
            .ok_or_else(|| PortError::NotFound(format!("balance of {}", login)))
    }

    async fn modify_balance(&self, login: &str, current: f64, withdrawn: f64) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let balance = tables
            .balances
            .get_mut(login)
            .ok_or_else(|| PortError::NotFound(format!("balance of {}", login)))?;
        balance.current = current;
        balance.withdrawn = withdrawn;
        Ok(())
    }

    async fn withdraw(&self, login: &str, order: &str, sum: f64) -> PortResult<Withdrawal> {
        let mut tables = self.tables.lock().unwrap();
        if tables.withdrawals.iter().any(|w| w.order == order) {
            return Err(PortError::Conflict(format!(
                "order {} was already used for a withdrawal",
                order
            )));
        }
        let balance = tables
            .balances
            .get(login)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("balance of {}", login)))?;
        let debited = balance
            .debited(sum)
            .ok_or(PortError::InsufficientFunds {
                requested: sum,
                available: balance.current,
            })?;
        tables.balances.insert(login.to_string(), debited);

        let withdrawal = Withdrawal {
            order: order.to_string(),
            login: login.to_string(),
            sum,
            processed_at: Utc::now(),
        };
        tables.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    async fn get_withdrawals(&self, login: &str) -> PortResult<Vec<Withdrawal>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .withdrawals
            .iter()
            .filter(|w| w.login == login)
            .cloned()
            .collect())
    }
}

//=========================================================================================
// ScriptedAccrual
//=========================================================================================

/// An `AccrualService` that replays queued answers per order number.
///
/// Orders with nothing queued are reported as unknown (`Ok(None)`).
#[derive(Default)]
pub struct ScriptedAccrual {
    answers: Mutex<HashMap<String, VecDeque<PortResult<Option<AccrualReport>>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAccrual {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, number: &str, answer: PortResult<Option<AccrualReport>>) {
        self.answers
            .lock()
            .unwrap()
            .entry(number.to_string())
            .or_default()
            .push_back(answer);
    }

    pub fn report(&self, number: &str, status: OrderStatus, accrual: f64) {
        self.push(
            number,
            Ok(Some(AccrualReport {
                order: number.to_string(),
                status,
                accrual,
            })),
        );
    }

    /// Order numbers asked about so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccrualService for ScriptedAccrual {
    async fn fetch_order(&self, number: &str) -> PortResult<Option<AccrualReport>> {
        self.calls.lock().unwrap().push(number.to_string());
        self.answers
            .lock()
            .unwrap()
            .get_mut(number)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Ok(None))
    }
}
