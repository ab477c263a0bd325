//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Every logical operation checks its own connection out of the pool; multi-row
//! invariants (registration, withdrawals, accrual credits) run in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gophermart_core::domain::{
    AccrualOutcome, Balance, Order, OrderStatus, OrderSubmission, UserCredentials, Withdrawal,
};
use gophermart_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    login: String,
    password_hash: String,
}
impl UserRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            login: self.login,
            password_hash: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct OrderRecord {
    number: String,
    login: String,
    status: String,
    accrual: f64,
    uploaded_at: DateTime<Utc>,
    last_changed: DateTime<Utc>,
}
impl OrderRecord {
    fn to_domain(self) -> PortResult<Order> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Order {
            number: self.number,
            login: self.login,
            status,
            accrual: self.accrual,
            uploaded_at: self.uploaded_at,
            last_changed: self.last_changed,
        })
    }
}

#[derive(FromRow)]
struct BalanceRecord {
    login: String,
    current_score: f64,
    total_withdrawn: f64,
}
impl BalanceRecord {
    fn to_domain(self) -> Balance {
        Balance {
            login: self.login,
            current: self.current_score,
            withdrawn: self.total_withdrawn,
        }
    }
}

#[derive(FromRow)]
struct WithdrawalRecord {
    order_number: String,
    login: String,
    amount: f64,
    processed_at: DateTime<Utc>,
}
impl WithdrawalRecord {
    fn to_domain(self) -> Withdrawal {
        Withdrawal {
            order: self.order_number,
            login: self.login,
            sum: self.amount,
            processed_at: self.processed_at,
        }
    }
}

const ORDER_COLUMNS: &str = "number, login, status, accrual, uploaded_at, last_changed";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn register_user(&self, login: &str, password_hash: &str) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query("INSERT INTO users (login, password_hash) VALUES ($1, $2)")
            .bind(login)
            .bind(password_hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    PortError::Conflict(format!("Login {} is already taken", login))
                } else {
                    unexpected(e)
                }
            })?;

        sqlx::query("INSERT INTO balances (login, current_score, total_withdrawn) VALUES ($1, 0, 0)")
            .bind(login)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn get_user(&self, login: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT login, password_hash FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", login)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn add_order(&self, login: &str, number: &str) -> PortResult<OrderSubmission> {
        let inserted = sqlx::query_as::<_, OrderRecord>(&format!(
            "INSERT INTO orders (number, login) VALUES ($1, $2) \
             ON CONFLICT (number) DO NOTHING RETURNING {ORDER_COLUMNS}"
        ))
        .bind(number)
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        if let Some(record) = inserted {
            return Ok(OrderSubmission::Created(record.to_domain()?));
        }

        let existing = self.get_order(number).await?;
        if existing.login == login {
            Ok(OrderSubmission::AlreadyUploaded(existing))
        } else {
            Ok(OrderSubmission::OwnedByAnother)
        }
    }

    async fn get_order(&self, number: &str) -> PortResult<Order> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1"
        ))
        .bind(number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Order {} not found", number)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn get_orders_by_user(&self, login: &str) -> PortResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE login = $1 ORDER BY uploaded_at ASC"
        ))
        .bind(login)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_orders_undone(&self) -> PortResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE status IN ('NEW', 'PROCESSING') ORDER BY uploaded_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn modify_order(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: f64,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, accrual = $3, last_changed = now() WHERE number = $1",
        )
        .bind(number)
        .bind(status.as_str())
        .bind(accrual)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Order {} not found", number)));
        }
        Ok(())
    }

    async fn get_balance(&self, login: &str) -> PortResult<Balance> {
        let record = sqlx::query_as::<_, BalanceRecord>(
            "SELECT login, current_score, total_withdrawn FROM balances WHERE login = $1",
        )
        .bind(login)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Balance for {} not found", login))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn modify_balance(&self, login: &str, current: f64, withdrawn: f64) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE balances SET current_score = $2, total_withdrawn = $3 WHERE login = $1",
        )
        .bind(login)
        .bind(current)
        .bind(withdrawn)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Balance for {} not found", login)));
        }
        Ok(())
    }

    async fn withdraw(&self, login: &str, order: &str, sum: f64) -> PortResult<Withdrawal> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let balance = sqlx::query_as::<_, BalanceRecord>(
            "SELECT login, current_score, total_withdrawn FROM balances WHERE login = $1 FOR UPDATE",
        )
        .bind(login)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Balance for {} not found", login)))?
        .to_domain();

        let updated = balance
            .debited(sum)
            .ok_or(PortError::InsufficientFunds {
                requested: sum,
                available: balance.current,
            })?;

        let record = sqlx::query_as::<_, WithdrawalRecord>(
            "INSERT INTO withdrawals (order_number, login, amount) VALUES ($1, $2, $3) \
             RETURNING order_number, login, amount, processed_at",
        )
        .bind(order)
        .bind(login)
        .bind(sum)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("Order {} already has a withdrawal", order))
            } else {
                unexpected(e)
            }
        })?;

        sqlx::query("UPDATE balances SET current_score = $2, total_withdrawn = $3 WHERE login = $1")
            .bind(login)
            .bind(updated.current)
            .bind(updated.withdrawn)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_withdrawals(&self, login: &str) -> PortResult<Vec<Withdrawal>> {
        let records = sqlx::query_as::<_, WithdrawalRecord>(
            "SELECT order_number, login, amount, processed_at FROM withdrawals \
             WHERE login = $1 ORDER BY processed_at ASC",
        )
        .bind(login)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    /// Status write and balance credit in one transaction, with the order row locked
    /// so two concurrent reconcilers cannot both credit the same order.
    async fn apply_accrual(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: f64,
    ) -> PortResult<AccrualOutcome> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let order = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1 FOR UPDATE"
        ))
        .bind(number)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Order {} not found", number)))?
        .to_domain()?;

        if !order.status.can_advance_to(status) {
            debug!(order = number, from = %order.status, to = %status, "Ignoring non-forward transition");
            return Ok(AccrualOutcome::Unchanged);
        }

        let credited = if status == OrderStatus::Processed { accrual } else { 0.0 };

        sqlx::query(
            "UPDATE orders SET status = $2, accrual = $3, last_changed = now() WHERE number = $1",
        )
        .bind(number)
        .bind(status.as_str())
        .bind(credited)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        if credited > 0.0 {
            let result = sqlx::query(
                "UPDATE balances SET current_score = current_score + $2 WHERE login = $1",
            )
            .bind(&order.login)
            .bind(credited)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

            if result.rows_affected() == 0 {
                return Err(PortError::NotFound(format!(
                    "Balance for {} not found",
                    order.login
                )));
            }
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(AccrualOutcome::Advanced { status, credited })
    }
}
