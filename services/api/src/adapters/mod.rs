pub mod accrual;
pub mod db;

pub use accrual::HttpAccrualAdapter;
pub use db::DbAdapter;
