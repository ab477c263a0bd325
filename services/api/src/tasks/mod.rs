pub mod housekeeper_task;
pub mod reconciliation_task;

pub use housekeeper_task::housekeeper_process;
pub use reconciliation_task::{reconcile_once, reconciliation_process, TickReport};
