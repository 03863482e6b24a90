// Reconciliation engine: plan order actions, execute them, run the loop.

pub mod executor;
pub mod reconcile;
pub mod runner;

pub use executor::{execute_actions, ExecutionReport, ORDER_EXPIRY_SECS};
pub use reconcile::{plan, STOP_BOOK_DEPTH};
pub use runner::Engine;
