// Order lifecycle: sizing, execution, the sell race and the session around them.
pub mod balance;
pub mod claim;
pub mod executor;
pub mod poller;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use balance::BalanceTracker;
pub use claim::SaleClaim;
pub use executor::OrderExecutor;
pub use poller::{MarginPoller, PollerState, SaleOutcome};
pub use session::{SessionController, SessionReport, TradeSession};
