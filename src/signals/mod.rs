//! Signal ledger, performance aggregation and position monitoring.

pub mod ledger;
pub mod monitor;
pub mod performance;

pub use ledger::{LedgerError, SignalLedger, SignalQuery};
pub use monitor::{check_live_signals, MonitorContext, MonitorTick};
pub use performance::PerformanceReport;
