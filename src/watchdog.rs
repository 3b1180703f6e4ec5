//! Inactivity watchdog.
//!
//! A detached periodic task that restarts the AI session once it has been
//! idle past the threshold. It goes through the same `check_inactivity`
//! interface external callers use; an in-flight exchange always wins
//! because the check requires the session lock to be free.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::ai::manager::SessionManager;

/// Interval between inactivity checks.
pub const CHECK_PERIOD: Duration = Duration::from_secs(60);

/// Spawn the watchdog tick loop.
pub fn spawn(manager: Arc<SessionManager>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            manager.check_inactivity().await;
        }
    })
}
