use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::Error;
use crate::Result;

/// Keeps a long-running phase busy for at most `percent` of the wall clock.
///
/// Work is timed from the previous rest; each call to [`Throttle::rest`] sleeps
/// long enough that active time is `percent` of active plus resting time.
#[derive(Debug)]
pub struct Throttle {
    percent: u8,
    state: Mutex<ThrottleState>,
}

#[derive(Debug)]
struct ThrottleState {
    active_since: Instant,
    total_active: Duration,
    total_rest: Duration,
}

impl Throttle {
    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.clamp(1, 100),
            state: Mutex::new(ThrottleState {
                active_since: Instant::now(),
                total_active: Duration::ZERO,
                total_rest: Duration::ZERO,
            }),
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Rest in proportion to the work done since the last rest.
    ///
    /// Returns `Error::Cancelled` if the token fires while resting.
    pub async fn rest(
        &self,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let rest = {
            let mut state = self.state.lock();
            let active = state.active_since.elapsed();
            state.total_active += active;
            if self.percent >= 100 {
                state.active_since = Instant::now();
                return Ok(());
            }
            active.mul_f64(f64::from(100 - self.percent) / f64::from(self.percent))
        };

        trace!("throttle resting for {:?}", rest);
        tokio::select! {
            _ = cancel.cancelled() => {
                self.restart(Duration::ZERO);
                Err(Error::Cancelled)
            }
            _ = tokio::time::sleep(rest) => {
                self.restart(rest);
                Ok(())
            }
        }
    }

    fn restart(
        &self,
        rested: Duration,
    ) {
        let mut state = self.state.lock();
        state.total_rest += rested;
        state.active_since = Instant::now();
    }

    pub fn total_rest(&self) -> Duration {
        self.state.lock().total_rest
    }

    pub fn pretty_stats(&self) -> String {
        let state = self.state.lock();
        format!(
            "Throttle at {}%. Active {:?}. Rested {:?}.",
            self.percent, state.total_active, state.total_rest
        )
    }
}
