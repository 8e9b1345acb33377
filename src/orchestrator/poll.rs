//! Fixed-interval polling bounded by a deadline
//!
//! The first poll happens one interval after the start. Each tick races the
//! deadline; when both are due at once the deadline wins, so a loop never
//! polls at or past its deadline. A check in flight also races the deadline,
//! so a hung remote query cannot stretch the wait.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Answer of a single poll
#[derive(Debug)]
pub enum Check<T, P> {
    Ready(T),
    /// Not there yet; `P` describes what was observed
    Pending(P),
}

#[derive(Debug)]
pub enum PollOutcome<T, P> {
    Ready { value: T, polls: u32 },
    TimedOut { last: Option<P>, polls: u32 },
}

/// Call `check` every `policy.interval` until it is ready or `policy.timeout`
/// elapses. An error from `check` ends the loop immediately.
pub async fn poll_until<T, P, E, F, Fut>(
    policy: PollPolicy,
    mut check: F,
) -> Result<PollOutcome<T, P>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Check<T, P>, E>>,
{
    let start = Instant::now();
    let period = policy.interval.max(Duration::from_millis(1));

    let deadline = sleep_until(start + policy.timeout);
    tokio::pin!(deadline);

    let mut ticker = interval_at(start + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut polls = 0u32;
    let mut last = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => return Ok(PollOutcome::TimedOut { last, polls }),
            _ = ticker.tick() => {}
        }

        polls += 1;
        // A check that hangs is cut off by the same deadline
        let answer = tokio::select! {
            biased;
            _ = &mut deadline => return Ok(PollOutcome::TimedOut { last, polls }),
            answer = check() => answer?,
        };

        match answer {
            Check::Ready(value) => return Ok(PollOutcome::Ready { value, polls }),
            Check::Pending(observed) => {
                trace!("poll {} not ready", polls);
                last = Some(observed);
            }
        }
    }
}
