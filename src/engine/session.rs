//! Session boundaries
//!
//! `Start` refreshes the position cache and warms fresh accumulators from
//! history. `End` flattens every open position and resets all per-symbol
//! state. The scheduler below sends both on a weekday clock; anything else
//! that can send a [`SessionSignal`] can drive the engine the same way.

use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, Weekday};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionSignal {
    Start,
    End,
}

/// Next session boundary strictly after `now`, skipping weekends
pub fn next_boundary(
    now: NaiveDateTime,
    open: NaiveTime,
    close: NaiveTime,
) -> (NaiveDateTime, SessionSignal) {
    for offset in 0..8 {
        let date = now.date() + ChronoDuration::days(offset);
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }
        for (time, signal) in [(open, SessionSignal::Start), (close, SessionSignal::End)] {
            let at = date.and_time(time);
            if at > now {
                return (at, signal);
            }
        }
    }
    // eight consecutive days always contain a weekday boundary
    (now + ChronoDuration::days(1), SessionSignal::Start)
}

/// Send `Start` at `open` and `End` at `close` (local time) every weekday.
///
/// Returns once the receiving side is gone.
#[instrument(skip(sender))]
pub async fn run_scheduler(open: NaiveTime, close: NaiveTime, sender: mpsc::Sender<SessionSignal>) {
    loop {
        let now = Local::now().naive_local();
        let (at, signal) = next_boundary(now, open, close);
        let wait = (at - now).to_std().unwrap_or_default();
        info!(?signal, at = %at, wait_secs = wait.as_secs(), "Next session boundary scheduled");

        tokio::time::sleep(wait).await;

        if sender.send(signal).await.is_err() {
            warn!("Session receiver dropped, scheduler stopping");
            break;
        }
    }
}
