use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone};
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const RESCHEDULE_POLL_SECONDS: u64 = 30;

/// Runs `task` once a day at the time `time_provider` returns.
///
/// The time is read again on every poll, so config edits apply without a restart.
pub async fn run_daily<S, F, Fut>(mut time_provider: S, mut task: F) -> Result<()>
where
    S: FnMut() -> Result<NaiveTime>,
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut last_logged = None;

    loop {
        let target = match time_provider() {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to load prayer refresh time");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        let delay = match delay_until(target, Local::now()) {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, time = %target, "invalid prayer refresh time");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        if last_logged != Some(target) {
            info!(seconds = delay.as_secs(), time = %target.format("%H:%M"), "next prayer refresh set");
            last_logged = Some(target);
        }

        if delay > Duration::from_secs(RESCHEDULE_POLL_SECONDS) {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        }

        sleep(delay).await;

        let date = Local::now().date_naive();
        if let Err(error) = task(date).await {
            error!(error = %error, date = %date, "scheduled prayer refresh failed");
        }

        sleep(Duration::from_secs(1)).await;
    }
}

/// Time left until the next local occurrence of `target` after `now`.
pub fn delay_until(target: NaiveTime, now: DateTime<Local>) -> Result<Duration> {
    let today = now.date_naive();

    let candidate_today = match Local.from_local_datetime(&today.and_time(target)) {
        LocalResult::Single(datetime) => Some(datetime),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => None,
    };

    let next_run = match candidate_today {
        Some(candidate) if candidate > now => candidate,
        _ => {
            let tomorrow = today + ChronoDuration::days(1);
            Local
                .from_local_datetime(&tomorrow.and_time(target))
                .earliest()
                .context("Failed to convert next refresh time")?
        }
    };

    (next_run - now)
        .to_std()
        .context("Failed to compute next refresh delay")
}

#[cfg(test)]
mod tests {
    use super::delay_until;
    use chrono::{Local, NaiveTime, TimeZone};

    fn local(hour: u32, minute: u32) -> chrono::DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 10, hour, minute, 0)
            .single()
            .expect("local time")
    }

    #[test]
    fn later_today_is_used_when_still_ahead() {
        let target = NaiveTime::from_hms_opt(12, 0, 0).expect("time");
        let delay = delay_until(target, local(11, 30)).expect("delay");

        assert_eq!(delay.as_secs(), 30 * 60);
    }

    #[test]
    fn passed_time_rolls_over_to_tomorrow() {
        let target = NaiveTime::from_hms_opt(0, 5, 0).expect("time");
        let delay = delay_until(target, local(0, 5)).expect("delay");

        assert!(delay.as_secs() > 22 * 3600);
        assert!(delay.as_secs() <= 25 * 3600);
    }
}
