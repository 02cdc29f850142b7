use crate::error::{ReminderError, ReminderResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, LocalResult, NaiveTime, TimeZone, Utc};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerName {
    CheckPrayerTimes,
    ShowIslamicQuote,
    RandomContentReminder,
    DailyCleanup,
}

impl TimerName {
    pub const ALL: [TimerName; 4] = [
        TimerName::CheckPrayerTimes,
        TimerName::ShowIslamicQuote,
        TimerName::RandomContentReminder,
        TimerName::DailyCleanup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckPrayerTimes => "checkPrayerTimes",
            Self::ShowIslamicQuote => "showIslamicQuote",
            Self::RandomContentReminder => "randomContentReminder",
            Self::DailyCleanup => "dailyCleanup",
        }
    }

    pub fn period_minutes(self) -> u64 {
        match self {
            Self::CheckPrayerTimes => 1,
            Self::ShowIslamicQuote | Self::RandomContentReminder => 120,
            Self::DailyCleanup => 1440,
        }
    }
}

impl fmt::Display for TimerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerName {
    type Err = ReminderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|timer| timer.as_str() == value)
            .ok_or_else(|| ReminderError::UnknownTimer(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSpec {
    pub name: TimerName,
    pub period_minutes: u64,
    /// First fire instant in epoch millis. Without it the timer first fires after one period.
    pub first_fire_at_ms: Option<i64>,
}

/// Named periodic timers. Registering an existing name replaces that timer.
#[async_trait]
pub trait TimerService: Send + Sync {
    async fn clear_all(&self);

    async fn register(&self, spec: TimerSpec);

    async fn registered(&self) -> Vec<TimerSpec>;
}

pub fn timer_specs(now: DateTime<Local>) -> ReminderResult<Vec<TimerSpec>> {
    let midnight = next_midnight(now)?.timestamp_millis();

    Ok(TimerName::ALL
        .into_iter()
        .map(|name| TimerSpec {
            name,
            period_minutes: name.period_minutes(),
            first_fire_at_ms: (name == TimerName::DailyCleanup).then_some(midnight),
        })
        .collect())
}

/// Clears every timer and registers all four again. Safe to repeat.
pub async fn initialize_timers(timers: &dyn TimerService, now: DateTime<Local>) -> ReminderResult<()> {
    let specs = timer_specs(now)?;

    timers.clear_all().await;
    for spec in specs {
        timers.register(spec).await;
    }

    info!(count = timers.registered().await.len(), "reminder timers registered");
    Ok(())
}

pub fn next_midnight(now: DateTime<Local>) -> ReminderResult<DateTime<Local>> {
    let tomorrow = now.date_naive() + ChronoDuration::days(1);
    let midnight = tomorrow.and_time(NaiveTime::MIN);

    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(datetime) => Ok(datetime),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Local
            .from_local_datetime(&(midnight + ChronoDuration::hours(1)))
            .earliest()
            .ok_or_else(|| {
                ReminderError::InvalidContent(format!("no local midnight on {tomorrow}"))
            }),
    }
}

/// In-process timers backed by tokio intervals; fires are sent down a channel.
pub struct TokioTimers {
    sender: UnboundedSender<TimerName>,
    active: Mutex<HashMap<TimerName, (TimerSpec, JoinHandle<()>)>>,
}

impl TokioTimers {
    pub fn new() -> (Self, UnboundedReceiver<TimerName>) {
        let (sender, receiver) = unbounded_channel();

        (
            Self {
                sender,
                active: Mutex::new(HashMap::new()),
            },
            receiver,
        )
    }

    fn spawn_timer(&self, spec: TimerSpec) -> JoinHandle<()> {
        let sender = self.sender.clone();
        let period = Duration::from_secs(spec.period_minutes.max(1) * 60);
        let first_delay = spec
            .first_fire_at_ms
            .map(|at| Duration::from_millis((at - Utc::now().timestamp_millis()).max(0) as u64))
            .unwrap_or(period);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + first_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                debug!(timer = %spec.name, "timer fired");

                if sender.send(spec.name).is_err() {
                    break;
                }
            }
        })
    }
}

#[async_trait]
impl TimerService for TokioTimers {
    async fn clear_all(&self) {
        if let Ok(mut active) = self.active.lock() {
            active.drain().for_each(|(_, (_, handle))| handle.abort());
        }
    }

    async fn register(&self, spec: TimerSpec) {
        let handle = self.spawn_timer(spec);

        if let Ok(mut active) = self.active.lock() {
            if let Some((_, previous)) = active.insert(spec.name, (spec, handle)) {
                previous.abort();
            }
        }
    }

    async fn registered(&self) -> Vec<TimerSpec> {
        self.active
            .lock()
            .map(|active| active.values().map(|(spec, _)| *spec).collect())
            .unwrap_or_default()
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        if let Ok(active) = self.active.get_mut() {
            active.values().for_each(|(_, handle)| handle.abort());
        }
    }
}
