pub mod refresh;
pub mod timers;

use crate::error::{ReminderError, ReminderResult};
use crate::history::HistoryStore;
use crate::models::{
    Ayah, CANONICAL_PRAYERS, Devotional, NotificationKind, NotificationRecord, PrayerTimes,
};
use crate::notify::composer::{
    ComposeOptions, NotificationComposer, Primary, ayah_detail_url, devotional_message,
};
use crate::providers::ContentProvider;
use crate::random::Randomness;
use crate::store::{KeyValueStore, keys, load_settings, read_value};
use chrono::{Local, NaiveTime, Timelike};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use timers::TimerName;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

/// Minutes a prayer time may be away from now and still fire.
const PRAYER_WINDOW_MINUTES: u32 = 1;

/// Content categories of the Dhikr/Dua provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categories {
    pub dhikr: String,
    pub dua: String,
}

/// Requests UI surfaces send to the background service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action")]
pub enum MessageRequest {
    #[serde(rename = "fetchRandomAyah")]
    FetchRandomAyah,
    #[serde(rename = "fetchRandomDhikr")]
    FetchRandomDhikr,
}

/// Turns timer fires into notifications.
///
/// Holds no state between ticks: every handler reads settings and prayer times
/// from the store when it starts.
pub struct ReminderScheduler {
    store: Arc<dyn KeyValueStore>,
    content: Arc<dyn ContentProvider>,
    composer: NotificationComposer,
    history: HistoryStore,
    random: Arc<dyn Randomness>,
    categories: Categories,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        content: Arc<dyn ContentProvider>,
        composer: NotificationComposer,
        history: HistoryStore,
        random: Arc<dyn Randomness>,
        categories: Categories,
    ) -> Self {
        Self {
            store,
            content,
            composer,
            history,
            random,
            categories,
        }
    }

    /// Runs the handler for `name`. Handler failures are logged here and go no further.
    pub async fn dispatch(&self, name: &str) {
        let timer = match name.parse::<TimerName>() {
            Ok(timer) => timer,
            Err(error) => {
                warn!(error = %error, "ignoring timer fire");
                return;
            }
        };

        let outcome = match timer {
            TimerName::CheckPrayerTimes => self
                .check_prayer_times_at(Local::now().time())
                .await
                .map(|records| records.len()),
            TimerName::ShowIslamicQuote => self
                .show_islamic_quote()
                .await
                .map(|record| usize::from(record.is_some())),
            TimerName::RandomContentReminder => self
                .random_content_reminder()
                .await
                .map(|record| usize::from(record.is_some())),
            TimerName::DailyCleanup => self.daily_cleanup().await,
        };

        match outcome {
            Ok(affected) => debug!(timer = %timer, affected, "timer handled"),
            Err(error) => error!(timer = %timer, error = %error, "timer handler failed"),
        }
    }

    /// Dispatches every fire received on `events`, each in its own task.
    pub async fn run(self: Arc<Self>, mut events: UnboundedReceiver<TimerName>) -> anyhow::Result<()> {
        info!("reminder scheduler started");

        while let Some(timer) = events.recv().await {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                scheduler.dispatch(timer.as_str()).await;
            });
        }

        info!("timer channel closed");
        Ok(())
    }

    pub async fn check_prayer_times_at(
        &self,
        now: NaiveTime,
    ) -> ReminderResult<Vec<NotificationRecord>> {
        let Some(times) = read_value::<PrayerTimes>(self.store.as_ref(), keys::PRAYER_TIMES).await?
        else {
            return Ok(Vec::new());
        };

        let due = prayers_due(&times, now.hour() * 60 + now.minute());
        if due.is_empty() {
            return Ok(Vec::new());
        }

        let settings = load_settings(self.store.as_ref()).await?;
        let mut records = Vec::with_capacity(due.len());
        for prayer in due {
            let composed = self
                .composer
                .compose(
                    NotificationKind::Prayer,
                    Primary::Prayer(prayer.to_string()),
                    ComposeOptions::from(&settings),
                )
                .await;

            match composed {
                Ok(record) => records.push(record),
                Err(error) => error!(prayer, error = %error, "prayer notification failed"),
            }
        }

        Ok(records)
    }

    pub async fn show_islamic_quote(&self) -> ReminderResult<Option<NotificationRecord>> {
        let Some(entry) = self.pick_devotional(&self.categories.dhikr).await? else {
            return Ok(None);
        };

        let settings = load_settings(self.store.as_ref()).await?;
        self.composer
            .compose(
                NotificationKind::Dhikr,
                Primary::Devotional(entry),
                ComposeOptions::from(&settings),
            )
            .await
            .map(Some)
    }

    /// Heads shows a verse, tails a Dua. A disabled side shows nothing; the
    /// coin is not flipped again.
    pub async fn random_content_reminder(&self) -> ReminderResult<Option<NotificationRecord>> {
        let heads = self.random.coin_flip();
        let settings = load_settings(self.store.as_ref()).await?;
        let options = ComposeOptions::from(&settings);

        if heads {
            if !settings.show_ayah {
                debug!("ayah reminders disabled, skipping tick");
                return Ok(None);
            }

            let ayah = self.content.random_ayah().await?;
            return self
                .composer
                .compose(NotificationKind::Ayah, Primary::Ayah(ayah), options)
                .await
                .map(Some);
        }

        if !settings.show_dua {
            debug!("dua reminders disabled, skipping tick");
            return Ok(None);
        }

        let Some(dua) = self.pick_devotional(&self.categories.dua).await? else {
            return Ok(None);
        };
        self.composer
            .compose(NotificationKind::Dua, Primary::Devotional(dua), options)
            .await
            .map(Some)
    }

    pub async fn daily_cleanup(&self) -> ReminderResult<usize> {
        self.history.sweep_unfavorited().await
    }

    /// Resolves a notification button press to the page it should open.
    pub async fn on_button_clicked(
        &self,
        notification_id: &str,
        button_index: usize,
    ) -> ReminderResult<Option<String>> {
        if button_index != 0 {
            return Ok(None);
        }

        let last = read_value::<Ayah>(self.store.as_ref(), keys::LAST_AYAH).await?;
        debug!(notification_id, found = last.is_some(), "view details requested");

        Ok(last.as_ref().map(ayah_detail_url))
    }

    /// Answers a UI request with the provider payload, or `null` when it failed.
    pub async fn handle_message(&self, request: MessageRequest) -> Value {
        let payload = match request {
            MessageRequest::FetchRandomAyah => self
                .content
                .random_ayah()
                .await
                .and_then(|ayah| to_payload(&ayah)),
            MessageRequest::FetchRandomDhikr => self
                .pick_devotional(&self.categories.dhikr)
                .await
                .and_then(|entry| entry.map(|entry| to_payload(&entry)).unwrap_or(Ok(Value::Null))),
        };

        payload.unwrap_or_else(|error| {
            warn!(request = ?request, error = %error, "message request failed");
            Value::Null
        })
    }

    /// One random entry of `category` with something to show, if any.
    async fn pick_devotional(&self, category: &str) -> ReminderResult<Option<Devotional>> {
        let mut entries = self.content.devotionals(category).await?;

        if entries.is_empty() {
            warn!(category, "content provider returned no entries");
            return Ok(None);
        }

        let entry = entries.swap_remove(self.random.below(entries.len()));
        if devotional_message(&entry).is_empty() {
            warn!(category, "selected entry has no content to display");
            return Ok(None);
        }

        Ok(Some(entry))
    }
}

/// Canonical prayers whose time is within one minute of `minute_of_day`.
pub fn prayers_due(times: &PrayerTimes, minute_of_day: u32) -> Vec<&'static str> {
    CANONICAL_PRAYERS
        .into_iter()
        .filter(|prayer| {
            times
                .minute_of_day(prayer)
                .is_some_and(|scheduled| scheduled.abs_diff(minute_of_day) <= PRAYER_WINDOW_MINUTES)
        })
        .collect()
}

fn to_payload<T: serde::Serialize>(value: &T) -> ReminderResult<Value> {
    serde_json::to_value(value).map_err(|error| ReminderError::InvalidContent(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationContent, Settings};
    use crate::notify::recording::RecordingSurface;
    use crate::providers::fake::FakeContent;
    use crate::random::fixed::Fixed;
    use crate::store::memory::MemoryStore;
    use crate::store::write_value;

    struct Harness {
        store: Arc<MemoryStore>,
        surface: Arc<RecordingSurface>,
        content: Arc<FakeContent>,
        scheduler: ReminderScheduler,
    }

    fn harness(content: FakeContent, heads: bool) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let surface = Arc::new(RecordingSurface::default());
        let content = Arc::new(content);
        let history = HistoryStore::new(store.clone());
        let composer =
            NotificationComposer::new(store.clone(), history.clone(), surface.clone(), None);
        let scheduler = ReminderScheduler::new(
            store.clone(),
            content.clone(),
            composer,
            history,
            Arc::new(Fixed { heads, index: 0 }),
            Categories {
                dhikr: "zikir-pagi-petang".to_string(),
                dua: "daily-dua".to_string(),
            },
        );

        Harness {
            store,
            surface,
            content,
            scheduler,
        }
    }

    async fn seed_settings(harness: &Harness, show_ayah: bool, show_dua: bool) {
        write_value(
            harness.store.as_ref(),
            keys::SETTINGS,
            &Settings {
                show_ayah,
                show_dua,
            },
        )
        .await
        .expect("settings");
    }

    async fn seed_times(harness: &Harness, times: PrayerTimes) {
        write_value(harness.store.as_ref(), keys::PRAYER_TIMES, &times)
            .await
            .expect("times");
    }

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 30).expect("time")
    }

    #[test]
    fn prayer_fires_within_one_minute_each_side() {
        let times = PrayerTimes::from([("Dhuhr", "12:00")]);

        for minute in 0..(24 * 60) {
            let expected = (minute as i64 - 720).abs() <= 1;
            assert_eq!(
                prayers_due(&times, minute) == ["Dhuhr"],
                expected,
                "minute {minute}"
            );
        }
    }

    #[test]
    fn prayers_fire_independently_and_skip_sunrise() {
        let times = PrayerTimes::from([
            ("Fajr", "05:00"),
            ("Sunrise", "05:01"),
            ("Dhuhr", "05:02"),
            ("Asr", "05:04"),
        ]);

        assert_eq!(prayers_due(&times, 5 * 60 + 1), ["Fajr", "Dhuhr"]);
        assert_eq!(prayers_due(&times, 5 * 60 + 3), ["Dhuhr", "Asr"]);
        assert!(prayers_due(&times, 6 * 60).is_empty());
    }

    #[tokio::test]
    async fn missing_prayer_times_is_a_quiet_no_op() {
        let harness = harness(FakeContent::default(), true);

        let records = harness
            .scheduler
            .check_prayer_times_at(at(5, 0))
            .await
            .expect("no-op");
        assert!(records.is_empty());
        assert!(harness.surface.shown().is_empty());
    }

    #[tokio::test]
    async fn prayers_due_in_one_tick_get_distinct_ids() {
        let harness = harness(FakeContent::default(), true);
        seed_times(&harness, PrayerTimes::from([("Fajr", "05:00"), ("Dhuhr", "05:02")])).await;

        let records = harness
            .scheduler
            .check_prayer_times_at(at(5, 1))
            .await
            .expect("composed");

        assert_eq!(records.len(), 2);
        assert!(records[0].id.starts_with("prayer-fajr-"));
        assert!(records[1].id.starts_with("prayer-dhuhr-"));
        assert_eq!(harness.scheduler.history.history().await.expect("history").len(), 2);
    }

    #[tokio::test]
    async fn failed_prayer_does_not_stop_the_next_one() {
        let harness = harness(FakeContent::default(), true);
        seed_times(&harness, PrayerTimes::from([("Fajr", "05:00"), ("Dhuhr", "05:02")])).await;
        harness.store.fail_next_updates(1);

        let records = harness
            .scheduler
            .check_prayer_times_at(at(5, 1))
            .await
            .expect("tick survives");

        assert_eq!(records.len(), 1);
        assert!(records[0].id.starts_with("prayer-dhuhr-"));
        assert_eq!(harness.surface.shown().len(), 2);
        let history = harness.scheduler.history.history().await.expect("history");
        assert_eq!(history, records);
    }

    #[tokio::test]
    async fn due_prayer_is_composed_with_its_dua() {
        let harness = harness(FakeContent::default(), true);
        seed_times(&harness, PrayerTimes::from([("Fajr", "05:00"), ("Isha", "19:00")])).await;

        let records = harness
            .scheduler
            .check_prayer_times_at(at(4, 59))
            .await
            .expect("checked");

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].content,
            NotificationContent::Prayer(crate::models::PrayerContent {
                prayer: "Fajr".to_string()
            })
        );
        let shown = harness.surface.shown();
        assert!(shown[0].1.body.contains("\n\nDua: "));
    }

    #[tokio::test]
    async fn disabled_ayah_side_shows_nothing() {
        let harness = harness(FakeContent::with_sample_content(), true);
        seed_settings(&harness, false, true).await;

        let record = harness
            .scheduler
            .random_content_reminder()
            .await
            .expect("tick");

        assert!(record.is_none());
        assert!(harness.surface.shown().is_empty());
        assert_eq!(harness.content.ayah_calls(), 0);
    }

    #[tokio::test]
    async fn tails_with_dua_enabled_shows_a_dua() {
        let harness = harness(FakeContent::with_sample_content(), false);
        seed_settings(&harness, false, true).await;

        let record = harness
            .scheduler
            .random_content_reminder()
            .await
            .expect("tick")
            .expect("dua composed");

        assert_eq!(record.kind, NotificationKind::Dua);
        assert_eq!(harness.surface.shown()[0].1.title, "Daily Dua Reminder");
    }

    #[tokio::test]
    async fn disabled_dua_side_does_not_fall_back_to_ayah() {
        let harness = harness(FakeContent::with_sample_content(), false);
        seed_settings(&harness, true, false).await;

        assert!(harness
            .scheduler
            .random_content_reminder()
            .await
            .expect("tick")
            .is_none());
        assert_eq!(harness.content.ayah_calls(), 0);
    }

    #[tokio::test]
    async fn heads_shows_ayah_with_default_settings() {
        let harness = harness(FakeContent::with_sample_content(), true);

        let record = harness
            .scheduler
            .random_content_reminder()
            .await
            .expect("tick")
            .expect("ayah composed");

        assert_eq!(record.kind, NotificationKind::Ayah);
        assert_eq!(
            harness.scheduler.on_button_clicked(&record.id, 0).await.expect("click"),
            Some("https://quran.com/94/6".to_string())
        );
        assert_eq!(
            harness.scheduler.on_button_clicked(&record.id, 1).await.expect("click"),
            None
        );
    }

    #[tokio::test]
    async fn quote_with_empty_category_emits_nothing() {
        let harness = harness(FakeContent::default(), true);

        assert!(harness
            .scheduler
            .show_islamic_quote()
            .await
            .expect("tick")
            .is_none());
    }

    #[tokio::test]
    async fn provider_failure_is_contained_in_dispatch() {
        let harness = harness(FakeContent::failing(), true);

        harness.scheduler.dispatch("showIslamicQuote").await;
        harness.scheduler.dispatch("randomContentReminder").await;
        harness.scheduler.dispatch("notATimer").await;

        assert!(harness.surface.shown().is_empty());
        assert!(matches!(
            harness.scheduler.show_islamic_quote().await,
            Err(ReminderError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn daily_cleanup_dispatch_sweeps_history() {
        let harness = harness(FakeContent::with_sample_content(), true);
        harness.scheduler.show_islamic_quote().await.expect("quote");
        assert_eq!(harness.scheduler.history.history().await.expect("history").len(), 1);

        harness.scheduler.dispatch("dailyCleanup").await;

        assert!(harness.scheduler.history.history().await.expect("history").is_empty());
    }

    #[tokio::test]
    async fn messages_answer_with_payload_or_null() {
        let working = harness(FakeContent::with_sample_content(), true);
        let ayah = working
            .scheduler
            .handle_message(MessageRequest::FetchRandomAyah)
            .await;
        assert_eq!(ayah["surahNumber"], 94);

        let dhikr = working
            .scheduler
            .handle_message(MessageRequest::FetchRandomDhikr)
            .await;
        assert!(dhikr["arabic"].is_string());

        let failing = harness(FakeContent::failing(), true);
        assert!(failing
            .scheduler
            .handle_message(MessageRequest::FetchRandomAyah)
            .await
            .is_null());
    }

    #[test]
    fn message_requests_use_action_tag() {
        let request: MessageRequest =
            serde_json::from_str(r#"{"action":"fetchRandomDhikr"}"#).expect("decode");
        assert_eq!(request, MessageRequest::FetchRandomDhikr);
        assert!(serde_json::from_str::<MessageRequest>(r#"{"action":"other"}"#).is_err());
    }
}
