use super::{HIGH_PRIORITY, NotificationRequest, NotificationSurface, SubmitOutcome};
use crate::error::{ReminderError, ReminderResult};
use crate::history::HistoryStore;
use crate::models::{
    Ayah, Devotional, NotificationContent, NotificationKind, NotificationRecord, PrayerContent,
    Settings,
};
use crate::store::{KeyValueStore, keys, write_value};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

const VIEW_DETAILS: &str = "View Details";

/// One devotional line per canonical prayer, appended to prayer notifications.
const PRAYER_DUAS: [(&str, &str); 5] = [
    ("Fajr", "اللَّهُمَّ بَارِكْ لِي فِي يَوْمِي هَذَا"),
    (
        "Dhuhr",
        "اللَّهُمَّ أَنْتَ السَّلاَمُ وَمِنْكَ السَّلاَمُ تَبَارَكْتَ يَا ذَا الْجَلاَلِ وَالإِكْرَامِ",
    ),
    ("Asr", "اللَّهُمَّ إِنِّي أَعُوذُ بِكَ مِنَ الْهَمِّ وَالْحَزَنِ"),
    (
        "Maghrib",
        "اللَّهُمَّ إِنِّي أَسْأَلُكَ عِلْمًا نَافِعًا وَرِزْقًا طَيِّبًا وَعَمَلاً مُتَقَبَّلاً",
    ),
    ("Isha", "اللَّهُمَّ أَسْلَمْتُ نَفْسِي إِلَيْكَ وَفَوَّضْتُ أَمْرِي إِلَيْكَ"),
];

pub fn prayer_dua(prayer: &str) -> Option<&'static str> {
    PRAYER_DUAS
        .iter()
        .find(|(name, _)| *name == prayer)
        .map(|(_, line)| *line)
}

/// Detail view for a verse, opened by the notification's first button.
pub fn ayah_detail_url(ayah: &Ayah) -> String {
    format!("https://quran.com/{}/{}", ayah.surah_number, ayah.ayah_number)
}

/// The content a notification is built from.
#[derive(Debug, Clone, PartialEq)]
pub enum Primary {
    Prayer(String),
    Ayah(Ayah),
    Devotional(Devotional),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeOptions {
    pub show_dua: bool,
}

impl From<&Settings> for ComposeOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            show_dua: settings.show_dua,
        }
    }
}

/// Title, body and extras of a notification before it gets an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub title: String,
    pub body: String,
    pub context: Option<String>,
    pub buttons: Vec<String>,
    pub action_url: Option<String>,
}

pub fn render(
    kind: NotificationKind,
    primary: &Primary,
    options: ComposeOptions,
) -> ReminderResult<Rendered> {
    match (kind, primary) {
        (NotificationKind::Prayer, Primary::Prayer(prayer)) => {
            let mut body =
                format!("It's time for {prayer} prayer. May Allah accept your prayers.");
            if let Some(line) = prayer_dua(prayer).filter(|_| options.show_dua) {
                body.push_str(&format!("\n\nDua: {line}"));
            }

            Ok(Rendered {
                title: format!("Time for {prayer}"),
                body,
                context: None,
                buttons: Vec::new(),
                action_url: None,
            })
        }
        (NotificationKind::Ayah, Primary::Ayah(ayah)) => {
            if ayah.text.trim().is_empty() {
                return Err(ReminderError::InvalidContent("ayah has no text".to_string()));
            }

            Ok(Rendered {
                title: "Quran Ayah of the Moment".to_string(),
                body: ayah.text.clone(),
                context: Some(format!(
                    "Surah {} ({}:{})",
                    ayah.surah_name_en, ayah.surah_number, ayah.ayah_number
                )),
                buttons: vec![VIEW_DETAILS.to_string()],
                action_url: Some(ayah_detail_url(ayah)),
            })
        }
        (NotificationKind::Dhikr | NotificationKind::Dua, Primary::Devotional(entry)) => {
            let body = devotional_message(entry);
            if body.is_empty() {
                return Err(ReminderError::InvalidContent(format!("{kind} has no content")));
            }

            let fallback_title = match kind {
                NotificationKind::Dua => "Daily Dua Reminder",
                _ => "Islamic Reminder",
            };

            Ok(Rendered {
                title: entry
                    .title
                    .clone()
                    .unwrap_or_else(|| fallback_title.to_string()),
                body,
                context: None,
                buttons: Vec::new(),
                action_url: None,
            })
        }
        (kind, primary) => Err(ReminderError::InvalidContent(format!(
            "{kind} notification cannot be built from {primary:?}"
        ))),
    }
}

/// Arabic text followed by whichever of translation, notes and benefits are present.
pub fn devotional_message(entry: &Devotional) -> String {
    let sections = [
        Some(entry.arabic.trim().to_string()),
        Some(entry.translation.trim().to_string()),
        entry.notes.as_ref().map(|notes| format!("Notes: {}", notes.trim())),
        entry
            .benefits
            .as_ref()
            .map(|benefits| format!("Benefits: {}", benefits.trim())),
    ];

    sections
        .into_iter()
        .flatten()
        .filter(|section| !section.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds notifications, shows them, and records them in History.
#[derive(Clone)]
pub struct NotificationComposer {
    store: Arc<dyn KeyValueStore>,
    history: HistoryStore,
    surface: Arc<dyn NotificationSurface>,
    icon: Option<PathBuf>,
}

impl NotificationComposer {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        history: HistoryStore,
        surface: Arc<dyn NotificationSurface>,
        icon: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            history,
            surface,
            icon,
        }
    }

    pub async fn compose(
        &self,
        kind: NotificationKind,
        primary: Primary,
        options: ComposeOptions,
    ) -> ReminderResult<NotificationRecord> {
        let rendered = render(kind, &primary, options)?;
        let content = match primary {
            Primary::Prayer(prayer) => NotificationContent::Prayer(PrayerContent { prayer }),
            Primary::Ayah(ayah) => NotificationContent::Ayah(ayah),
            Primary::Devotional(entry) => NotificationContent::Devotional(entry),
        };
        let record = NotificationRecord::new(kind, content, Utc::now().timestamp_millis());

        if let NotificationContent::Ayah(ayah) = &record.content {
            write_value(self.store.as_ref(), keys::LAST_AYAH, ayah).await?;
        }

        let request = NotificationRequest {
            icon: self.icon.clone(),
            title: rendered.title,
            body: rendered.body,
            context: rendered.context,
            priority: HIGH_PRIORITY,
            require_interaction: true,
            silent: true,
            buttons: rendered.buttons,
            action_url: rendered.action_url,
        };
        match self.submit(&record.id, &request).await {
            SubmitOutcome::Delivered(created) => {
                debug!(id = %record.id, created = %created, "notification submitted");
            }
            SubmitOutcome::Failed(error) => {
                debug!(id = %record.id, error = %error, "recording notification that was not shown");
            }
        }

        self.history.append(record.clone()).await?;
        Ok(record)
    }

    /// Hands the notification to the surface. Failures are logged, never raised.
    pub async fn submit(&self, id: &str, request: &NotificationRequest) -> SubmitOutcome {
        match self.surface.create(id, request).await {
            Ok(created) => {
                info!(id = %created, title = %request.title, "notification shown");
                SubmitOutcome::Delivered(created)
            }
            Err(error) => {
                warn!(id, error = %error, "notification could not be shown");
                SubmitOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::recording::RecordingSurface;
    use crate::store::memory::MemoryStore;
    use crate::store::read_value;

    fn ayah() -> Ayah {
        Ayah {
            text: "إِنَّ مَعَ ٱلْعُسْرِ يُسْرًا".to_string(),
            translation: "Indeed, with hardship [will be] ease.".to_string(),
            surah_name: "سُورَةُ الشَّرْحِ".to_string(),
            surah_name_en: "Ash-Sharh".to_string(),
            surah_number: 94,
            ayah_number: 6,
        }
    }

    fn composer(surface: Arc<RecordingSurface>) -> (Arc<MemoryStore>, NotificationComposer) {
        let store = Arc::new(MemoryStore::new());
        let history = HistoryStore::new(store.clone());
        (
            store.clone(),
            NotificationComposer::new(store, history, surface, None),
        )
    }

    #[test]
    fn prayer_body_ends_with_its_dua_when_enabled() {
        let with_dua = render(
            NotificationKind::Prayer,
            &Primary::Prayer("Fajr".to_string()),
            ComposeOptions { show_dua: true },
        )
        .expect("render");
        let without_dua = render(
            NotificationKind::Prayer,
            &Primary::Prayer("Fajr".to_string()),
            ComposeOptions { show_dua: false },
        )
        .expect("render");

        assert_eq!(with_dua.title, "Time for Fajr");
        assert!(with_dua.body.ends_with(&format!("\n\nDua: {}", PRAYER_DUAS[0].1)));
        assert_eq!(
            without_dua.body,
            "It's time for Fajr prayer. May Allah accept your prayers."
        );
    }

    #[test]
    fn unknown_prayer_gets_no_dua() {
        let rendered = render(
            NotificationKind::Prayer,
            &Primary::Prayer("Sunrise".to_string()),
            ComposeOptions { show_dua: true },
        )
        .expect("render");

        assert!(!rendered.body.contains("Dua:"));
    }

    #[test]
    fn devotional_sections_skip_missing_parts() {
        let entry = Devotional {
            arabic: "سُبْحَانَ اللَّهِ وَبِحَمْدِهِ".to_string(),
            translation: String::new(),
            notes: Some("Read 100 times".to_string()),
            benefits: None,
            title: None,
        };

        assert_eq!(
            devotional_message(&entry),
            "سُبْحَانَ اللَّهِ وَبِحَمْدِهِ\n\nNotes: Read 100 times"
        );

        let rendered = render(
            NotificationKind::Dua,
            &Primary::Devotional(entry),
            ComposeOptions { show_dua: true },
        )
        .expect("render");
        assert_eq!(rendered.title, "Daily Dua Reminder");
    }

    #[test]
    fn entry_title_becomes_the_notification_title() {
        let entry = Devotional {
            arabic: "أَصْبَحْنَا وَأَصْبَحَ الْمُلْكُ لِلَّهِ".to_string(),
            title: Some("Morning Remembrance".to_string()),
            ..Devotional::default()
        };

        for kind in [NotificationKind::Dhikr, NotificationKind::Dua] {
            let rendered = render(
                kind,
                &Primary::Devotional(entry.clone()),
                ComposeOptions { show_dua: true },
            )
            .expect("render");
            assert_eq!(rendered.title, "Morning Remembrance");
        }

        let untitled = render(
            NotificationKind::Dhikr,
            &Primary::Devotional(Devotional {
                title: None,
                ..entry
            }),
            ComposeOptions { show_dua: true },
        )
        .expect("render");
        assert_eq!(untitled.title, "Islamic Reminder");
    }

    #[tokio::test]
    async fn composed_dhikr_is_shown_under_its_entry_title() {
        let surface = Arc::new(RecordingSurface::default());
        let (_store, composer) = composer(surface.clone());
        let entry = Devotional {
            arabic: "سُبْحَانَ اللَّهِ".to_string(),
            title: Some("Evening Remembrance".to_string()),
            ..Devotional::default()
        };

        composer
            .compose(
                NotificationKind::Dhikr,
                Primary::Devotional(entry),
                ComposeOptions { show_dua: true },
            )
            .await
            .expect("compose");

        assert_eq!(surface.shown()[0].1.title, "Evening Remembrance");
    }

    #[test]
    fn empty_devotional_and_mismatched_kind_are_rejected() {
        assert!(render(
            NotificationKind::Dhikr,
            &Primary::Devotional(Devotional::default()),
            ComposeOptions { show_dua: true },
        )
        .is_err());
        assert!(render(
            NotificationKind::Prayer,
            &Primary::Ayah(ayah()),
            ComposeOptions { show_dua: true },
        )
        .is_err());
    }

    #[tokio::test]
    async fn ayah_is_shown_recorded_and_kept_as_last_ayah() {
        let surface = Arc::new(RecordingSurface::default());
        let (store, composer) = composer(surface.clone());

        let record = composer
            .compose(
                NotificationKind::Ayah,
                Primary::Ayah(ayah()),
                ComposeOptions { show_dua: true },
            )
            .await
            .expect("compose");

        assert!(record.id.starts_with("ayah-"));
        let shown = surface.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, record.id);
        assert_eq!(shown[0].1.buttons, vec![VIEW_DETAILS.to_string()]);
        assert_eq!(shown[0].1.context.as_deref(), Some("Surah Ash-Sharh (94:6)"));
        assert_eq!(shown[0].1.priority, HIGH_PRIORITY);
        assert!(shown[0].1.require_interaction && shown[0].1.silent);

        let last: Option<Ayah> = read_value(store.as_ref(), keys::LAST_AYAH).await.expect("read");
        assert_eq!(last, Some(ayah()));

        let history = HistoryStore::new(store);
        assert_eq!(history.history().await.expect("history"), vec![record]);
    }

    #[tokio::test]
    async fn rejected_submission_still_records_history() {
        let surface = Arc::new(RecordingSurface::rejecting());
        let (store, composer) = composer(surface);

        let outcome = composer
            .submit(
                "prayer-1",
                &NotificationRequest {
                    icon: None,
                    title: "t".to_string(),
                    body: "b".to_string(),
                    context: None,
                    priority: HIGH_PRIORITY,
                    require_interaction: true,
                    silent: true,
                    buttons: Vec::new(),
                    action_url: None,
                },
            )
            .await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Failed(ReminderError::Surface(_))
        ));

        let record = composer
            .compose(
                NotificationKind::Prayer,
                Primary::Prayer("Asr".to_string()),
                ComposeOptions { show_dua: false },
            )
            .await
            .expect("compose despite rejection");

        let history = HistoryStore::new(store);
        assert_eq!(history.history().await.expect("history")[0].id, record.id);
    }
}
