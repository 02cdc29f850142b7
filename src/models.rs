use crate::config::parse_hhmm;
use anyhow::{Result, anyhow, bail};
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The five daily prayers the scheduler notifies, in order.
pub const CANONICAL_PRAYERS: [&str; 5] = ["Fajr", "Dhuhr", "Asr", "Maghrib", "Isha"];

/// Prayers shown to the user. Sunrise is display-only.
pub const DISPLAY_PRAYERS: [&str; 6] = ["Fajr", "Sunrise", "Dhuhr", "Asr", "Maghrib", "Isha"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Ayah,
    Dhikr,
    Dua,
    Prayer,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ayah => "ayah",
            Self::Dhikr => "dhikr",
            Self::Dua => "dua",
            Self::Prayer => "prayer",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ayah {
    pub text: String,
    pub translation: String,
    pub surah_name: String,
    pub surah_name_en: String,
    pub surah_number: u32,
    pub ayah_number: u32,
}

/// A Dhikr or Dua entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Devotional {
    pub arabic: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerContent {
    pub prayer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotificationContent {
    Ayah(Ayah),
    Devotional(Devotional),
    Prayer(PrayerContent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub content: NotificationContent,
}

impl NotificationRecord {
    /// Ids are `<kind>-<millis>`. Prayer ids also carry the prayer name, since
    /// two prayers can come due in the same millisecond.
    pub fn new(kind: NotificationKind, content: NotificationContent, timestamp: i64) -> Self {
        let id = match &content {
            NotificationContent::Prayer(content) => {
                format!("{kind}-{}-{timestamp}", content.prayer.to_lowercase())
            }
            _ => format!("{kind}-{timestamp}"),
        };

        Self {
            id,
            timestamp,
            kind,
            content,
        }
    }

    /// Main line shown in history views.
    pub fn headline(&self) -> String {
        match &self.content {
            NotificationContent::Ayah(ayah) => ayah.text.clone(),
            NotificationContent::Devotional(entry) => entry.arabic.clone(),
            NotificationContent::Prayer(content) => format!("Time for {}", content.prayer),
        }
    }

    pub fn translation(&self) -> Option<&str> {
        match &self.content {
            NotificationContent::Ayah(ayah) => Some(ayah.translation.as_str()),
            NotificationContent::Devotional(entry) => Some(entry.translation.as_str()),
            NotificationContent::Prayer(_) => None,
        }
        .filter(|value| !value.trim().is_empty())
    }
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "enabled")]
    pub show_ayah: bool,
    #[serde(default = "enabled")]
    pub show_dua: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_ayah: true,
            show_dua: true,
        }
    }
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(show_ayah) = patch.show_ayah {
            self.show_ayah = show_ayah;
        }
        if let Some(show_dua) = patch.show_dua {
            self.show_dua = show_dua;
        }
    }
}

/// A partial settings update. Absent fields leave the stored value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsPatch {
    #[serde(default)]
    pub show_ayah: Option<bool>,
    #[serde(default)]
    pub show_dua: Option<bool>,
}

impl SettingsPatch {
    /// Parses one `key value` pair as typed on the command line.
    pub fn from_key_value(key: &str, value: &str) -> Result<Self> {
        let parsed = value
            .parse::<bool>()
            .map_err(|_| anyhow!("{key} must be true/false"))?;

        match key {
            "showAyah" | "show_ayah" | "show-ayah" | "ayah" => Ok(Self {
                show_ayah: Some(parsed),
                ..Self::default()
            }),
            "showDua" | "show_dua" | "show-dua" | "dua" => Ok(Self {
                show_dua: Some(parsed),
                ..Self::default()
            }),
            _ => bail!("Unsupported setting: {key}. Supported settings: showAyah, showDua"),
        }
    }
}

/// Prayer name to `HH:MM` local time, as returned by the prayer times provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrayerTimes(pub BTreeMap<String, String>);

impl PrayerTimes {
    pub fn get(&self, prayer: &str) -> Option<&str> {
        self.0.get(prayer).map(String::as_str)
    }

    /// Minutes since local midnight for `prayer`.
    ///
    /// Some providers append a timezone label (`05:12 (EET)`), only the leading
    /// `HH:MM` token is read.
    pub fn minute_of_day(&self, prayer: &str) -> Option<u32> {
        let raw = self.get(prayer)?.split_whitespace().next()?;
        parse_hhmm(raw)
            .ok()
            .map(|time| time.hour() * 60 + time.minute())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for PrayerTimes {
    fn from(entries: [(&str, &str); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(name, time)| (name.to_string(), time.to_string()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

const EARTH_RADIUS_KM: f64 = 6371.0;

impl Coordinates {
    /// Great-circle (haversine) distance in kilometres.
    pub fn distance_km(self, other: Coordinates) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (d_lon / 2.0).sin().powi(2);

        EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }
}
