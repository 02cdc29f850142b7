use super::{ContentProvider, LocationProvider, Mosque, Place};
use crate::error::{ReminderError, ReminderResult};
use crate::models::{Ayah, Coordinates, Devotional, PrayerTimes};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Canned content. A failing provider answers every call with a provider error.
#[derive(Default)]
pub struct FakeContent {
    pub failing: bool,
    pub times: Option<PrayerTimes>,
    pub ayah: Option<Ayah>,
    pub devotionals: Vec<Devotional>,
    ayah_calls: AtomicUsize,
}

impl FakeContent {
    pub fn with_sample_content() -> Self {
        Self {
            times: Some(PrayerTimes::from([
                ("Fajr", "04:41"),
                ("Sunrise", "06:02"),
                ("Dhuhr", "11:52"),
                ("Asr", "15:10"),
                ("Maghrib", "17:40"),
                ("Isha", "18:52"),
            ])),
            ayah: Some(sample_ayah()),
            devotionals: vec![Devotional {
                arabic: "سُبْحَانَ اللَّهِ وَبِحَمْدِهِ".to_string(),
                translation: "Glory be to Allah and praise Him.".to_string(),
                notes: None,
                benefits: Some("Sins are forgiven".to_string()),
                title: None,
            }],
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn ayah_calls(&self) -> usize {
        self.ayah_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> ReminderResult<()> {
        if self.failing {
            return Err(ReminderError::Provider("network unreachable".to_string()));
        }
        Ok(())
    }
}

pub fn sample_ayah() -> Ayah {
    Ayah {
        text: "إِنَّ مَعَ ٱلْعُسْرِ يُسْرًا".to_string(),
        translation: "Indeed, with hardship [will be] ease.".to_string(),
        surah_name: "سُورَةُ الشَّرْحِ".to_string(),
        surah_name_en: "Ash-Sharh".to_string(),
        surah_number: 94,
        ayah_number: 6,
    }
}

#[async_trait]
impl ContentProvider for FakeContent {
    async fn prayer_times(
        &self,
        _coordinates: Coordinates,
        _date: NaiveDate,
    ) -> ReminderResult<PrayerTimes> {
        self.check()?;
        self.times.clone().ok_or(ReminderError::MissingData("timings"))
    }

    async fn random_ayah(&self) -> ReminderResult<Ayah> {
        self.ayah_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.ayah.clone().ok_or(ReminderError::MissingData("ayah"))
    }

    async fn devotionals(&self, _category: &str) -> ReminderResult<Vec<Devotional>> {
        self.check()?;
        Ok(self.devotionals.clone())
    }
}

#[derive(Default)]
pub struct FakePlaces {
    pub failing: bool,
    pub place: Option<Place>,
    pub city: Option<String>,
    pub mosques: Vec<Mosque>,
}

impl FakePlaces {
    pub fn mecca() -> Self {
        Self {
            failing: false,
            place: Some(Place {
                coordinates: Coordinates {
                    latitude: 21.4225,
                    longitude: 39.8262,
                },
                display_name: "Mecca, Makkah Region, Saudi Arabia".to_string(),
            }),
            city: Some("Mecca".to_string()),
            mosques: vec![Mosque::new(
                "Masjid al-Haram".to_string(),
                "Ajyad, Mecca".to_string(),
                Coordinates {
                    latitude: 21.4226,
                    longitude: 39.8263,
                },
                Coordinates {
                    latitude: 21.4225,
                    longitude: 39.8262,
                },
            )],
        }
    }

    fn check(&self) -> ReminderResult<()> {
        if self.failing {
            return Err(ReminderError::Provider("network unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LocationProvider for FakePlaces {
    async fn geocode(&self, _city: &str) -> ReminderResult<Option<Place>> {
        self.check()?;
        Ok(self.place.clone())
    }

    async fn reverse_geocode(&self, _coordinates: Coordinates) -> ReminderResult<Option<String>> {
        self.check()?;
        Ok(self.city.clone())
    }

    async fn nearby_mosques(&self, _coordinates: Coordinates) -> ReminderResult<Vec<Mosque>> {
        self.check()?;
        Ok(self.mosques.clone())
    }
}
