#[cfg(test)]
pub mod fake;
pub mod http;

use crate::error::ReminderResult;
use crate::models::{Ayah, Coordinates, Devotional, PrayerTimes};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

/// Read-only content sources the reminders draw from.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn prayer_times(&self, coordinates: Coordinates, date: NaiveDate)
    -> ReminderResult<PrayerTimes>;

    /// A random verse from a random surah.
    async fn random_ayah(&self) -> ReminderResult<Ayah>;

    /// Every Dhikr or Dua entry of `category`.
    async fn devotionals(&self, category: &str) -> ReminderResult<Vec<Devotional>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub coordinates: Coordinates,
    pub display_name: String,
}

/// A named mosque near the user, as listed by the mosque finder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mosque {
    pub name: String,
    pub address: String,
    pub coordinates: Coordinates,
    pub distance_km: f64,
    pub directions_url: String,
}

impl Mosque {
    pub fn new(name: String, address: String, coordinates: Coordinates, origin: Coordinates) -> Self {
        Self {
            distance_km: origin.distance_km(coordinates),
            directions_url: format!(
                "https://www.openstreetmap.org/directions?from={},{}&to={},{}",
                origin.latitude, origin.longitude, coordinates.latitude, coordinates.longitude
            ),
            name,
            address,
            coordinates,
        }
    }
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn geocode(&self, city: &str) -> ReminderResult<Option<Place>>;

    async fn reverse_geocode(&self, coordinates: Coordinates) -> ReminderResult<Option<String>>;

    /// Named mosques within the search radius of `coordinates`, nearest first.
    async fn nearby_mosques(&self, coordinates: Coordinates) -> ReminderResult<Vec<Mosque>>;
}
