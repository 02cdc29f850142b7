use crate::error::{ReminderError, ReminderResult};
use crate::models::{CANONICAL_PRAYERS, Coordinates, PrayerTimes};
use crate::providers::{ContentProvider, LocationProvider, Mosque};
use crate::store::{KeyValueStore, StoreMap, keys, read_value, write_value};
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Where the user prays, and the prayer times that follow from it.
#[derive(Clone)]
pub struct LocationService {
    store: Arc<dyn KeyValueStore>,
    content: Arc<dyn ContentProvider>,
    places: Arc<dyn LocationProvider>,
}

/// The next canonical prayer and how far away it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPrayer {
    pub name: &'static str,
    pub time: String,
    pub minutes_until: u32,
}

impl LocationService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        content: Arc<dyn ContentProvider>,
        places: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            store,
            content,
            places,
        }
    }

    /// Resolves `city`, stores it with its coordinates, and fetches today's times.
    pub async fn set_city(&self, city: &str, today: NaiveDate) -> ReminderResult<PrayerTimes> {
        let city = city.trim();
        if city.is_empty() {
            return Err(ReminderError::MissingData("location"));
        }

        let place = self
            .places
            .geocode(city)
            .await?
            .ok_or_else(|| ReminderError::Provider(format!("no match for city `{city}`")))?;
        info!(city, resolved = %place.display_name, "location resolved");

        self.save_location(city, place.coordinates).await?;
        self.refresh_prayer_times(today).await
    }

    /// Stores raw coordinates, naming them after the nearest city when one is known.
    pub async fn set_coordinates(
        &self,
        coordinates: Coordinates,
        today: NaiveDate,
    ) -> ReminderResult<PrayerTimes> {
        let city = match self.places.reverse_geocode(coordinates).await {
            Ok(Some(city)) => city,
            Ok(None) => coordinate_label(coordinates),
            Err(error) => {
                warn!(error = %error, "reverse geocoding failed, keeping coordinates only");
                coordinate_label(coordinates)
            }
        };

        self.save_location(&city, coordinates).await?;
        self.refresh_prayer_times(today).await
    }

    pub async fn refresh_prayer_times(&self, date: NaiveDate) -> ReminderResult<PrayerTimes> {
        let coordinates = self
            .coordinates()
            .await?
            .ok_or(ReminderError::MissingData("location"))?;

        let times = self.content.prayer_times(coordinates, date).await?;
        write_value(self.store.as_ref(), keys::PRAYER_TIMES, &times).await?;
        info!(date = %date, entries = times.0.len(), "prayer times refreshed");

        Ok(times)
    }

    /// Named mosques around the saved location, nearest first.
    pub async fn nearby_mosques(&self) -> ReminderResult<Vec<Mosque>> {
        let coordinates = self
            .coordinates()
            .await?
            .ok_or(ReminderError::MissingData("location"))?;

        self.places.nearby_mosques(coordinates).await
    }

    pub async fn city(&self) -> ReminderResult<Option<String>> {
        read_value(self.store.as_ref(), keys::LOCATION).await
    }

    pub async fn coordinates(&self) -> ReminderResult<Option<Coordinates>> {
        read_value(self.store.as_ref(), keys::COORDINATES).await
    }

    pub async fn prayer_times(&self) -> ReminderResult<Option<PrayerTimes>> {
        read_value(self.store.as_ref(), keys::PRAYER_TIMES).await
    }

    async fn save_location(&self, city: &str, coordinates: Coordinates) -> ReminderResult<()> {
        let encoded = serde_json::to_value(coordinates)
            .map_err(|error| ReminderError::Store(error.to_string()))?;

        let mut entries = StoreMap::new();
        entries.insert(keys::LOCATION.to_string(), Value::String(city.to_string()));
        entries.insert(keys::COORDINATES.to_string(), encoded);
        self.store.set(entries).await
    }
}

/// First canonical prayer after `now`; past Isha it is tomorrow's Fajr.
pub fn next_prayer(times: &PrayerTimes, now: NaiveTime) -> Option<NextPrayer> {
    let current = now.hour() * 60 + now.minute();

    let upcoming = CANONICAL_PRAYERS
        .into_iter()
        .filter_map(|name| times.minute_of_day(name).map(|minute| (name, minute)))
        .find(|(_, minute)| *minute > current);

    let (name, minutes_until) = match upcoming {
        Some((name, minute)) => (name, minute - current),
        None => {
            let fajr = times.minute_of_day("Fajr")?;
            ("Fajr", MINUTES_PER_DAY - current + fajr)
        }
    };

    Some(NextPrayer {
        name,
        time: times.get(name).unwrap_or_default().to_string(),
        minutes_until,
    })
}

fn coordinate_label(coordinates: Coordinates) -> String {
    format!("{:.4}, {:.4}", coordinates.latitude, coordinates.longitude)
}
