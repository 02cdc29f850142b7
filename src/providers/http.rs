use super::{ContentProvider, LocationProvider, Mosque, Place};
use crate::config::Config;
use crate::error::{ReminderError, ReminderResult};
use crate::models::{Ayah, Coordinates, Devotional, PrayerTimes};
use crate::random::Randomness;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const SURAH_COUNT: usize = 114;
const MOSQUE_RADIUS_METERS: u32 = 5000;
const USER_AGENT: &str = concat!("SalatReminder/", env!("CARGO_PKG_VERSION"));

/// Talks to the public prayer time, Quran, Dhikr, geocoding and Overpass APIs.
pub struct HttpProvider {
    client: Client,
    random: Arc<dyn Randomness>,
    prayer_base: String,
    quran_base: String,
    dhikr_base: String,
    geocoding_base: String,
    overpass_url: String,
    calculation_method: u8,
    translation_edition: String,
}

impl HttpProvider {
    pub fn new(config: &Config, random: Arc<dyn Randomness>) -> ReminderResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds.max(3)))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            random,
            prayer_base: trim_base(&config.prayer_api_base_url),
            quran_base: trim_base(&config.quran_api_base_url),
            dhikr_base: trim_base(&config.dhikr_api_base_url),
            geocoding_base: trim_base(&config.geocoding_api_base_url),
            overpass_url: config.overpass_api_url.clone(),
            calculation_method: config.calculation_method,
            translation_edition: config.translation_edition.clone(),
        })
    }

    async fn fetch(&self, request: RequestBuilder, what: &str) -> ReminderResult<String> {
        let response = request
            .send()
            .await
            .map_err(|error| ReminderError::Provider(format!("{what} request failed: {error}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            ReminderError::Provider(format!("failed to read {what} response: {error}"))
        })?;

        if !status.is_success() {
            return Err(ReminderError::Provider(format!("{what} returned {status}")));
        }

        debug!(what, bytes = body.len(), "provider response received");
        Ok(body)
    }

    fn endpoint(&self, base: &str, path: &str, params: &[(&str, String)]) -> ReminderResult<Url> {
        let raw = format!("{base}/{}", path.trim_start_matches('/'));
        Url::parse_with_params(&raw, params)
            .map_err(|error| ReminderError::Provider(format!("invalid endpoint {raw}: {error}")))
    }
}

#[async_trait]
impl ContentProvider for HttpProvider {
    async fn prayer_times(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
    ) -> ReminderResult<PrayerTimes> {
        let url = self.endpoint(
            &self.prayer_base,
            &format!("timings/{}", date.format("%d-%m-%Y")),
            &[
                ("latitude", coordinates.latitude.to_string()),
                ("longitude", coordinates.longitude.to_string()),
                ("method", self.calculation_method.to_string()),
            ],
        )?;

        let body = self.fetch(self.client.get(url), "prayer times").await?;
        parse_timings(&body)
    }

    async fn random_ayah(&self) -> ReminderResult<Ayah> {
        let surah_number = self.random.below(SURAH_COUNT) + 1;
        let surah_url = self.endpoint(&self.quran_base, &format!("surah/{surah_number}"), &[])?;
        let surah = parse_surah(&self.fetch(self.client.get(surah_url), "surah info").await?)?;

        let ayah_number = self.random.below(surah.number_of_ayahs as usize) + 1;
        let ayah_url = self.endpoint(
            &self.quran_base,
            &format!(
                "ayah/{surah_number}:{ayah_number}/editions/quran-uthmani,{}",
                self.translation_edition
            ),
            &[],
        )?;
        let (text, translation) =
            parse_ayah_editions(&self.fetch(self.client.get(ayah_url), "ayah").await?)?;

        Ok(Ayah {
            text,
            translation,
            surah_name: surah.name,
            surah_name_en: surah.english_name,
            surah_number: surah_number as u32,
            ayah_number: ayah_number as u32,
        })
    }

    async fn devotionals(&self, category: &str) -> ReminderResult<Vec<Devotional>> {
        let url = self.endpoint(&self.dhikr_base, &format!("categories/{category}"), &[])?;
        let body = self.fetch(self.client.get(url), "dhikr category").await?;
        parse_devotionals(&body)
    }
}

#[async_trait]
impl LocationProvider for HttpProvider {
    async fn geocode(&self, city: &str) -> ReminderResult<Option<Place>> {
        let url = self.endpoint(
            &self.geocoding_base,
            "search",
            &[("format", "json".to_string()), ("q", city.to_string())],
        )?;

        let body = self.fetch(self.client.get(url), "geocoding").await?;
        parse_places(&body)
    }

    async fn reverse_geocode(&self, coordinates: Coordinates) -> ReminderResult<Option<String>> {
        let url = self.endpoint(
            &self.geocoding_base,
            "reverse",
            &[
                ("format", "json".to_string()),
                ("lat", coordinates.latitude.to_string()),
                ("lon", coordinates.longitude.to_string()),
            ],
        )?;

        let body = self.fetch(self.client.get(url), "reverse geocoding").await?;
        parse_reverse(&body)
    }

    async fn nearby_mosques(&self, coordinates: Coordinates) -> ReminderResult<Vec<Mosque>> {
        let url = Url::parse_with_params(
            &self.overpass_url,
            &[("data", overpass_query(coordinates))],
        )
        .map_err(|error| ReminderError::Provider(format!("invalid Overpass URL: {error}")))?;

        let body = self.fetch(self.client.get(url), "mosque search").await?;
        let mosques = parse_mosques(&body, coordinates)?;
        debug!(found = mosques.len(), "mosque search finished");

        Ok(mosques)
    }
}

fn trim_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn decode<T: DeserializeOwned>(body: &str, what: &str) -> ReminderResult<T> {
    serde_json::from_str(body)
        .map_err(|error| ReminderError::Provider(format!("malformed {what} response: {error}")))
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TimingsData {
    timings: BTreeMap<String, String>,
}

fn parse_timings(body: &str) -> ReminderResult<PrayerTimes> {
    let envelope: Envelope<TimingsData> = decode(body, "prayer times")?;
    let times = PrayerTimes(envelope.data.timings);

    if times.is_empty() {
        return Err(ReminderError::Provider(
            "prayer times response has no timings".to_string(),
        ));
    }

    Ok(times)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SurahInfo {
    name: String,
    english_name: String,
    number_of_ayahs: u32,
}

fn parse_surah(body: &str) -> ReminderResult<SurahInfo> {
    let envelope: Envelope<SurahInfo> = decode(body, "surah info")?;

    if envelope.data.number_of_ayahs == 0 {
        return Err(ReminderError::Provider("surah has no ayahs".to_string()));
    }

    Ok(envelope.data)
}

#[derive(Debug, Deserialize)]
struct EditionText {
    text: String,
}

/// Arabic text and translation from a two-edition ayah response.
fn parse_ayah_editions(body: &str) -> ReminderResult<(String, String)> {
    let envelope: Envelope<Vec<EditionText>> = decode(body, "ayah")?;
    let mut editions = envelope.data.into_iter().map(|edition| edition.text);

    let text = editions
        .next()
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ReminderError::Provider("ayah response has no text".to_string()))?;
    let translation = editions.next().unwrap_or_default();

    Ok((text, translation))
}

#[derive(Debug, Deserialize)]
struct RawDevotional {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    arabic: Option<String>,
    #[serde(default)]
    translation: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    fawaid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DevotionalListing {
    Bare(Vec<RawDevotional>),
    Wrapped { data: Vec<RawDevotional> },
}

fn parse_devotionals(body: &str) -> ReminderResult<Vec<Devotional>> {
    let listing: DevotionalListing = decode(body, "dhikr category")?;
    let raw = match listing {
        DevotionalListing::Bare(items) | DevotionalListing::Wrapped { data: items } => items,
    };

    Ok(raw
        .into_iter()
        .map(|item| Devotional {
            arabic: item.arabic.unwrap_or_default(),
            translation: item.translation.unwrap_or_default(),
            notes: non_blank(item.notes),
            benefits: non_blank(item.fawaid),
            title: non_blank(item.title),
        })
        .collect())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

fn parse_places(body: &str) -> ReminderResult<Option<Place>> {
    let places: Vec<NominatimPlace> = decode(body, "geocoding")?;

    places
        .into_iter()
        .next()
        .map(|place| {
            let latitude = place.lat.parse::<f64>();
            let longitude = place.lon.parse::<f64>();

            match (latitude, longitude) {
                (Ok(latitude), Ok(longitude)) => Ok(Place {
                    coordinates: Coordinates {
                        latitude,
                        longitude,
                    },
                    display_name: place.display_name,
                }),
                _ => Err(ReminderError::Provider(format!(
                    "geocoding returned invalid coordinates: {}, {}",
                    place.lat, place.lon
                ))),
            }
        })
        .transpose()
}

#[derive(Debug, Default, Deserialize)]
struct ReverseAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReversePlace {
    #[serde(default)]
    address: ReverseAddress,
}

fn parse_reverse(body: &str) -> ReminderResult<Option<String>> {
    let place: ReversePlace = decode(body, "reverse geocoding")?;
    let address = place.address;

    Ok(non_blank(address.city.or(address.town).or(address.village)))
}

fn overpass_query(coordinates: Coordinates) -> String {
    let around = format!(
        "(around:{MOSQUE_RADIUS_METERS},{},{})",
        coordinates.latitude, coordinates.longitude
    );
    let filter = r#"["amenity"="place_of_worship"]["religion"="muslim"]"#;

    format!(
        "[out:json][timeout:25];(node{filter}{around};way{filter}{around};relation{filter}{around};);out center;"
    )
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

/// Named elements only, sorted by distance from `origin`.
fn parse_mosques(body: &str, origin: Coordinates) -> ReminderResult<Vec<Mosque>> {
    let response: OverpassResponse = decode(body, "mosque search")?;

    let mut mosques = response
        .elements
        .into_iter()
        .filter_map(|element| {
            let name = ["name", "name:en"]
                .iter()
                .filter_map(|key| element.tags.get(*key))
                .map(|name| name.trim())
                .find(|name| !name.is_empty())?
                .to_string();

            let (latitude, longitude) = element
                .lat
                .zip(element.lon)
                .or_else(|| element.center.as_ref().map(|center| (center.lat, center.lon)))?;

            let street_address = ["addr:street", "addr:housenumber", "addr:city"]
                .iter()
                .filter_map(|key| element.tags.get(*key))
                .filter(|part| !part.trim().is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            let address = if street_address.is_empty() {
                format!("Location: {latitude:.4}, {longitude:.4}")
            } else {
                street_address
            };

            Some(Mosque::new(
                name,
                address,
                Coordinates {
                    latitude,
                    longitude,
                },
                origin,
            ))
        })
        .collect::<Vec<_>>();

    mosques.sort_by(|left, right| left.distance_km.total_cmp(&right.distance_km));
    Ok(mosques)
}
