use crate::app::App;
use crate::error::ReminderError;
use crate::location::{NextPrayer, next_prayer};
use crate::models::{Ayah, NotificationRecord, PrayerTimes, Settings, SettingsPatch};
use crate::scheduler::MessageRequest;
use crate::store::{keys, load_settings, read_value, update_settings};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone)]
pub struct ApiState {
    pub app: App,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/history", get(history_list))
        .route("/api/v1/favorites", get(favorites_list))
        .route(
            "/api/v1/history/:id",
            get(history_get).delete(history_delete),
        )
        .route("/api/v1/history/:id/favorite", post(history_favorite))
        .route(
            "/api/v1/history/:id/buttons/:index",
            post(history_button_clicked),
        )
        .route("/api/v1/settings", get(settings_get).put(settings_put))
        .route("/api/v1/prayer-times", get(prayer_times))
        .route("/api/v1/ayah/last", get(last_ayah))
        .route("/api/v1/message", post(message))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    from_favorites: bool,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    location: Option<String>,
    next_prayer: Option<NextPrayerView>,
    history_count: usize,
    favorites_count: usize,
    api_port: u16,
}

#[derive(Debug, Serialize)]
struct NextPrayerView {
    name: String,
    time: String,
    minutes_until: u32,
}

impl From<NextPrayer> for NextPrayerView {
    fn from(value: NextPrayer) -> Self {
        Self {
            name: value.name.to_string(),
            time: value.time,
            minutes_until: value.minutes_until,
        }
    }
}

#[derive(Debug, Serialize)]
struct RecordsPayload {
    count: usize,
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Serialize)]
struct PrayerTimesPayload {
    location: Option<String>,
    times: PrayerTimes,
    next_prayer: Option<NextPrayerView>,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let app = &state.app;
    let times = app.location.prayer_times().await?;

    let payload = StatusPayload {
        location: app.location.city().await?,
        next_prayer: times
            .as_ref()
            .and_then(|times| next_prayer(times, Local::now().time()))
            .map(NextPrayerView::from),
        history_count: app.history.history().await?.len(),
        favorites_count: app.history.favorites().await?.len(),
        api_port: app.config.api_port,
    };

    Ok(Json(payload))
}

async fn history_list(State(state): State<ApiState>) -> ApiResult<Json<RecordsPayload>> {
    let records = state.app.history.history().await?;

    Ok(Json(RecordsPayload {
        count: records.len(),
        records,
    }))
}

async fn favorites_list(State(state): State<ApiState>) -> ApiResult<Json<RecordsPayload>> {
    let records = state.app.history.favorites().await?;

    Ok(Json(RecordsPayload {
        count: records.len(),
        records,
    }))
}

async fn history_get(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<NotificationRecord>> {
    state
        .app
        .history
        .find(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No notification with id: {id}")))
}

async fn history_favorite(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let favorite = state
        .app
        .history
        .toggle_favorite(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No notification with id: {id}")))?;

    Ok(Json(json!({ "id": id, "favorite": favorite })))
}

async fn history_delete(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<Value>> {
    let deleted = state.app.history.delete(&id, query.from_favorites).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("No notification with id: {id}")));
    }

    Ok(Json(json!({ "id": id, "deleted": true })))
}

async fn history_button_clicked(
    State(state): State<ApiState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Json<Value>> {
    let url = state.app.scheduler.on_button_clicked(&id, index).await?;

    Ok(Json(json!({ "id": id, "open": url })))
}

async fn settings_get(State(state): State<ApiState>) -> ApiResult<Json<Settings>> {
    Ok(Json(load_settings(state.app.store.as_ref()).await?))
}

async fn settings_put(
    State(state): State<ApiState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<Settings>> {
    let patch: SettingsPatch = serde_json::from_value(payload)
        .map_err(|error| ApiError::BadRequest(format!("Invalid settings payload: {error}")))?;

    let settings = update_settings(state.app.store.as_ref(), patch).await?;
    Ok(Json(settings))
}

async fn prayer_times(State(state): State<ApiState>) -> ApiResult<Json<PrayerTimesPayload>> {
    let times = state
        .app
        .location
        .prayer_times()
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("No prayer times stored yet. Set a location first.".to_string())
        })?;

    Ok(Json(PrayerTimesPayload {
        location: state.app.location.city().await?,
        next_prayer: next_prayer(&times, Local::now().time()).map(NextPrayerView::from),
        times,
    }))
}

async fn last_ayah(State(state): State<ApiState>) -> ApiResult<Json<Ayah>> {
    read_value::<Ayah>(state.app.store.as_ref(), keys::LAST_AYAH)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No Ayah has been shown yet".to_string()))
}

async fn message(
    State(state): State<ApiState>,
    Json(payload): Json<Value>,
) -> ApiResult<Json<Value>> {
    let request: MessageRequest = serde_json::from_value(payload)
        .map_err(|error| ApiError::BadRequest(format!("Unsupported message: {error}")))?;

    Ok(Json(state.app.scheduler.handle_message(request).await))
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<ReminderError> for ApiError {
    fn from(value: ReminderError) -> Self {
        match value {
            ReminderError::MissingData(what) => Self::NotFound(format!("No {what} stored yet")),
            other => Self::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing;
    use crate::models::NotificationKind;

    fn state() -> ApiState {
        ApiState {
            app: testing::app().0,
        }
    }

    async fn seed_record(state: &ApiState) -> NotificationRecord {
        state
            .app
            .scheduler
            .show_islamic_quote()
            .await
            .expect("quote")
            .expect("composed")
    }

    #[tokio::test]
    async fn favorite_toggle_and_delete_round_trip() {
        let state = state();
        let record = seed_record(&state).await;

        let Json(toggled) = history_favorite(State(state.clone()), Path(record.id.clone()))
            .await
            .expect("toggle");
        assert_eq!(toggled["favorite"], true);

        let Json(favorites) = favorites_list(State(state.clone())).await.expect("favorites");
        assert_eq!(favorites.count, 1);
        assert_eq!(favorites.records[0].kind, NotificationKind::Dhikr);

        history_delete(
            State(state.clone()),
            Path(record.id.clone()),
            Query(DeleteQuery {
                from_favorites: true,
            }),
        )
        .await
        .expect("delete");

        let Json(history) = history_list(State(state.clone())).await.expect("history");
        assert_eq!(history.count, 0);
        assert!(matches!(
            history_favorite(State(state), Path(record.id)).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn settings_put_changes_only_the_keys_it_names() {
        let state = state();
        crate::store::write_value(
            state.app.store.as_ref(),
            keys::SETTINGS,
            &Settings {
                show_ayah: true,
                show_dua: false,
            },
        )
        .await
        .expect("seed");

        let Json(saved) = settings_put(State(state.clone()), Json(json!({ "showAyah": false })))
            .await
            .expect("saved");
        assert!(!saved.show_ayah);
        assert!(!saved.show_dua);

        let Json(loaded) = settings_get(State(state.clone())).await.expect("loaded");
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn settings_put_rejects_bad_payloads_without_writing() {
        let state = state();

        for payload in [
            json!({ "showAyah": "no" }),
            json!({ "showDua": null, "showAyah": false, "extra": 1 }),
            json!(["showAyah"]),
        ] {
            assert!(matches!(
                settings_put(State(state.clone()), Json(payload)).await,
                Err(ApiError::BadRequest(_))
            ));
        }

        let Json(loaded) = settings_get(State(state)).await.expect("loaded");
        assert_eq!(loaded, Settings::default());
    }

    #[tokio::test]
    async fn missing_prayer_times_and_ayah_are_not_found() {
        let state = state();

        assert!(matches!(
            prayer_times(State(state.clone())).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            last_ayah(State(state)).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn message_endpoint_follows_action_contract() {
        let state = state();

        let Json(ayah) = message(State(state.clone()), Json(json!({ "action": "fetchRandomAyah" })))
            .await
            .expect("answered");
        assert_eq!(ayah["surahNameEn"], "Ash-Sharh");

        assert!(matches!(
            message(State(state), Json(json!({ "action": "launch" }))).await,
            Err(ApiError::BadRequest(_))
        ));
    }
}
