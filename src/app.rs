use crate::config::Config;
use crate::history::HistoryStore;
use crate::location::LocationService;
use crate::notify::composer::NotificationComposer;
use crate::notify::{NotificationSurface, surface_from_config};
use crate::providers::http::HttpProvider;
use crate::providers::{ContentProvider, LocationProvider};
use crate::random::{Randomness, ThreadRandom};
use crate::scheduler::{Categories, ReminderScheduler};
use crate::store::{KeyValueStore, SqliteStore};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Every service of one running instance, built from a single `Config`.
#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub store: Arc<dyn KeyValueStore>,
    pub history: HistoryStore,
    pub scheduler: Arc<ReminderScheduler>,
    pub location: LocationService,
}

impl App {
    pub fn open(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.db_path)?);
        let random: Arc<dyn Randomness> = Arc::new(ThreadRandom);
        let provider = Arc::new(
            HttpProvider::new(&config, Arc::clone(&random))
                .context("Failed to build HTTP client for content providers")?,
        );
        let surface = surface_from_config(&config);

        Ok(Self::assemble(
            config,
            store,
            provider.clone(),
            provider,
            surface,
            random,
        ))
    }

    pub fn assemble(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        content: Arc<dyn ContentProvider>,
        places: Arc<dyn LocationProvider>,
        surface: Arc<dyn NotificationSurface>,
        random: Arc<dyn Randomness>,
    ) -> Self {
        let history = HistoryStore::new(Arc::clone(&store));
        let composer = NotificationComposer::new(
            Arc::clone(&store),
            history.clone(),
            surface,
            config.icon_path.clone(),
        );
        let scheduler = ReminderScheduler::new(
            Arc::clone(&store),
            Arc::clone(&content),
            composer,
            history.clone(),
            random,
            Categories {
                dhikr: config.dhikr_category.clone(),
                dua: config.dua_category.clone(),
            },
        );
        let location = LocationService::new(Arc::clone(&store), content, places);

        Self {
            config: Arc::new(config),
            store,
            history,
            scheduler: Arc::new(scheduler),
            location,
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::App;
    use crate::config::Config;
    use crate::notify::recording::RecordingSurface;
    use crate::providers::fake::{FakeContent, FakePlaces};
    use crate::random::fixed::Fixed;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    /// An app on in-memory storage with canned providers; the coin always lands heads.
    pub fn app() -> (App, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::default());
        let app = App::assemble(
            Config::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(FakeContent::with_sample_content()),
            Arc::new(FakePlaces::mecca()),
            surface.clone(),
            Arc::new(Fixed {
                heads: true,
                index: 0,
            }),
        );
        (app, surface)
    }
}
