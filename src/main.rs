mod api;
mod app;
mod cli;
mod config;
mod error;
mod history;
mod location;
mod models;
mod notify;
mod providers;
mod random;
mod scheduler;
mod store;

use crate::app::App;
use crate::cli::onboard::run_onboarding;
use crate::cli::{Cli, Commands, ConfigCommands, LocationCommands, SettingsCommands};
use crate::config::{Config, parse_hhmm};
use crate::location::next_prayer;
use crate::models::{
    Ayah, Coordinates, DISPLAY_PRAYERS, Devotional, NotificationRecord, SettingsPatch,
};
use crate::notify::composer::devotional_message;
use crate::scheduler::MessageRequest;
use crate::scheduler::timers::{TimerName, TokioTimers, initialize_timers};
use crate::store::{
    SqliteStore, ensure_defaults, keys, load_settings, read_value, update_settings, write_value,
};
use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => handle_onboard().await,
        Commands::Config { command } => handle_config_command(command),
        Commands::Location { command } => handle_location_command(command).await,
        Commands::Refresh => handle_refresh().await,
        Commands::Times => handle_times().await,
        Commands::Settings { command } => handle_settings_command(command).await,
        Commands::History { favorites } => handle_history(favorites).await,
        Commands::Favorite { id } => handle_favorite(&id).await,
        Commands::Delete { id, favorites } => handle_delete(&id, favorites).await,
        Commands::Sweep => handle_sweep().await,
        Commands::Fire { timer } => handle_fire(&timer).await,
        Commands::Ayah => handle_ayah().await,
        Commands::Dhikr => handle_dhikr().await,
        Commands::Mosque => handle_mosque().await,
        Commands::Status => handle_status().await,
        Commands::Doctor => handle_doctor().await,
        Commands::Service => {
            let config = load_config()?;
            run_service(config).await
        }
    }
}

async fn handle_onboard() -> Result<()> {
    let onboarding = run_onboarding()?;
    let app = App::open(onboarding.config)?;

    ensure_defaults(app.store.as_ref()).await?;
    write_value(app.store.as_ref(), keys::SETTINGS, &onboarding.settings).await?;

    if let Some(city) = onboarding.city {
        match app.location.set_city(&city, Local::now().date_naive()).await {
            Ok(times) => println!("  ✓ Prayer times loaded for {city} ({} entries)", times.0.len()),
            Err(error) => println!("  ! Could not load prayer times for {city}: {error}"),
        }
    }

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run SalatReminder service to start the reminders.");
    println!("  Run SalatReminder status to check current state.");
    println!("──────────────────────────────────────────");

    Ok(())
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

async fn handle_location_command(command: LocationCommands) -> Result<()> {
    let app = open_app()?;
    let today = Local::now().date_naive();

    match command {
        LocationCommands::Set { city } => {
            app.location
                .set_city(&city, today)
                .await
                .with_context(|| format!("Error finding location: {city}. Please try again."))?;
            println!("Location saved: {}", city.trim());
            print_times(&app).await
        }
        LocationCommands::Coordinates {
            latitude,
            longitude,
        } => {
            app.location
                .set_coordinates(
                    Coordinates {
                        latitude,
                        longitude,
                    },
                    today,
                )
                .await
                .context("Failed to fetch prayer times for coordinates")?;
            println!(
                "Location saved: {}",
                app.location.city().await?.unwrap_or_default()
            );
            print_times(&app).await
        }
        LocationCommands::Show => {
            let city = app.location.city().await?;
            let coordinates = app.location.coordinates().await?;

            println!("- city: {}", city.unwrap_or_else(|| "not_set".to_string()));
            match coordinates {
                Some(coordinates) => println!(
                    "- coordinates: {:.4}, {:.4}",
                    coordinates.latitude, coordinates.longitude
                ),
                None => println!("- coordinates: not_set"),
            }
            Ok(())
        }
    }
}

async fn handle_refresh() -> Result<()> {
    let app = open_app()?;
    app.location
        .refresh_prayer_times(Local::now().date_naive())
        .await
        .context("Prayer time refresh failed")?;

    print_times(&app).await
}

async fn handle_times() -> Result<()> {
    let app = open_app()?;
    print_times(&app).await
}

async fn print_times(app: &App) -> Result<()> {
    let Some(times) = app.location.prayer_times().await? else {
        println!("No prayer times stored. Run `SalatReminder location set <city>` first.");
        return Ok(());
    };

    if let Some(city) = app.location.city().await? {
        println!("Prayer times for {city}");
    }
    for prayer in DISPLAY_PRAYERS {
        println!("- {prayer:<8} {}", times.get(prayer).unwrap_or("--:--"));
    }

    if let Some(next) = next_prayer(&times, Local::now().time()) {
        println!(
            "Next prayer: {} at {} (in {}h {}m)",
            next.name,
            next.time,
            next.minutes_until / 60,
            next.minutes_until % 60
        );
    }

    Ok(())
}

async fn handle_settings_command(command: SettingsCommands) -> Result<()> {
    let app = open_app()?;
    let settings = match command {
        SettingsCommands::Set { key, value } => {
            let patch = SettingsPatch::from_key_value(&key, &value)?;
            let settings = update_settings(app.store.as_ref(), patch).await?;
            println!("Setting saved: {key} = {value}");
            settings
        }
        SettingsCommands::Show => load_settings(app.store.as_ref()).await?,
    };

    println!("- showAyah: {}", settings.show_ayah);
    println!("- showDua: {}", settings.show_dua);
    Ok(())
}

async fn handle_history(favorites: bool) -> Result<()> {
    let app = open_app()?;
    let (records, empty_message) = if favorites {
        (app.history.favorites().await?, "No favorites yet.")
    } else {
        (app.history.history().await?, "No notifications yet.")
    };

    if records.is_empty() {
        println!("{empty_message}");
        return Ok(());
    }

    let favorite_ids = app
        .history
        .favorites()
        .await?
        .into_iter()
        .map(|record| record.id)
        .collect::<Vec<_>>();

    for record in &records {
        print_record(record, favorite_ids.contains(&record.id));
    }

    Ok(())
}

fn print_record(record: &NotificationRecord, favorite: bool) {
    let shown_at = Local
        .timestamp_millis_opt(record.timestamp)
        .single()
        .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| record.timestamp.to_string());
    let marker = if favorite { "★" } else { "☆" };

    println!("{marker} [{}] {} ({shown_at})", record.kind, record.id);
    println!("  {}", record.headline());
    if let Some(translation) = record.translation() {
        println!("  {translation}");
    }
}

async fn handle_favorite(id: &str) -> Result<()> {
    let app = open_app()?;

    match app.history.toggle_favorite(id).await? {
        Some(true) => println!("Added to favorites: {id}"),
        Some(false) => println!("Removed from favorites: {id}"),
        None => println!("No notification with id: {id}"),
    }

    Ok(())
}

async fn handle_delete(id: &str, from_favorites: bool) -> Result<()> {
    let app = open_app()?;

    if app.history.delete(id, from_favorites).await? {
        println!("Deleted: {id}");
    } else {
        println!("No notification with id: {id}");
    }

    Ok(())
}

async fn handle_sweep() -> Result<()> {
    let app = open_app()?;
    let removed = app.history.sweep_unfavorited().await?;

    println!("Removed {removed} non-favorite notification(s)");
    Ok(())
}

async fn handle_fire(timer: &str) -> Result<()> {
    let timer = timer.parse::<TimerName>()?;
    let app = open_app()?;

    app.scheduler.dispatch(timer.as_str()).await;
    println!("Timer handled: {timer}");
    Ok(())
}

async fn handle_ayah() -> Result<()> {
    let app = open_app()?;
    let payload = app
        .scheduler
        .handle_message(MessageRequest::FetchRandomAyah)
        .await;

    match serde_json::from_value::<Option<Ayah>>(payload) {
        Ok(Some(ayah)) => {
            println!("{}", ayah.text);
            println!("{}", ayah.translation);
            println!(
                "Surah {} ({}:{})",
                ayah.surah_name_en, ayah.surah_number, ayah.ayah_number
            );
        }
        _ => println!("Could not load Ayah at this time"),
    }

    Ok(())
}

async fn handle_dhikr() -> Result<()> {
    let app = open_app()?;
    let payload = app
        .scheduler
        .handle_message(MessageRequest::FetchRandomDhikr)
        .await;

    match serde_json::from_value::<Option<Devotional>>(payload) {
        Ok(Some(entry)) => println!("{}", devotional_message(&entry)),
        _ => println!("Could not load Dhikr at this time"),
    }

    Ok(())
}

async fn handle_mosque() -> Result<()> {
    let app = open_app()?;

    match app.location.nearby_mosques().await {
        Ok(mosques) if mosques.is_empty() => {
            println!("No named mosques found nearby. OpenStreetMap data may be incomplete here.");
        }
        Ok(mosques) => {
            for mosque in mosques {
                println!("{} ({:.2} km)", mosque.name, mosque.distance_km);
                println!("  {}", mosque.address);
                println!("  {}", mosque.directions_url);
            }
        }
        Err(error) => println!("Could not find nearby mosques: {error}"),
    }

    Ok(())
}

async fn handle_status() -> Result<()> {
    let app = open_app()?;
    let settings = load_settings(app.store.as_ref()).await?;
    let times = app.location.prayer_times().await?;
    let last_ayah = read_value::<Ayah>(app.store.as_ref(), keys::LAST_AYAH).await?;

    println!("SalatReminder status");
    println!(
        "- location: {}",
        app.location
            .city()
            .await?
            .unwrap_or_else(|| "not_set".to_string())
    );
    println!(
        "- next_prayer: {}",
        times
            .as_ref()
            .and_then(|times| next_prayer(times, Local::now().time()))
            .map(|next| format!("{} at {}", next.name, next.time))
            .unwrap_or_else(|| "unknown".to_string())
    );
    println!("- show_ayah: {}", settings.show_ayah);
    println!("- show_dua: {}", settings.show_dua);
    println!("- history: {}", app.history.history().await?.len());
    println!("- favorites: {}", app.history.favorites().await?.len());
    println!(
        "- last_ayah: {}",
        last_ayah
            .map(|ayah| format!("{}:{}", ayah.surah_number, ayah.ayah_number))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("- api: http://127.0.0.1:{}", app.config.api_port);

    Ok(())
}

async fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match SqliteStore::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if let Err(error) = config.parse_refresh_time() {
        println!("[WARN] invalid prayer_refresh_time setting: {error}");
        issues.push("invalid prayer_refresh_time".to_string());
    } else {
        println!(
            "[OK] prayer_refresh_time format valid: {}",
            config.prayer_refresh_time
        );
    }

    match App::open(config) {
        Ok(app) => {
            if app.location.coordinates().await?.is_some() {
                println!("[OK] location configured");
            } else {
                println!("[WARN] no location saved; prayer notifications are off");
                issues.push("location missing".to_string());
            }

            match app.location.prayer_times().await? {
                Some(times) if !times.is_empty() => println!("[OK] prayer times stored"),
                _ => {
                    println!("[WARN] no prayer times stored; run `SalatReminder refresh`");
                    issues.push("prayer times missing".to_string());
                }
            }
        }
        Err(error) => {
            println!("[WARN] could not initialize services: {error}");
            issues.push("services unavailable".to_string());
        }
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let app = App::open(config)?;
    ensure_defaults(app.store.as_ref())
        .await
        .context("Failed to write default settings")?;

    let (timers, events) = TokioTimers::new();
    initialize_timers(&timers, Local::now())
        .await
        .context("Failed to register reminder timers")?;

    if let Err(error) = app
        .location
        .refresh_prayer_times(Local::now().date_naive())
        .await
    {
        warn!(error = %error, "startup prayer time refresh skipped");
    }

    let refresh_location = app.location.clone();
    let refresh_time_fallback = app.config.prayer_refresh_time.clone();
    let reminder_scheduler = Arc::clone(&app.scheduler);
    let api_app = app.clone();

    info!("SalatReminder service started");

    tokio::select! {
        scheduler_result = reminder_scheduler.run(events) => {
            scheduler_result?;
        }
        refresh_result = scheduler::refresh::run_daily(move || {
            let refresh_time = Config::load()
                .map(|runtime| runtime.prayer_refresh_time)
                .unwrap_or_else(|_| refresh_time_fallback.clone());

            parse_hhmm(&refresh_time)
        }, move |date| {
            let location = refresh_location.clone();
            async move {
                location
                    .refresh_prayer_times(date)
                    .await
                    .map(|_| ())
                    .map_err(anyhow::Error::from)
            }
        }) => {
            refresh_result?;
        }
        api_result = api::run_server(api_app) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    drop(timers);
    Ok(())
}

fn open_app() -> Result<App> {
    let config = load_or_default_config()?;
    App::open(config)
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load()
        .with_context(|| "Config file not found. Run `SalatReminder onboard` first.".to_string())
}
