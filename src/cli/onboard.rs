use crate::config::{Config, NotifierKind, parse_hhmm};
use crate::models::Settings;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};

/// Everything onboarding asked for. Applying the city and settings needs the
/// store and the network, so the caller does it.
pub struct Onboarding {
    pub config: Config,
    pub city: Option<String>,
    pub settings: Settings,
}

pub fn run_onboarding() -> Result<Onboarding> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to SalatReminder onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();

    println!("\n[1/4] Location");
    println!("  Prayer times are fetched for the city you enter.");

    let city: String = Input::with_theme(&theme)
        .with_prompt("  City (leave empty to set later)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read city")?;
    let city = Some(city.trim().to_string()).filter(|city| !city.is_empty());

    match &city {
        Some(city) => println!("  ✓ Location: {city}"),
        None => println!("  ! No location yet. Run `SalatReminder location set <city>` later."),
    }

    println!("\n[2/4] Rotating reminders");
    let show_ayah = Confirm::with_theme(&theme)
        .with_prompt("  Show Quran Ayah reminders?")
        .default(true)
        .interact()
        .context("Failed to read Ayah reminder choice")?;
    let show_dua = Confirm::with_theme(&theme)
        .with_prompt("  Show Dua reminders and the Dua line in prayer notifications?")
        .default(true)
        .interact()
        .context("Failed to read Dua reminder choice")?;
    println!("  ✓ Ayah: {show_ayah}, Dua: {show_dua}");

    println!("\n[3/4] Notification style");
    let notifiers = ["desktop", "log"];
    let selected = Select::with_theme(&theme)
        .with_prompt("  Where should reminders appear?")
        .default(0)
        .items(&notifiers)
        .interact()
        .context("Failed to select notifier")?;
    let notifier = if selected == 1 {
        NotifierKind::Log
    } else {
        NotifierKind::Desktop
    };
    println!("  ✓ Notifier: {}", notifiers[selected.min(1)]);

    println!("\n[4/4] Daily prayer time refresh");
    let prayer_refresh_time: String = Input::with_theme(&theme)
        .with_prompt("  Refresh prayer times every day at")
        .default("00:05".to_string())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            parse_hhmm(input)
                .map(|_| ())
                .map_err(|_| "Use HH:MM format (example: 00:05)")
        })
        .interact_text()
        .context("Failed to read refresh time")?;
    println!("  ✓ Prayer times refresh daily at {prayer_refresh_time}");

    let config = Config {
        notifier,
        prayer_refresh_time,
        ..Config::default()
    };

    config.ensure_bootstrap_files()?;
    config.save()?;

    Ok(Onboarding {
        config,
        city,
        settings: Settings {
            show_ayah,
            show_dua,
        },
    })
}
