pub mod composer;

use crate::config::{Config, NotifierKind};
use crate::error::{ReminderError, ReminderResult};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::info;

/// Top of the host priority scale (0 to 2).
pub const HIGH_PRIORITY: u8 = 2;

/// What the host notification surface is asked to display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRequest {
    pub icon: Option<PathBuf>,
    pub title: String,
    pub body: String,
    pub context: Option<String>,
    pub priority: u8,
    pub require_interaction: bool,
    pub silent: bool,
    pub buttons: Vec<String>,
    /// Target of the first button, when the surface supports actions.
    pub action_url: Option<String>,
}

#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Shows the notification and returns the id the surface used.
    async fn create(&self, id: &str, request: &NotificationRequest) -> ReminderResult<String>;
}

/// Result of handing a notification to the surface. Callers may ignore it.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Carries the id the surface reported back.
    Delivered(String),
    Failed(ReminderError),
}

pub fn surface_from_config(config: &Config) -> Arc<dyn NotificationSurface> {
    match config.notifier {
        NotifierKind::Desktop => Arc::new(DesktopSurface),
        NotifierKind::Log => Arc::new(LogSurface),
    }
}

/// Native desktop notifications: `terminal-notifier` on macOS, `notify-send` elsewhere.
pub struct DesktopSurface;

#[async_trait]
impl NotificationSurface for DesktopSurface {
    async fn create(&self, id: &str, request: &NotificationRequest) -> ReminderResult<String> {
        let (program, args) = desktop_command(id, request);

        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|error| ReminderError::Surface(format!("failed to run {program}: {error}")))?;

        if output.status.success() {
            Ok(id.to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(ReminderError::Surface(format!("{program} failed: {stderr}")))
        }
    }
}

#[cfg(target_os = "macos")]
fn desktop_command(id: &str, request: &NotificationRequest) -> (&'static str, Vec<String>) {
    let mut args = vec![
        "-title".to_string(),
        request.title.clone(),
        "-message".to_string(),
        request.body.clone(),
        "-group".to_string(),
        id.to_string(),
    ];

    if let Some(context) = &request.context {
        args.extend(["-subtitle".to_string(), context.clone()]);
    }
    if let Some(icon) = &request.icon {
        args.extend(["-appIcon".to_string(), icon.display().to_string()]);
    }
    if !request.buttons.is_empty() {
        args.extend(["-actions".to_string(), request.buttons.join(",")]);
    }
    if let Some(url) = &request.action_url {
        args.extend(["-open".to_string(), url.clone()]);
    }
    if !request.silent {
        args.extend(["-sound".to_string(), "default".to_string()]);
    }

    ("terminal-notifier", args)
}

#[cfg(not(target_os = "macos"))]
fn desktop_command(_id: &str, request: &NotificationRequest) -> (&'static str, Vec<String>) {
    let urgency = if request.priority >= HIGH_PRIORITY {
        "critical"
    } else {
        "normal"
    };

    let mut args = vec![
        "--app-name=SalatReminder".to_string(),
        format!("--urgency={urgency}"),
    ];

    if request.require_interaction {
        args.push("--expire-time=0".to_string());
    }
    if let Some(icon) = &request.icon {
        args.push(format!("--icon={}", icon.display()));
    }

    let mut body = request.body.clone();
    if let Some(context) = &request.context {
        body.push_str(&format!("\n\n{context}"));
    }
    if let Some(url) = &request.action_url {
        body.push_str(&format!("\n{url}"));
    }

    args.push(request.title.clone());
    args.push(body);

    ("notify-send", args)
}

/// Writes notifications to the log instead of showing them.
pub struct LogSurface;

#[async_trait]
impl NotificationSurface for LogSurface {
    async fn create(&self, id: &str, request: &NotificationRequest) -> ReminderResult<String> {
        info!(
            id,
            title = %request.title,
            body = %request.body,
            context = request.context.as_deref().unwrap_or_default(),
            "notification"
        );

        Ok(id.to_string())
    }
}
