//! Output formatting: plain, table, JSON, YAML.
//!
//! Ranging events stream one record at a time; settings render as a
//! single document (or a key/value table).

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use uwbctl_config::Settings;
use uwbctl_core::RangingEvent;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

// ── Event records ────────────────────────────────────────────────────

/// Flat, serializable view of one ranging event.
#[derive(Debug, Serialize)]
pub struct EventRecord {
    pub kind: &'static str,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azimuth_deg: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_deg: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_realtime_nanos: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&RangingEvent> for EventRecord {
    fn from(event: &RangingEvent) -> Self {
        let mut record = Self {
            kind: event_kind(event),
            endpoint: event.endpoint().id.clone(),
            distance_m: None,
            azimuth_deg: None,
            elevation_deg: None,
            elapsed_realtime_nanos: None,
            message: None,
        };
        match event {
            RangingEvent::PositionUpdated { position, .. } => {
                record.distance_m = Some(position.distance_m);
                record.azimuth_deg = position.azimuth_deg;
                record.elevation_deg = position.elevation_deg;
                record.elapsed_realtime_nanos = Some(position.elapsed_realtime_nanos);
            }
            RangingEvent::EndpointMessage { payload, .. } => {
                record.message = Some(String::from_utf8_lossy(payload).into_owned());
            }
            RangingEvent::EndpointFound { .. }
            | RangingEvent::EndpointLost { .. }
            | RangingEvent::Disconnected { .. } => {}
        }
        record
    }
}

fn event_kind(event: &RangingEvent) -> &'static str {
    match event {
        RangingEvent::EndpointFound { .. } => "found",
        RangingEvent::EndpointLost { .. } => "lost",
        RangingEvent::PositionUpdated { .. } => "position",
        RangingEvent::EndpointMessage { .. } => "message",
        RangingEvent::Disconnected { .. } => "disconnected",
    }
}

/// Render one event as a single output record.
pub fn render_event(
    format: OutputFormat,
    color: bool,
    event: &RangingEvent,
) -> Result<String, CliError> {
    let record = EventRecord::from(event);
    match format {
        OutputFormat::Plain | OutputFormat::Table => Ok(render_event_line(&record, color)),
        // A stream of pretty-printed documents is unreadable; events are
        // always one JSON object per line.
        OutputFormat::Json | OutputFormat::JsonCompact => Ok(serde_json::to_string(&record)?),
        OutputFormat::Yaml => Ok(format!("---\n{}", serde_yaml::to_string(&record)?)),
    }
}

fn render_event_line(record: &EventRecord, color: bool) -> String {
    let kind = format!("{:<12}", record.kind);
    let kind = if color {
        match record.kind {
            "position" => kind.green().to_string(),
            "found" => kind.cyan().to_string(),
            "message" => kind.magenta().to_string(),
            _ => kind.yellow().to_string(),
        }
    } else {
        kind
    };

    let mut line = format!("{kind} {}", record.endpoint);
    if let Some(distance) = record.distance_m {
        line.push_str(&format!("  {distance:.2} m"));
    }
    if let Some(azimuth) = record.azimuth_deg {
        line.push_str(&format!("  az {azimuth:+.1}°"));
    }
    if let Some(elevation) = record.elevation_deg {
        line.push_str(&format!("  el {elevation:+.1}°"));
    }
    if let Some(message) = &record.message {
        line.push_str(&format!("  {message:?}"));
    }
    line
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn setting_rows(settings: &Settings) -> Vec<SettingRow> {
    let uuid = settings
        .device_uuid
        .map_or_else(|| "(unset)".to_owned(), |uuid| uuid.to_string());
    let device = settings.device_settings();
    vec![
        SettingRow {
            key: "display_name",
            value: settings.display_name.clone(),
        },
        SettingRow {
            key: "device_uuid",
            value: uuid,
        },
        SettingRow {
            key: "endpoint_id",
            value: device.endpoint_id(),
        },
        SettingRow {
            key: "role",
            value: settings.role.to_string(),
        },
        SettingRow {
            key: "profile",
            value: settings.profile.to_string(),
        },
        SettingRow {
            key: "simulation.interval_ms",
            value: settings.simulation.interval_ms.to_string(),
        },
        SettingRow {
            key: "simulation.peer_id",
            value: settings.simulation.peer_id.clone(),
        },
        SettingRow {
            key: "simulation.base_distance_m",
            value: settings.simulation.base_distance_m.to_string(),
        },
    ]
}

/// Render the resolved settings in the chosen format.
pub fn render_settings(format: OutputFormat, settings: &Settings) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(Table::new(setting_rows(settings))
            .with(Style::rounded())
            .to_string()),
        OutputFormat::Plain => Ok(toml::to_string_pretty(settings)?),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(settings)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(settings)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(settings)?),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) -> Result<(), CliError> {
    if quiet || output.is_empty() {
        return Ok(());
    }
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", output.trim_end())?;
    stdout.flush()?;
    Ok(())
}
