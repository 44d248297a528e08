use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A result printable in every output format.
pub trait Record: Serialize {
    /// Column name and rendered value, in display order.
    fn fields(&self) -> Vec<(&'static str, String)>;
}

#[derive(Serialize)]
pub struct BatteryOutput {
    pub endpoint: String,
    pub voltage: f32,
    pub level_percent: u8,
    pub timestamp: String,
}

impl Record for BatteryOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ENDPOINT", self.endpoint.clone()),
            ("VOLTAGE", format!("{:.2}", self.voltage)),
            ("LEVEL", format!("{}%", self.level_percent)),
        ]
    }
}

#[derive(Serialize)]
pub struct SensorOutput {
    pub endpoint: String,
    pub port: u8,
    pub mode: u8,
    pub values: Vec<f32>,
    pub timestamp: String,
}

impl Record for SensorOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        let values = self
            .values
            .iter()
            .map(|v| format!("{v}"))
            .collect::<Vec<_>>()
            .join(", ");
        vec![
            ("PORT", self.port.to_string()),
            ("MODE", self.mode.to_string()),
            ("VALUES", values),
        ]
    }
}

#[derive(Serialize)]
pub struct ActionOutput {
    pub endpoint: String,
    pub action: &'static str,
    pub detail: String,
    pub timestamp: String,
}

impl Record for ActionOutput {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ENDPOINT", self.endpoint.clone()),
            ("ACTION", self.action.to_string()),
            ("DETAIL", self.detail.clone()),
        ]
    }
}

pub fn print_record<R: Record>(record: &R, format: OutputFormat) {
    println!("{}", render(record, format));
}

pub fn render<R: Record>(record: &R, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let (header, row): (Vec<_>, Vec<_>) = record.fields().into_iter().unzip();
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header)
                .add_row(row);
            table.to_string()
        }
        OutputFormat::Pretty => record
            .fields()
            .into_iter()
            .map(|(name, value)| format!("{}={value}", name.to_ascii_lowercase()))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

pub fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
