use std::{fs, path::PathBuf};

use meter_client::domain::Period;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Xlsx,
    Csv,
}

fn default_header_row() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkbookConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: SourceFormat,
    /// 0-based row holding the column headers; data starts on the next row.
    #[serde(default = "default_header_row")]
    pub header_row: usize,
    /// Periods to load, in order. Absent means every period in the file.
    pub periods: Option<Vec<Period>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub workbook: WorkbookConfig,
    pub server: ServerConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("CONSUMPTION_CONFIG").unwrap_or_else(|_| "consumption-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}

impl WorkbookConfig {
    /// Config for a one-shot run against a file given on the command line.
    pub fn for_path<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => SourceFormat::Csv,
            _ => SourceFormat::Xlsx,
        };

        Self {
            path,
            format,
            header_row: default_header_row(),
            periods: None,
        }
    }
}
