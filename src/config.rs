use std::fs;
use std::path::{Path, PathBuf};

use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{LinklyticsError, Result};

pub const ENV_PREFIX: &str = "LINKLYTICS";
pub const DEFAULT_CONTENT_SELECTOR: &str = "div.attributed-text-segment-list__container";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    Chrome,
    Browserless,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the single exported `.xlsx` file.
    pub analytics_path: PathBuf,
    pub output_dir: PathBuf,
    pub top_n: usize,
    pub fetcher: FetcherKind,
    pub chrome_bin: String,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub render_wait_ms: u64,
    pub fetch_timeout_secs: u64,
    pub content_selector: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            analytics_path: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            top_n: 20,
            fetcher: FetcherKind::Chrome,
            chrome_bin: "chromium".into(),
            browserless_url: None,
            browserless_token: None,
            render_wait_ms: 5000,
            fetch_timeout_secs: 30,
            content_selector: DEFAULT_CONTENT_SELECTOR.into(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `LINKLYTICS_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_builder(
            Self::builder()?.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true)),
        )
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>> {
        let defaults = Config::try_from(&Settings::default()).map_err(config_error)?;
        Ok(Config::builder().add_source(defaults))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;
        if settings.top_n == 0 {
            return Err(LinklyticsError::Config("top_n must be at least 1".into()));
        }
        Ok(settings)
    }
}

fn config_error(e: ConfigError) -> LinklyticsError {
    LinklyticsError::Config(e.to_string())
}

/// Find the one `.xlsx` export in `dir`.
///
/// A missing directory is created so the user knows where to drop the file,
/// but that still fails: there is nothing to read yet.
pub fn locate_workbook(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        error!("The {} directory does not exist. Creating it...", dir.display());
        fs::create_dir_all(dir)?;
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        files.push(entry.path());
    }

    if files.len() != 1 {
        return Err(LinklyticsError::Config(format!(
            "there must be exactly one file in {}, found {}",
            dir.display(),
            files.len()
        )));
    }

    let path = files.remove(0);
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if !is_xlsx {
        return Err(LinklyticsError::Config(format!(
            "the file must be a .xlsx file, found {}",
            path.display()
        )));
    }
    Ok(path)
}

/// Process-wide setup, created once at start and handed to the pipeline.
#[derive(Debug, Clone)]
pub struct Workspace {
    output_dir: PathBuf,
}

impl Workspace {
    pub fn prepare(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir)?;
        info!("Output directory: {}", output_dir.display());
        Ok(Workspace {
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn output_path(&self, base_name: &str, extension: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", base_name, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::config::{File, FileFormat};

    fn load_toml(toml: &str) -> Result<Settings> {
        Settings::from_builder(Settings::builder()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn defaults_apply() {
        let s = load_toml("").unwrap();
        assert_eq!(s.analytics_path, PathBuf::from("data"));
        assert_eq!(s.output_dir, PathBuf::from("output"));
        assert_eq!(s.top_n, 20);
        assert_eq!(s.fetcher, FetcherKind::Chrome);
        assert_eq!(s.render_wait_ms, 5000);
        assert_eq!(s.content_selector, DEFAULT_CONTENT_SELECTOR);
        assert!(s.browserless_url.is_none());
    }

    #[test]
    fn overrides_apply() {
        let s = load_toml(
            r#"
            top_n = 5
            fetcher = "browserless"
            browserless_url = "http://localhost:3000"
            "#,
        )
        .unwrap();
        assert_eq!(s.top_n, 5);
        assert_eq!(s.fetcher, FetcherKind::Browserless);
        assert_eq!(s.browserless_url.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn zero_top_n_is_rejected() {
        assert!(matches!(load_toml("top_n = 0"), Err(LinklyticsError::Config(_))));
    }

    #[test]
    fn unknown_fetcher_is_rejected() {
        assert!(matches!(load_toml(r#"fetcher = "selenium""#), Err(LinklyticsError::Config(_))));
    }

    #[test]
    fn single_xlsx_is_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Content_2024.xlsx"), b"").unwrap();
        fs::write(dir.path().join(".DS_Store"), b"").unwrap();
        let path = locate_workbook(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "Content_2024.xlsx");
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("export.csv"), b"").unwrap();
        let err = locate_workbook(dir.path()).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }

    #[test]
    fn ambiguous_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.xlsx"), b"").unwrap();
        fs::write(dir.path().join("b.xlsx"), b"").unwrap();
        assert!(matches!(locate_workbook(dir.path()), Err(LinklyticsError::Config(_))));
    }

    #[test]
    fn missing_directory_is_created_then_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        assert!(matches!(locate_workbook(&data), Err(LinklyticsError::Config(_))));
        assert!(data.is_dir());
    }

    #[test]
    fn workspace_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/output");
        let ws = Workspace::prepare(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(ws.output_path("Content_2024", "md"), out.join("Content_2024.md"));
    }
}
