use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinklyticsError>;

#[derive(Debug, Error)]
pub enum LinklyticsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected sheet {sheet:?} (expected one of {expected})")]
    UnknownSheet { sheet: String, expected: String },

    #[error("Workbook is missing required sheet {0:?}")]
    MissingSheet(String),

    #[error("Sheet {sheet:?} has no column {column:?}")]
    MissingColumn { sheet: String, column: String },

    #[error("Row {row}: cannot parse {column:?} value {value:?}: {reason}")]
    Parse {
        row: usize,
        column: String,
        value: String,
        reason: String,
    },

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("top_n ({requested}) cannot be greater than the number of posts ({available})")]
    TopNExceedsPosts { requested: usize, available: usize },

    #[error("Cannot aggregate an empty post set")]
    EmptyPostSet,

    #[error("Failed to read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LinklyticsError {
    pub fn fetch(url: &str, message: impl Into<String>) -> Self {
        LinklyticsError::Fetch {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for LinklyticsError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        LinklyticsError::Fetch {
            url,
            message: err.to_string(),
        }
    }
}
