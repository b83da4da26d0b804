//! Error types for page-fit validation

use std::fmt;

use thiserror::Error;

/// Result type alias for page-fit operations
pub type Result<T> = std::result::Result<T, Error>;

/// The dimension that overflowed the page budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Width,
    Height,
}

impl Axis {
    /// Adjective used in overflow messages ("wide" / "tall")
    pub fn adjective(self) -> &'static str {
        match self {
            Axis::Width => "wide",
            Axis::Height => "tall",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.adjective())
    }
}

/// Pixel measurement formatted without a trailing `.0` for whole values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Px(pub f64);

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() && self.0.fract() == 0.0 && self.0.abs() < 1e15 {
            write!(f, "{}", self.0 as i64)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

fn px(value: &f64) -> Px {
    Px(*value)
}

fn article(name: &str) -> &'static str {
    match name.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

/// Errors that can occur while loading, rendering, or checking a document
#[derive(Error, Debug)]
pub enum Error {
    /// A measured dimension exceeds the configured page budget
    #[error(
        "Element {element_id} is too {axis} to fit on {} {page_name} page, ({} pixels {axis})",
        article(.page_name),
        px(.measured_px)
    )]
    PageOverflow {
        element_id: String,
        axis: Axis,
        measured_px: f64,
        page_name: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Failed to load a template or stylesheet
    #[error("Failed to load template: {0}")]
    LoadError(String),

    /// Failed to build a layout from the template
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Malformed measurement snapshot
    #[error("Invalid snapshot: {0}")]
    SnapshotError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is a page-fit violation rather than an operational failure
    pub fn is_overflow(&self) -> bool {
        matches!(self, Error::PageOverflow { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SnapshotError(err.to_string())
    }
}
