//! pagefit
//!
//! Checks that rendered print templates fit on a fixed-size page before a PDF
//! rendering pass consumes them.
//!
//! The checker walks a rendered element tree depth-first and fails on the
//! first element that is wider than the page's printable width, or, for the
//! body and for elements styled `break-inside: avoid`, taller than the
//! printable height.
//!
//! # Features
//!
//! - **Host-agnostic**: anything implementing [`Measurable`] can be checked
//! - **Snapshots**: measurements dumped as JSON by another renderer ([`snapshot`])
//! - **HTML host** (`html`): a small CSS cascade and block layout over `scraper`
//! - **Fetching** (`fetch`): templates and linked stylesheets over HTTP
//!
//! # Example
//!
//! ```
//! use pagefit::{PageFitChecker, PageFitConfig};
//! use pagefit::snapshot::MeasuredElement;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let body = MeasuredElement::new("", 774.0, 1000.0)
//!     .with_children(vec![MeasuredElement::new("panel", 800.0, 40.0)]);
//!
//! let checker = PageFitChecker::new(PageFitConfig::default())?;
//! let err = checker.check_document(&body).unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "Element panel is too wide to fit on an A4 page, (800 pixels wide)"
//! );
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Axis, Error, Result};

pub mod measurable;
pub use measurable::{descendants, traverse, Measurable};

pub mod checker;
pub use checker::PageFitChecker;

pub mod pipeline;
pub use pipeline::PrintPipeline;

pub mod snapshot;

#[cfg(test)]
mod test_log;

// Built-in rendering host: HTML parsing, CSS cascade and block layout
#[cfg(feature = "html")]
pub mod rendering;

// Template and linked stylesheet loading (HTTP requires `fetch`)
#[cfg(feature = "html")]
pub mod loader;

/// What an element styled `break-inside: avoid` is height-checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AvoidBreakCheck {
    /// Re-measure the document body. This is how the template validation has
    /// always behaved.
    #[default]
    DocumentHeight,
    /// Measure the unsplittable element itself
    ElementHeight,
}

/// Page budget for the checker
///
/// The defaults describe an A4 page rendered at 96 dpi (793.7 x 1122.5 px),
/// rounded down to leave a small margin of error:
/// - `page_width_px` is 790
/// - `page_height_px` is 1120
///
/// The struct deserializes from JSON with camelCase keys; every key is
/// optional.
///
/// # Examples
///
/// ```
/// let cfg: pagefit::PageFitConfig = serde_json::from_str(r#"{"pageWidthPx": 600}"#).unwrap();
/// assert_eq!(cfg.page_width_px, 600.0);
/// assert_eq!(cfg.page_height_px, 1120.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageFitConfig {
    /// Maximum rendered width of any element, in pixels
    pub page_width_px: f64,
    /// Maximum rendered height of the body and of unsplittable elements, in pixels
    pub page_height_px: f64,
    /// Page name used in overflow messages
    pub page_name: String,
    /// Height rule for `break-inside: avoid` elements
    pub avoid_break: AvoidBreakCheck,
}

impl Default for PageFitConfig {
    fn default() -> Self {
        Self {
            page_width_px: 790.0,
            page_height_px: 1120.0,
            page_name: "A4".to_string(),
            avoid_break: AvoidBreakCheck::default(),
        }
    }
}

impl PageFitConfig {
    /// Load a configuration from a JSON file
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        let cfg: PageFitConfig = serde_json::from_str(&data)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("pageWidthPx", self.page_width_px),
            ("pageHeightPx", self.page_height_px),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::ConfigError(format!(
                    "{} must be a positive number of pixels, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Viewport the built-in layout renders into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    /// A4 at 96 dpi
    fn default() -> Self {
        Self {
            width: 794,
            height: 1123,
        }
    }
}

/// Check a document against the default A4 budget
pub fn check_document<N: Measurable>(body: &N) -> Result<()> {
    PageFitChecker::new(PageFitConfig::default())?.check_document(body)
}
