//! Template loading.
//!
//! Reads a template from disk or over HTTP and collects the stylesheets it
//! links to, so the rendering host sees the same styles the print server
//! would.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use scraper::{Html, Selector};

use crate::{Error, Result};

/// Loader settings
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string sent with HTTP requests
    pub user_agent: String,
    /// Timeout for each HTTP request in milliseconds
    pub timeout_ms: u64,
    /// Whether to fetch `<link rel="stylesheet">` targets
    pub load_linked_styles: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("pagefit/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 30000,
            load_linked_styles: true,
        }
    }
}

/// A template and the stylesheet texts it links to, in document order
#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    pub source: String,
    pub html: String,
    pub linked_styles: Vec<String>,
}

/// Where a template or stylesheet lives
#[derive(Debug, Clone, PartialEq)]
enum Location {
    File(PathBuf),
    #[cfg(feature = "fetch")]
    Http(url::Url),
}

impl Location {
    fn parse(source: &str) -> Result<Self> {
        let lower = source.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            #[cfg(feature = "fetch")]
            {
                return url::Url::parse(source)
                    .map(Location::Http)
                    .map_err(|e| Error::LoadError(format!("invalid URL {}: {}", source, e)));
            }
            #[cfg(not(feature = "fetch"))]
            {
                return Err(Error::LoadError(format!(
                    "{}: HTTP sources need the `fetch` feature",
                    source
                )));
            }
        }
        Ok(Location::File(PathBuf::from(source)))
    }

    /// Resolve `href` relative to this location
    fn join(&self, href: &str) -> Result<Location> {
        match self {
            Location::File(path) => {
                if href.contains("://") {
                    return Location::parse(href);
                }
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                Ok(Location::File(base.join(href)))
            }
            #[cfg(feature = "fetch")]
            Location::Http(base) => base
                .join(href)
                .map(Location::Http)
                .map_err(|e| Error::LoadError(format!("cannot resolve {}: {}", href, e))),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::File(p) => write!(f, "{}", p.display()),
            #[cfg(feature = "fetch")]
            Location::Http(u) => write!(f, "{}", u),
        }
    }
}

/// Loads templates and their linked stylesheets
pub struct TemplateLoader {
    config: LoaderConfig,
    #[cfg(feature = "fetch")]
    client: reqwest::blocking::Client,
}

impl TemplateLoader {
    pub fn new(config: LoaderConfig) -> Result<Self> {
        #[cfg(feature = "fetch")]
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::LoadError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            #[cfg(feature = "fetch")]
            client,
        })
    }

    /// Load the template at `source` (a file path or an `http(s)` URL)
    pub fn load(&self, source: &str) -> Result<LoadedTemplate> {
        let location = Location::parse(source)?;
        let html = self.read(&location)?;
        let linked_styles = if self.config.load_linked_styles {
            self.linked_styles(&html, &location)
        } else {
            Vec::new()
        };
        Ok(LoadedTemplate {
            source: source.to_string(),
            html,
            linked_styles,
        })
    }

    fn read(&self, location: &Location) -> Result<String> {
        debug!("loading {}", location);
        match location {
            Location::File(path) => std::fs::read_to_string(path)
                .map_err(|e| Error::LoadError(format!("{}: {}", path.display(), e))),
            #[cfg(feature = "fetch")]
            Location::Http(url) => {
                let resp = self
                    .client
                    .get(url.clone())
                    .send()
                    .map_err(|e| Error::LoadError(format!("Failed to fetch {}: {}", url, e)))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(Error::LoadError(format!("Failed to fetch {}: HTTP {}", url, status)));
                }
                resp.text()
                    .map_err(|e| Error::LoadError(format!("Failed to read response body: {}", e)))
            }
        }
    }

    /// Fetch every `<link rel="stylesheet">` target; failures are logged and skipped
    fn linked_styles(&self, html: &str, base: &Location) -> Vec<String> {
        let document = Html::parse_document(html);
        let link_sel = match Selector::parse("link[href]") {
            Ok(sel) => sel,
            Err(_) => return Vec::new(),
        };

        let mut styles = Vec::new();
        for node in document.select(&link_sel) {
            let is_stylesheet = node
                .value()
                .attr("rel")
                .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
                .unwrap_or(false);
            if !is_stylesheet || !crate::rendering::media_attr_applies(node.value().attr("media")) {
                continue;
            }
            let Some(href) = node.value().attr("href") else {
                continue;
            };
            let text = base.join(href).and_then(|loc| self.read(&loc));
            match text {
                Ok(css) if !css.trim().is_empty() => styles.push(css),
                Ok(_) => {}
                Err(e) => warn!("skipping stylesheet {}: {}", href, e),
            }
        }
        styles
    }
}
