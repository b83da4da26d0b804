//! Measured element snapshots.
//!
//! A rendering host that cannot link against this crate (a headless browser,
//! a print server) can dump the measurements of its laid-out tree as JSON and
//! have them checked offline:
//!
//! ```json
//! {
//!   "tag": "body", "id": "", "width": 774, "height": 1000,
//!   "children": [
//!     { "tag": "div", "id": "panel", "width": 800, "height": 40,
//!       "style": { "break-inside": "avoid" } }
//!   ]
//! }
//! ```
//!
//! Only `width` and `height` are required.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Measurable, Result};

/// One element of a measured document tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredElement {
    /// Tag name, informational only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// Element identifier (may be empty)
    #[serde(default)]
    pub id: String,
    /// Rendered content width in pixels
    pub width: f64,
    /// Rendered content height in pixels
    pub height: f64,
    /// Computed style properties the host chose to export
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
    /// Child elements in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MeasuredElement>,
}

impl MeasuredElement {
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            tag: String::new(),
            id: id.into(),
            width,
            height,
            style: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(name.into(), value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<MeasuredElement>) -> Self {
        self.children = children;
        self
    }

    /// Parse a snapshot from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let root: MeasuredElement = serde_json::from_str(json)?;
        root.validate()?;
        Ok(root)
    }

    /// Parse a snapshot from any reader producing JSON
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let root: MeasuredElement = serde_json::from_reader(reader)?;
        root.validate()?;
        Ok(root)
    }

    /// Read and parse a snapshot file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| Error::LoadError(format!("{}: {}", path.display(), e)))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // Measurements are compared with `>`; NaN would silently pass every check.
    fn validate(&self) -> Result<()> {
        let mut pending = vec![self];
        while let Some(el) = pending.pop() {
            if !el.width.is_finite() || !el.height.is_finite() {
                return Err(Error::SnapshotError(format!(
                    "element '{}' has a non-finite measurement ({} x {})",
                    el.id, el.width, el.height
                )));
            }
            pending.extend(el.children.iter());
        }
        Ok(())
    }
}

impl Measurable for MeasuredElement {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn style_property(&self, name: &str) -> Option<&str> {
        self.style.get(name).map(String::as_str)
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

#[cfg(feature = "html")]
impl From<&crate::rendering::layout::LayoutNode> for MeasuredElement {
    fn from(node: &crate::rendering::layout::LayoutNode) -> Self {
        let style = node
            .style
            .iter()
            .filter(|(name, _)| EXPORTED_PROPERTIES.contains(&name.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            tag: node.tag.clone(),
            id: node.id.clone(),
            width: node.width(),
            height: node.height(),
            style,
            children: node.children.iter().map(MeasuredElement::from).collect(),
        }
    }
}

#[cfg(feature = "html")]
const EXPORTED_PROPERTIES: &[&str] = &["break-inside", "display"];
