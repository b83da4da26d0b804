//! Block layout for print templates.
//!
//! This is not a browser layout engine. It stacks block boxes vertically,
//! flows inline text into its block with a fixed glyph advance of half the
//! font size, and honors explicit sizes, which is what makes template
//! elements overflow in practice. Floats, flex and table sizing are laid out
//! as plain blocks.

use scraper::node::Node;
use scraper::ElementRef;

use super::style::{Cascade, ComputedStyle};
use crate::{Error, Measurable, Result};

/// Tags that never generate a box
const NON_RENDERED: &[&str] = &[
    "head", "title", "meta", "link", "style", "script", "noscript", "template", "base",
];

/// Tags laid out inline unless a `display` rule says otherwise
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "dfn", "em", "i", "kbd", "label",
    "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var",
];

/// Replaced elements: sized by attributes or style, never by content
const REPLACED_TAGS: &[&str] = &["img", "svg", "canvas", "video", "iframe", "object", "embed"];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }

    fn resolve(style: &ComputedStyle, prefix: &str, suffix: &str, percent_base: f64) -> Self {
        let side = |name: &str| {
            style
                .length(&format!("{prefix}-{name}{suffix}"), percent_base)
                .unwrap_or(0.0)
                .max(0.0)
        };
        Self {
            top: side("top"),
            right: side("right"),
            bottom: side("bottom"),
            left: side("left"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxModel {
    pub margin: Edges,
    pub border: Edges,
    pub padding: Edges,
}

/// Border box position plus the edges around it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
}

impl LayoutBox {
    pub fn content_width(&self) -> f64 {
        let inset = self.box_model.border.horizontal() + self.box_model.padding.horizontal();
        (self.rect.width - inset).max(0.0)
    }

    pub fn content_height(&self) -> f64 {
        let inset = self.box_model.border.vertical() + self.box_model.padding.vertical();
        (self.rect.height - inset).max(0.0)
    }

    /// Width including horizontal margins
    pub fn outer_width(&self) -> f64 {
        self.rect.width + self.box_model.margin.horizontal()
    }

    /// Height including vertical margins
    pub fn outer_height(&self) -> f64 {
        self.rect.height + self.box_model.margin.vertical()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Block,
    Inline,
    /// Replaced elements and inline-blocks: placed like blocks, sized like inlines
    Atomic,
}

/// One laid-out element
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub tag: String,
    pub id: String,
    pub lb: LayoutBox,
    pub style: ComputedStyle,
    pub flow: FlowKind,
    /// Text flowed directly in this box, wrapped to its content width
    pub text: String,
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    fn translate(&mut self, dx: f64, dy: f64) {
        self.lb.rect.x += dx;
        self.lb.rect.y += dy;
        for child in &mut self.children {
            child.translate(dx, dy);
        }
    }

    /// Number of elements in this subtree, including this one
    pub fn element_count(&self) -> usize {
        1 + self.children.iter().map(LayoutNode::element_count).sum::<usize>()
    }

    /// Find the first element in this subtree with the given id
    pub fn find_by_id(&self, id: &str) -> Option<&LayoutNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_id(id))
    }
}

impl Measurable for LayoutNode {
    fn width(&self) -> f64 {
        snap(self.lb.content_width())
    }

    fn height(&self) -> f64 {
        snap(self.lb.content_height())
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn style_property(&self, name: &str) -> Option<&str> {
        self.style.get(name)
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

/// Deepest element nesting below the laid-out root before layout gives up
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Lays out elements against a cascade
pub struct LayoutEngine<'c> {
    cascade: &'c Cascade,
    max_depth: usize,
}

impl<'c> LayoutEngine<'c> {
    pub fn new(cascade: &'c Cascade) -> Self {
        Self {
            cascade,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Lay out `element` in a containing block `containing_width` wide, with
    /// its margin box starting at (`x`, `y`). `Ok(None)` when it generates no
    /// box; `RenderError` when elements nest deeper than the engine allows.
    pub fn layout(
        &self,
        element: ElementRef<'_>,
        parent_style: Option<&ComputedStyle>,
        containing_width: f64,
        x: f64,
        y: f64,
    ) -> Result<Option<LayoutNode>> {
        self.layout_at(element, parent_style, containing_width, x, y, 0)
    }

    fn layout_at(
        &self,
        element: ElementRef<'_>,
        parent_style: Option<&ComputedStyle>,
        containing_width: f64,
        x: f64,
        y: f64,
        depth: usize,
    ) -> Result<Option<LayoutNode>> {
        if depth > self.max_depth {
            return Err(Error::RenderError(format!(
                "elements nest deeper than {} levels",
                self.max_depth
            )));
        }
        let tag = element.value().name().to_ascii_lowercase();
        if NON_RENDERED.contains(&tag.as_str()) {
            return Ok(None);
        }
        let style = self.cascade.compute(element, parent_style);
        let display = style.get("display").map(|d| d.trim().to_ascii_lowercase());
        if display.as_deref() == Some("none") {
            return Ok(None);
        }
        let replaced = REPLACED_TAGS.contains(&tag.as_str());
        let flow = match display.as_deref() {
            Some("inline") => FlowKind::Inline,
            Some("inline-block") | Some("inline-table") | Some("inline-flex") => FlowKind::Atomic,
            Some(_) => FlowKind::Block,
            None if replaced => FlowKind::Atomic,
            None if INLINE_TAGS.contains(&tag.as_str()) => FlowKind::Inline,
            None => FlowKind::Block,
        };
        let is_row = match display.as_deref() {
            Some(d) => d == "table-row",
            None => tag == "tr",
        };
        // Sizes and their limits do not apply to non-replaced inline boxes
        let sized = flow != FlowKind::Inline || replaced;

        let box_model = BoxModel {
            margin: Edges::resolve(&style, "margin", "", containing_width),
            border: Edges::resolve(&style, "border", "-width", containing_width),
            padding: Edges::resolve(&style, "padding", "", containing_width),
        };
        let inset_x = box_model.border.horizontal() + box_model.padding.horizontal();
        let inset_y = box_model.border.vertical() + box_model.padding.vertical();
        let border_box = style
            .get("box-sizing")
            .map(|v| v.trim().eq_ignore_ascii_case("border-box"))
            .unwrap_or(false);
        let available = (containing_width - box_model.margin.horizontal() - inset_x).max(0.0);

        let explicit_width = style
            .length("width", containing_width)
            .or_else(|| attr_px(element, "width"))
            .filter(|_| sized)
            .map(|w| if border_box { (w - inset_x).max(0.0) } else { w });
        let font_size = style.font_size();
        let advance = font_size * 0.5;
        let white_space = style.get("white-space").map(|v| v.trim().to_ascii_lowercase());
        let preserve = matches!(white_space.as_deref(), Some("pre" | "pre-wrap" | "pre-line"));
        let nowrap = matches!(white_space.as_deref(), Some("nowrap" | "pre"));

        let mut content_width = match (explicit_width, flow) {
            (Some(w), _) => w,
            (None, FlowKind::Block) => available,
            (None, _) if replaced => 0.0,
            (None, _) => {
                let intrinsic = text_width(&collapse_text(element, preserve), advance);
                if nowrap {
                    intrinsic
                } else {
                    intrinsic.min(available)
                }
            }
        };
        if sized {
            if let Some(max) = style.length("max-width", containing_width) {
                content_width = content_width.min(if border_box { max - inset_x } else { max });
            }
            if let Some(min) = style.length("min-width", containing_width) {
                content_width = content_width.max(if border_box { min - inset_x } else { min });
            }
        }
        content_width = content_width.max(0.0);

        let content_x = x + box_model.margin.left + box_model.border.left + box_model.padding.left;
        let content_y = y + box_model.margin.top + box_model.border.top + box_model.padding.top;

        let mut children = Vec::new();
        let mut cursor = content_y;
        let mut run = String::new();
        let mut text = String::new();
        let line_height = style.line_height();

        let flush = |run: &mut String, cursor: &mut f64, text: &mut String| {
            let lines = wrap_lines(run, content_width, advance, nowrap);
            if !lines.is_empty() {
                *cursor += lines.len() as f64 * line_height;
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&lines.join("\n"));
            }
            run.clear();
        };

        if is_row {
            let (cells, row_height) =
                self.layout_row(element, &style, content_width, content_x, cursor, depth)?;
            children = cells;
            cursor += row_height;
        } else if !replaced {
            for child in element.children() {
                match child.value() {
                    Node::Text(t) if preserve => run.push_str(t),
                    Node::Text(t) => run.push_str(&t.replace(|c: char| c.is_whitespace(), " ")),
                    Node::Element(e) if e.name().eq_ignore_ascii_case("br") => run.push('\n'),
                    Node::Element(_) => {
                        let Some(child_el) = ElementRef::wrap(child) else {
                            continue;
                        };
                        let Some(mut node) = self.layout_at(
                            child_el,
                            Some(&style),
                            content_width,
                            content_x,
                            0.0,
                            depth + 1,
                        )?
                        else {
                            continue;
                        };
                        match node.flow {
                            FlowKind::Inline => {
                                node.translate(0.0, cursor);
                                run.push_str(&collapse_text(child_el, preserve));
                            }
                            FlowKind::Block | FlowKind::Atomic => {
                                flush(&mut run, &mut cursor, &mut text);
                                node.translate(0.0, cursor);
                                cursor += node.lb.outer_height();
                            }
                        }
                        children.push(node);
                    }
                    _ => {}
                }
            }
            flush(&mut run, &mut cursor, &mut text);
        }

        let flowed_height = cursor - content_y;
        // Percentage heights against an auto-height parent behave as `auto`
        let mut content_height = style
            .get("height")
            .filter(|v| !v.trim().ends_with('%'))
            .and_then(|_| style.length("height", 0.0))
            .or_else(|| attr_px(element, "height"))
            .filter(|_| sized)
            .map(|h| if border_box { (h - inset_y).max(0.0) } else { h })
            .unwrap_or(flowed_height);
        if sized {
            if let Some(min) = style.length("min-height", 0.0) {
                content_height = content_height.max(if border_box { min - inset_y } else { min });
            }
        }
        content_height = content_height.max(0.0);

        let rect = Rect {
            x: x + box_model.margin.left,
            y: y + box_model.margin.top,
            width: content_width + inset_x,
            height: content_height + inset_y,
        };

        Ok(Some(LayoutNode {
            id: element.value().attr("id").unwrap_or_default().to_string(),
            tag,
            lb: LayoutBox { rect, box_model },
            style,
            flow,
            text,
            children,
        }))
    }

    /// Place the cells of a table row side by side, `width` wide in total.
    ///
    /// Cells with a `width` keep it; the others share what is left equally.
    /// Returns the cells and the row height, the tallest cell's margin box.
    fn layout_row(
        &self,
        row: ElementRef<'_>,
        row_style: &ComputedStyle,
        width: f64,
        x: f64,
        y: f64,
        depth: usize,
    ) -> Result<(Vec<LayoutNode>, f64)> {
        let mut cells = Vec::new();
        for cell in row.children().filter_map(ElementRef::wrap) {
            if NON_RENDERED.contains(&cell.value().name()) {
                continue;
            }
            let style = self.cascade.compute(cell, Some(row_style));
            if style.get("display").map(str::trim) == Some("none") {
                continue;
            }
            let sized = style.length("width", width).is_some() || attr_px(cell, "width").is_some();
            cells.push((cell, sized));
        }

        let mut placed: Vec<Option<LayoutNode>> = vec![None; cells.len()];
        let mut fixed = 0.0;
        for (slot, (cell, sized)) in placed.iter_mut().zip(&cells) {
            if *sized {
                *slot = self.layout_at(*cell, Some(row_style), width, x, 0.0, depth + 1)?;
                fixed += slot.as_ref().map_or(0.0, |n| n.lb.outer_width());
            }
        }
        let auto = cells.iter().filter(|(_, sized)| !sized).count();
        let share = if auto > 0 {
            ((width - fixed) / auto as f64).max(0.0)
        } else {
            0.0
        };
        for (slot, (cell, sized)) in placed.iter_mut().zip(&cells) {
            if !*sized {
                *slot = self.layout_at(*cell, Some(row_style), share, x, 0.0, depth + 1)?;
            }
        }

        let mut offset = 0.0;
        let mut height = 0.0f64;
        let mut laid = Vec::with_capacity(placed.len());
        for mut node in placed.into_iter().flatten() {
            node.translate(offset, y);
            offset += node.lb.outer_width();
            height = height.max(node.lb.outer_height());
            laid.push(node);
        }
        Ok((laid, height))
    }
}

/// Round to 1/64 px so stacked fractional line heights report whole pixels
pub fn snap(px: f64) -> f64 {
    (px * 64.0).round() / 64.0
}

fn attr_px(element: ElementRef<'_>, name: &str) -> Option<f64> {
    element
        .value()
        .attr(name)
        .and_then(|v| v.trim().trim_end_matches("px").parse::<f64>().ok())
}

/// All descendant text of an element, whitespace-collapsed unless `preserve`
fn collapse_text(element: ElementRef<'_>, preserve: bool) -> String {
    let raw = element.text().collect::<String>();
    if preserve {
        raw
    } else {
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn text_width(text: &str, advance: f64) -> f64 {
    text.lines()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0) as f64
        * advance
}

/// Word-wrap `text` to `width` pixels with a fixed per-character advance.
///
/// Forced breaks (`\n`) are kept; with `nowrap` only forced breaks split lines.
pub fn wrap_lines(text: &str, width: f64, advance: f64, nowrap: bool) -> Vec<String> {
    let chars_per_line = if advance > 0.0 && width >= advance {
        (width / advance) as usize
    } else {
        1
    };
    let mut lines = Vec::new();
    let segments: Vec<&str> = text.split('\n').collect();
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        let mut cur = String::new();
        if nowrap {
            cur = segment.split_whitespace().collect::<Vec<_>>().join(" ");
        } else {
            for word in segment.split_whitespace() {
                if cur.chars().count() + word.chars().count() + 1 > chars_per_line && !cur.is_empty() {
                    lines.push(std::mem::take(&mut cur));
                    cur = word.to_string();
                } else {
                    if !cur.is_empty() {
                        cur.push(' ');
                    }
                    cur.push_str(word);
                }
            }
        }
        // A forced break always ends a line, even an empty one
        if !cur.is_empty() || (i < last && !lines.is_empty()) {
            lines.push(cur);
        }
    }
    lines
}
