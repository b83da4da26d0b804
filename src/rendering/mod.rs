//! Built-in rendering host
//!
//! Parses an HTML template, cascades its styles and lays it out so the
//! page-fit checker has something to measure without a browser.

pub mod layout;
pub mod style;

use log::debug;
use scraper::{Html, Selector};

use crate::{Error, Result, Viewport};
use layout::{LayoutEngine, LayoutNode};
use style::{Cascade, StyleSheet};

/// A laid-out template, ready for measurement
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub title: String,
    pub viewport: Viewport,
    pub body: LayoutNode,
}

/// Whether a `media` attribute value applies when printing
pub(crate) fn media_attr_applies(media: Option<&str>) -> bool {
    media.map_or(true, style::media_applies_to_print)
}

/// Lay out `html` into `viewport`.
///
/// `linked_styles` are stylesheet texts fetched on behalf of the document
/// (see [`crate::loader`]); they cascade before the document's own `<style>`
/// blocks.
pub fn render_html(html: &str, linked_styles: &[String], viewport: Viewport) -> Result<RenderedDocument> {
    let document = Html::parse_document(html);

    let mut sheets: Vec<StyleSheet> = linked_styles.iter().map(|css| StyleSheet::parse(css)).collect();
    let style_sel = selector("style")?;
    for node in document.select(&style_sel) {
        if !media_attr_applies(node.value().attr("media")) {
            continue;
        }
        let txt = node.text().collect::<String>();
        if !txt.trim().is_empty() {
            sheets.push(StyleSheet::parse(&txt));
        }
    }
    debug!("cascading {} stylesheet(s)", sheets.len());
    let cascade = Cascade::new(sheets);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|n| n.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let root = document.root_element();
    let root_style = cascade.compute(root, None);
    let body_el = document
        .select(&selector("body")?)
        .next()
        .ok_or_else(|| Error::RenderError("document has no <body>".to_string()))?;

    let body = LayoutEngine::new(&cascade)
        .layout(body_el, Some(&root_style), f64::from(viewport.width), 0.0, 0.0)?
        .ok_or_else(|| Error::RenderError("<body> generates no box".to_string()))?;
    debug!(
        "laid out {} element(s), body {}x{}px",
        body.element_count(),
        body.lb.content_width(),
        body.lb.content_height()
    );

    Ok(RenderedDocument {
        title,
        viewport,
        body,
    })
}

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| Error::RenderError(format!("invalid selector {}: {:?}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Measurable;

    #[test]
    fn render_collects_title_and_styles() {
        let html = r#"<html><head><title> Invoice </title><style>#total { width: 300px }</style>
            <style media="screen">#total { width: 999px }</style></head>
            <body><div id="total">42</div></body></html>"#;
        let doc = render_html(html, &[], Viewport::default()).unwrap();
        assert_eq!(doc.title, "Invoice");
        assert_eq!(doc.body.find_by_id("total").unwrap().width(), 300.0);
    }

    #[test]
    fn linked_styles_lose_to_document_styles() {
        let html = r#"<html><head><style>.a { width: 100px }</style></head><body><div id="x" class="a"></div></body></html>"#;
        let linked = vec![".a { width: 50px; height: 10px }".to_string()];
        let doc = render_html(html, &linked, Viewport::default()).unwrap();
        let x = doc.body.find_by_id("x").unwrap();
        assert_eq!(x.width(), 100.0);
        assert_eq!(x.height(), 10.0);
    }

    #[test]
    fn hidden_body_is_an_error() {
        let html = r#"<html><body style="display: none"></body></html>"#;
        assert!(matches!(
            render_html(html, &[], Viewport::default()),
            Err(Error::RenderError(_))
        ));
    }

    #[test]
    fn media_attribute_filter() {
        assert!(media_attr_applies(None));
        assert!(media_attr_applies(Some("print")));
        assert!(media_attr_applies(Some("all")));
        assert!(!media_attr_applies(Some("screen")));
        assert!(!media_attr_applies(Some("not print")));
        assert!(!media_attr_applies(Some("small")));
        assert!(media_attr_applies(Some("screen, print")));
    }

    #[test]
    fn not_print_style_block_is_ignored() {
        let html = r#"<html><head><style media="not print">#a { width: 900px }</style></head>
            <body><div id="a"></div></body></html>"#;
        let doc = render_html(html, &[], Viewport::default()).unwrap();
        assert_eq!(doc.body.find_by_id("a").unwrap().width(), 778.0);
    }

    #[test]
    fn deep_nesting_is_a_render_error() {
        let depth = 20_000;
        let html = format!(
            "<html><body>{}{}</body></html>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        // Same stack as the binary's main thread
        let result = std::thread::Builder::new()
            .stack_size(8 * 1024 * 1024)
            .spawn(move || render_html(&html, &[], Viewport::default()).map(|_| ()))
            .unwrap()
            .join()
            .unwrap();
        match result {
            Err(Error::RenderError(msg)) => assert!(msg.contains("256"), "{msg}"),
            other => panic!("expected a render error, got {other:?}"),
        }
    }

    #[test]
    fn nesting_within_the_limit_renders() {
        let html = format!(
            "<html><body>{}<p id=\"leaf\">x</p>{}</body></html>",
            "<div>".repeat(100),
            "</div>".repeat(100)
        );
        let doc = render_html(&html, &[], Viewport::default()).unwrap();
        assert_eq!(doc.body.element_count(), 102);
        assert!(doc.body.find_by_id("leaf").is_some());
    }
}
