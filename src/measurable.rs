//! The node capability the checker consumes, and the descendant walk over it.

use crate::Result;

/// A rendered element whose box can be measured.
///
/// Any rendering host can satisfy this: the snapshot tree in
/// [`crate::snapshot`] and the built-in layout in `rendering::layout` both do.
/// Widths and heights are content-box CSS pixels.
pub trait Measurable {
    /// Rendered width in pixels
    fn width(&self) -> f64;

    /// Rendered height in pixels
    fn height(&self) -> f64;

    /// Element identifier (empty when the element has none)
    fn id(&self) -> &str;

    /// Computed value of a style property, if the host knows it
    fn style_property(&self, name: &str) -> Option<&str>;

    /// Child elements in document order
    fn children(&self) -> &[Self]
    where
        Self: Sized;
}

/// Lazy depth-first, pre-order iterator over the descendants of a node.
///
/// The starting node itself is not yielded.
pub struct Descendants<'a, N> {
    stack: Vec<std::slice::Iter<'a, N>>,
}

impl<'a, N: Measurable> Iterator for Descendants<'a, N> {
    type Item = &'a N;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(node) => {
                    let children = node.children();
                    if !children.is_empty() {
                        self.stack.push(children.iter());
                    }
                    return Some(node);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Walk the descendants of `root` in pre-order
pub fn descendants<N: Measurable>(root: &N) -> Descendants<'_, N> {
    Descendants {
        stack: vec![root.children().iter()],
    }
}

/// Apply `visit` to every descendant of `root` exactly once, in pre-order.
///
/// Stops at the first error; no node after the failing one is visited.
pub fn traverse<N, F>(root: &N, mut visit: F) -> Result<()>
where
    N: Measurable,
    F: FnMut(&N) -> Result<()>,
{
    for node in descendants(root) {
        visit(node)?;
    }
    Ok(())
}
