//! Page-fit checker
//!
//! Walks a rendered document and fails on the first element that cannot fit
//! on one printed page.

use log::{debug, trace};

use crate::measurable::traverse;
use crate::{AvoidBreakCheck, Axis, Error, Measurable, PageFitConfig, Result};

/// Style property that marks an element as unsplittable across pages
pub const BREAK_INSIDE: &str = "break-inside";

/// Validates rendered elements against a page budget.
#[derive(Debug, Clone)]
pub struct PageFitChecker {
    config: PageFitConfig,
}

impl PageFitChecker {
    /// Create a checker, rejecting budgets that are not finite and positive
    pub fn new(config: PageFitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PageFitConfig {
        &self.config
    }

    /// Check the body's height, then every descendant of the body in pre-order.
    ///
    /// The first violation is returned; nothing after it is measured.
    pub fn check_document<N: Measurable>(&self, body: &N) -> Result<()> {
        debug!(
            "checking document against {}x{}px {} page",
            self.config.page_width_px, self.config.page_height_px, self.config.page_name
        );
        self.check_height(body)?;
        traverse(body, |element| self.check_element(element, body))
    }

    /// Check a single element.
    ///
    /// Fails when the element is wider than the page. When the element is
    /// marked `break-inside: avoid`, the height rule is applied as well: to
    /// `body` under [`AvoidBreakCheck::DocumentHeight`], to the element itself
    /// under [`AvoidBreakCheck::ElementHeight`].
    pub fn check_element<N: Measurable>(&self, element: &N, body: &N) -> Result<()> {
        self.check_width(element)?;
        if avoids_break(element) {
            trace!("element '{}' avoids page breaks", element.id());
            match self.config.avoid_break {
                AvoidBreakCheck::DocumentHeight => self.check_height(body)?,
                AvoidBreakCheck::ElementHeight => self.check_height(element)?,
            }
        }
        Ok(())
    }

    fn check_width<N: Measurable>(&self, element: &N) -> Result<()> {
        let width = element.width();
        debug!("element '{}' is {}px wide", element.id(), width);
        if width > self.config.page_width_px {
            return Err(self.overflow(element, Axis::Width, width));
        }
        Ok(())
    }

    fn check_height<N: Measurable>(&self, element: &N) -> Result<()> {
        let height = element.height();
        if height > self.config.page_height_px {
            return Err(self.overflow(element, Axis::Height, height));
        }
        Ok(())
    }

    fn overflow<N: Measurable>(&self, element: &N, axis: Axis, measured_px: f64) -> Error {
        Error::PageOverflow {
            element_id: element.id().to_string(),
            axis,
            measured_px,
            page_name: self.config.page_name.clone(),
        }
    }
}

fn avoids_break<N: Measurable>(element: &N) -> bool {
    element
        .style_property(BREAK_INSIDE)
        .map(|v| v.trim().eq_ignore_ascii_case("avoid"))
        .unwrap_or(false)
}
