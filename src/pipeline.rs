//! Print pipeline hook.
//!
//! The rendering host signals once that a document is laid out and ready.
//! `PrintPipeline` runs the page-fit check at that point and passes the
//! document on to the next print stage (typically PDF conversion) only when
//! everything fits.

use std::sync::Arc;

use log::info;

use crate::{Error, Measurable, PageFitChecker, Result};

type OnViolationHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Gatekeeper between layout and the print stage
pub struct PrintPipeline {
    checker: PageFitChecker,
    on_violation: Option<OnViolationHandler>,
}

impl PrintPipeline {
    pub fn new(checker: PageFitChecker) -> Self {
        Self {
            checker,
            on_violation: None,
        }
    }

    pub fn checker(&self) -> &PageFitChecker {
        &self.checker
    }

    /// Register a callback invoked with the violation before it is returned
    pub fn on_violation<F>(&mut self, cb: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_violation = Some(Arc::new(cb));
    }

    /// Remove a previously registered violation callback
    pub fn clear_on_violation(&mut self) {
        self.on_violation = None;
    }

    /// Handle the host's "document ready" signal.
    ///
    /// Runs the check on `body`; on success hands `body` to `next` and
    /// returns its output. On failure `next` is never called.
    pub fn document_ready<N, T, F>(&self, body: &N, next: F) -> Result<T>
    where
        N: Measurable,
        F: FnOnce(&N) -> Result<T>,
    {
        if let Err(err) = self.checker.check_document(body) {
            info!("page-fit check failed: {}", err);
            if let Some(cb) = &self.on_violation {
                cb(&err);
            }
            return Err(err);
        }
        info!("document fits on {} page", self.checker.config().page_name);
        next(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MeasuredElement;
    use crate::PageFitConfig;
    use std::sync::Mutex;

    fn pipeline() -> PrintPipeline {
        PrintPipeline::new(PageFitChecker::new(PageFitConfig::default()).unwrap())
    }

    #[test]
    fn fitting_document_reaches_next_stage() {
        let body = MeasuredElement::new("", 774.0, 1000.0);
        let out = pipeline()
            .document_ready(&body, |b| Ok(format!("pdf:{}", b.height)))
            .unwrap();
        assert_eq!(out, "pdf:1000");
    }

    #[test]
    fn violation_is_logged_below_warn() {
        crate::test_log::init();
        let body = MeasuredElement::new("", 774.0, 100.0)
            .with_children(vec![MeasuredElement::new("quiet-panel", 801.0, 10.0)]);
        assert!(pipeline().document_ready(&body, |_| Ok(())).is_err());

        // The caller reports the violation; the log must not repeat it at the default level
        let levels = crate::test_log::levels_mentioning("Element quiet-panel is too wide");
        assert_eq!(levels, vec![log::Level::Info]);
    }

    #[test]
    fn violation_skips_next_stage_and_notifies() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let mut p = pipeline();
        p.on_violation(move |e| seen_cb.lock().unwrap().push(e.to_string()));

        let body = MeasuredElement::new("", 774.0, 100.0)
            .with_children(vec![MeasuredElement::new("panel", 800.0, 10.0)]);
        let mut called = false;
        let res = p.document_ready(&body, |_| {
            called = true;
            Ok(())
        });

        assert!(res.unwrap_err().is_overflow());
        assert!(!called);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Element panel is too wide to fit on an A4 page, (800 pixels wide)".to_string()]
        );
    }

    #[test]
    fn next_stage_errors_propagate() {
        let body = MeasuredElement::new("", 774.0, 10.0);
        let res: Result<()> =
            pipeline().document_ready(&body, |_| Err(Error::Other("pdf failed".into())));
        assert_eq!(res.unwrap_err().to_string(), "pdf failed");
    }
}
