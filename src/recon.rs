//! Observer hook for passive content scanners
//!
//! The mirror notifies an observer of every fetched page body and of script,
//! stylesheet, document and unclassified asset bodies. Observers cannot fail
//! the pipeline: neither method returns an error.

use std::path::Path;

/// Receives fetched bodies and produces a report when the run ends
pub trait ReconObserver: Send + Sync {
    /// Called once per fetched body; must not block for long
    fn observe(&self, url: &str, body: &[u8], content_type: &str);

    /// Called once after the run, with the mirror's output root
    fn emit_report(&self, output_root: &Path);
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ReconObserver for NoopObserver {
    fn observe(&self, _url: &str, _body: &[u8], _content_type: &str) {}

    fn emit_report(&self, _output_root: &Path) {}
}
