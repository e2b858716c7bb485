//! Progress-callback trait for learning-pack generation events.
//!
//! Inject an [`Arc<dyn PackProgressCallback>`] via
//! [`crate::config::PackConfigBuilder::progress_callback`] to receive events
//! as the pipeline extracts, generates and renders. The CLI drives its
//! progress bar from these; a library caller might forward them to a log or
//! a channel instead.

use crate::output::SectionKind;
use std::fmt;
use std::sync::Arc;

/// Coarse pipeline stages, reported in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Generating,
    Segmenting,
    Rendering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Extracting => "Extracting",
            Stage::Generating => "Generating",
            Stage::Segmenting => "Segmenting",
            Stage::Rendering => "Rendering",
        })
    }
}

/// Called by the pipeline as it works through a pack.
///
/// All methods default to no-ops. In per-section mode the section methods
/// may be called concurrently, so implementations must be `Send + Sync`
/// and synchronise their own state.
pub trait PackProgressCallback: Send + Sync {
    /// A new stage begins. `steps` is the number of units of work in it
    /// (sections to generate, artifacts to render), or 0 when unknown.
    fn on_stage_start(&self, stage: Stage, steps: usize) {
        let _ = (stage, steps);
    }

    /// An LLM request for `section` is about to be sent.
    fn on_section_start(&self, section: SectionKind) {
        let _ = section;
    }

    /// `section` came back and passed validation.
    fn on_section_complete(&self, section: SectionKind, chars: usize) {
        let _ = (section, chars);
    }

    /// `section` failed after all retries.
    fn on_section_error(&self, section: SectionKind, error: &str) {
        let _ = (section, error);
    }

    /// One PDF artifact has been rendered.
    fn on_artifact_rendered(&self, name: &str, bytes: usize) {
        let _ = (name, bytes);
    }

    /// Called once when the pack is assembled.
    fn on_pack_complete(&self, artifacts: usize, failed_sections: usize) {
        let _ = (artifacts, failed_sections);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PackProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PackConfig`].
pub type ProgressCallback = Arc<dyn PackProgressCallback>;
