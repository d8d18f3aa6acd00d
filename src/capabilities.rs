// External collaborators the pipeline consumes. The core never inspects
// their internals: frames arrive decoded, detections arrive with persistent
// person IDs already associated across frames.

use crate::types::{Detection, Frame};

/// Detection + cross-frame identity association. Implementations are
/// stateful across the call sequence; the pipeline calls this once per
/// frame, strictly in frame order.
pub trait DetectAndTrack {
    fn detect_and_track(
        &mut self,
        frame: &Frame,
        frame_index: usize,
    ) -> anyhow::Result<Vec<Detection>>;
}

/// Optional progress sink invoked at named pipeline milestones.
/// Absence of a sink must not affect results; use [`NoProgress`].
pub trait ProgressSink {
    fn report(&self, percent: u8, label: &str);
}

/// Sink that discards all progress reports.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _label: &str) {}
}

impl<F> ProgressSink for F
where
    F: Fn(u8, &str),
{
    fn report(&self, percent: u8, label: &str) {
        self(percent, label)
    }
}
