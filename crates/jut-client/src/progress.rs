//! Drain tracking for a job's sinks.

use jut_proto::{SinkInfo, StreamEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SinkState {
    channel: String,
    done: bool,
}

/// Tracks `job_end` and per-sink end-of-stream.
///
/// A job is drained once `job_end` was seen *and* every known sink has
/// reported `eof`. Sinks first seen through their data frames are tracked
/// the same way as sinks announced up front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobProgress {
    sinks: Vec<SinkState>,
    job_ended: bool,
}

impl JobProgress {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking announced sinks.
    pub fn register_sinks(&mut self, sinks: &[SinkInfo]) {
        for sink in sinks {
            self.track(&sink.channel);
        }
    }

    /// Fold one event into the tracker.
    pub fn observe(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::JobStarted(info) => self.register_sinks(&info.sinks),
            StreamEvent::Points { sink, .. } => {
                self.track(sink);
            }
            StreamEvent::SinkEnd { sink } => self.track(sink).done = true,
            StreamEvent::JobEnd => self.job_ended = true,
            StreamEvent::Tick
            | StreamEvent::Ping
            | StreamEvent::Warning { .. }
            | StreamEvent::Error { .. } => {}
        }
    }

    /// Whether `job_end` was seen.
    #[must_use]
    pub const fn job_ended(&self) -> bool {
        self.job_ended
    }

    /// Sinks that have not reported `eof`.
    #[must_use]
    pub fn pending_sinks(&self) -> usize {
        self.sinks.iter().filter(|s| !s.done).count()
    }

    /// Whether the job and all of its sinks are finished.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.job_ended && self.sinks.iter().all(|s| s.done)
    }

    fn track(&mut self, channel: &str) -> &mut SinkState {
        let idx = match self.sinks.iter().position(|s| s.channel == channel) {
            Some(idx) => idx,
            None => {
                self.sinks.push(SinkState {
                    channel: channel.to_string(),
                    done: false,
                });
                self.sinks.len() - 1
            }
        };
        &mut self.sinks[idx]
    }
}
