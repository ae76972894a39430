//! Inbound frame decoding.
//!
//! The data service does not tag its frames; the kind of a frame is implied
//! by which keys it carries. [`decode_frame`] turns that into the closed
//! [`StreamEvent`] union. A frame may carry several keys; each recognised
//! key yields its own event, always in this order:
//!
//! ```text
//! error, warning, ping, job_end, job+sinks, sink(points, eof), tick
//! ```
//!
//! A `ping` key is also reported through [`DecodedFrame::ping`] so the
//! caller can answer it before handling the rest of the frame.

use serde_json::{Map, Value};

use crate::job::JobInfo;
use crate::ProtoError;

/// Error string the service uses when an attach target is gone.
pub const NONEXISTENT_JOB: &str = "NONEXISTENT-JOB";

/// A single data point. Field set is program-defined.
pub type Point = Map<String, Value>;

/// Events produced while streaming a job, in receipt order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Job metadata, from submission or from the service on attach.
    JobStarted(JobInfo),
    /// Data points for one sink.
    Points {
        /// Sink channel.
        sink: String,
        /// Points in arrival order.
        points: Vec<Point>,
    },
    /// A sink reached end-of-stream.
    SinkEnd {
        /// Sink channel.
        sink: String,
    },
    /// Periodic no-op.
    Tick,
    /// Heartbeat request. Already answered by the reader when surfaced.
    Ping,
    /// Non-fatal diagnostic.
    Warning {
        /// Diagnostic payload (`message`, `info`).
        context: Value,
    },
    /// Fatal diagnostic for the run.
    Error {
        /// Diagnostic payload (`message`, `info`), or the raw error value.
        context: Value,
    },
    /// The job finished server-side.
    JobEnd,
}

impl StreamEvent {
    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JobStarted(_) => "job_started",
            Self::Points { .. } => "points",
            Self::SinkEnd { .. } => "sink_end",
            Self::Tick => "tick",
            Self::Ping => "ping",
            Self::Warning { .. } => "warning",
            Self::Error { .. } => "error",
            Self::JobEnd => "job_end",
        }
    }

    /// Whether a formatter should ever see this event.
    #[must_use]
    pub const fn is_keepalive(&self) -> bool {
        matches!(self, Self::Tick | Self::Ping)
    }
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFrame {
    /// Events carried by the frame. Empty for unrecognised frames.
    pub events: Vec<StreamEvent>,
    /// Frame carried a `ping` key and must be answered with a pong.
    pub ping: bool,
    /// Frame reported [`NONEXISTENT_JOB`].
    pub job_missing: bool,
}

impl DecodedFrame {
    /// Whether no known key was present.
    #[must_use]
    pub fn is_unrecognised(&self) -> bool {
        self.events.is_empty()
    }
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns an error if the text is not a JSON object or a recognised key
/// carries a value of the wrong shape.
pub fn decode_frame(text: &str) -> Result<DecodedFrame, ProtoError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(map) = value else {
        return Err(ProtoError::NotAnObject(truncate(text, 64)));
    };

    let ping = flag(&map, "ping");
    let job_missing = map.get("error").and_then(Value::as_str) == Some(NONEXISTENT_JOB);
    let events = classify(map)?;

    Ok(DecodedFrame {
        events,
        ping,
        job_missing,
    })
}

fn classify(mut map: Map<String, Value>) -> Result<Vec<StreamEvent>, ProtoError> {
    let mut events = Vec::new();

    if flag(&map, "error") {
        let context = diagnostic_context(&mut map, "error");
        events.push(StreamEvent::Error { context });
    }

    if flag(&map, "warning") {
        let context = diagnostic_context(&mut map, "warning");
        events.push(StreamEvent::Warning { context });
    }

    if flag(&map, "ping") {
        events.push(StreamEvent::Ping);
    }

    if flag(&map, "job_end") {
        events.push(StreamEvent::JobEnd);
    }

    if map.contains_key("job") && map.contains_key("sinks") {
        let info: JobInfo = serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| ProtoError::InvalidField {
                field: "job",
                reason: e.to_string(),
            })?;
        events.push(StreamEvent::JobStarted(info));
    }

    if let Some(sink) = map.get("sink") {
        let Value::String(sink) = sink else {
            return Err(ProtoError::InvalidField {
                field: "sink",
                reason: format!("expected a string, got {sink}"),
            });
        };
        let sink = sink.clone();

        if let Some(points) = map.remove("points") {
            let points: Vec<Point> =
                serde_json::from_value(points).map_err(|e| ProtoError::InvalidField {
                    field: "points",
                    reason: e.to_string(),
                })?;
            events.push(StreamEvent::Points {
                sink: sink.clone(),
                points,
            });
        }
        if flag(&map, "eof") {
            events.push(StreamEvent::SinkEnd { sink });
        }
    }

    if flag(&map, "tick") {
        events.push(StreamEvent::Tick);
    }

    Ok(events)
}

/// Key present with a value other than `false`/`null`.
fn flag(map: &Map<String, Value>, key: &str) -> bool {
    !matches!(map.get(key), None | Some(Value::Null | Value::Bool(false)))
}

/// `context` when the frame has one, otherwise the raw diagnostic value.
fn diagnostic_context(map: &mut Map<String, Value>, key: &str) -> Value {
    map.remove("context")
        .or_else(|| map.remove(key))
        .unwrap_or(Value::Null)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
