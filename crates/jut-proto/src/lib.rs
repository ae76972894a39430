//! # jut-proto
//!
//! Wire definitions for the Jut job-execution channel.
//!
//! The data service speaks JSON over a websocket, one object per frame.
//! Outbound frames are modelled by [`ClientFrame`]; inbound frames are
//! decoded by [`decode_frame`] into the closed [`StreamEvent`] union.
//!
//! ```text
//! ┌──────────┐  handshake / pong / accessToken   ┌──────────────┐
//! │ jut-cli  │──────────────────────────────────►│ data service │
//! │          │◄──────────────────────────────────│  (channel)   │
//! └──────────┘  channel_id, job frames, pings    └──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod frames;
pub mod job;

pub use error::ProtoError;
pub use events::{decode_frame, DecodedFrame, Point, StreamEvent, NONEXISTENT_JOB};
pub use frames::{parse_handshake_reply, ClientFrame, HandshakeReply};
pub use job::{JobInfo, JobMeta, JobRequest, JobSummary, SinkInfo};
