//! Client for the Jut data service.
//!
//! This crate provides:
//! - Client-credentials authentication with a shared, self-refreshing token
//! - Deployment and juttle endpoint discovery
//! - Job submission, listing and termination over REST
//! - Job event streaming over a websocket channel, with heartbeats,
//!   in-band token refresh and transparent re-attach after transport loss

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod channel;
pub mod deployments;
pub mod error;
pub mod jobs;
pub mod progress;
pub mod reconnect;
pub mod session;
pub mod state;
pub mod stream;
pub mod token;

pub use auth::{AccessToken, AuthProvider, ClientCredentials};
pub use channel::{Channel, ChannelConnector, CHANNEL_PATH};
pub use deployments::{fetch_environment, Deployments, Environment};
pub use error::ClientError;
pub use jobs::{list_all, locate_job, HttpJobs, JobsApi};
pub use progress::JobProgress;
pub use reconnect::{ReconnectPolicy, RetryPolicy, RunRetry};
pub use session::Session;
pub use state::StreamState;
pub use stream::{StreamOptions, StreamReader, DEFAULT_READ_TIMEOUT};
pub use token::{Credential, TokenManager, ASSUMED_TOKEN_TTL};

pub use jut_proto as proto;
