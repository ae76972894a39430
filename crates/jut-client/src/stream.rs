//! Job streaming over a data-service channel.
//!
//! A [`StreamReader`] owns one websocket for the duration of a job. It
//! answers heartbeats, refreshes the bearer token in-band, re-attaches to
//! the same job when the transport drops, and ends once the job and all of
//! its sinks are finished.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jut_client::{HttpJobs, StreamOptions, StreamReader, TokenManager};
//!
//! # async fn example(tokens: Arc<TokenManager>, jobs: HttpJobs) -> Result<(), jut_client::ClientError> {
//! let mut reader = StreamReader::run(
//!     tokens,
//!     &jobs,
//!     "https://data.example.com",
//!     "emit -limit 5",
//!     None,
//!     StreamOptions::default(),
//! )
//! .await?;
//!
//! while let Some(event) = reader.next_event().await? {
//!     println!("{}", event.kind());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use jut_proto::{decode_frame, ClientFrame, JobRequest, StreamEvent};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

use crate::channel::{read_text, send_frame, ChannelConnector, WsStream};
use crate::error::ClientError;
use crate::jobs::JobsApi;
use crate::progress::JobProgress;
use crate::reconnect::ReconnectPolicy;
use crate::state::StreamState;
use crate::token::TokenManager;

/// Longest silence tolerated on an established channel.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Knobs for a streaming session.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Stop after the job has started instead of streaming its output.
    /// Only meaningful for [`StreamReader::run`].
    pub persist: bool,
    /// Silence on the socket longer than this counts as a transport failure.
    pub read_timeout: Duration,
    /// Budget for re-attaching after a transport failure.
    pub reconnect: ReconnectPolicy,
    /// Socket and handshake settings.
    pub connector: ChannelConnector,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            persist: false,
            read_timeout: DEFAULT_READ_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            connector: ChannelConnector::default(),
        }
    }
}

impl StreamOptions {
    /// Set persist mode.
    #[must_use]
    pub const fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Set the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the channel connector.
    #[must_use]
    pub fn with_connector(mut self, connector: ChannelConnector) -> Self {
        self.connector = connector;
        self
    }
}

/// Pull-based reader of one job's events.
pub struct StreamReader {
    tokens: Arc<TokenManager>,
    data_url: String,
    job_id: Option<String>,
    ws: Option<WsStream>,
    pending: VecDeque<StreamEvent>,
    progress: JobProgress,
    options: StreamOptions,
    state: StreamState,
    finish_after_pending: bool,
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("data_url", &self.data_url)
            .field("job_id", &self.job_id)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl StreamReader {
    fn new(
        tokens: Arc<TokenManager>,
        data_url: String,
        job_id: Option<String>,
        options: StreamOptions,
    ) -> Self {
        Self {
            tokens,
            data_url,
            job_id,
            ws: None,
            pending: VecDeque::new(),
            progress: JobProgress::new(),
            options,
            state: StreamState::Connecting,
            finish_after_pending: false,
        }
    }

    /// Open a channel, submit `program` on it and stream its events.
    ///
    /// The first event is always [`StreamEvent::JobStarted`], or a single
    /// [`StreamEvent::Error`] carrying the service's answer when the program
    /// is refused.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be opened or the submission
    /// fails for a reason other than a refused program.
    pub async fn run(
        tokens: Arc<TokenManager>,
        jobs: &dyn JobsApi,
        data_url: impl Into<String>,
        program: impl Into<String>,
        alias: Option<String>,
        options: StreamOptions,
    ) -> Result<Self, ClientError> {
        let mut reader = Self::new(tokens, data_url.into(), None, options);

        let channel = reader
            .options
            .connector
            .connect(&reader.data_url, &reader.tokens, None)
            .await?;
        let (ws, channel_id) = channel.into_parts();
        reader.ws = Some(ws);

        let request = JobRequest {
            channel_id,
            alias,
            program: program.into(),
        };

        match jobs.submit(&reader.data_url, &request).await {
            Ok(info) => {
                reader.job_id = Some(info.job_id().to_string());
                let started = StreamEvent::JobStarted(info);
                reader.progress.observe(&started);
                reader.pending.push_back(started);
                reader.finish_after_pending = reader.options.persist;
            }
            Err(ClientError::JobSubmission { status, body }) => {
                debug!(status, "program refused");
                reader.pending.push_back(StreamEvent::Error { context: body });
                reader.finish_after_pending = true;
            }
            Err(e) => return Err(reader.fail(e).await),
        }

        reader.state = StreamState::Streaming;
        Ok(reader)
    }

    /// Attach to a job that is already running.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::JobNotFound`] if the service no longer knows
    /// the job, or the connection error.
    pub async fn attach(
        tokens: Arc<TokenManager>,
        data_url: impl Into<String>,
        job_id: impl Into<String>,
        options: StreamOptions,
    ) -> Result<Self, ClientError> {
        let job_id = job_id.into();
        let mut reader = Self::new(tokens, data_url.into(), Some(job_id.clone()), options);

        let channel = reader
            .options
            .connector
            .connect(&reader.data_url, &reader.tokens, Some(&job_id))
            .await?;
        info!(job_id = %job_id, channel_id = %channel.channel_id(), "attached to job");
        reader.ws = Some(channel.into_parts().0);
        reader.state = StreamState::Streaming;
        Ok(reader)
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> StreamState {
        self.state
    }

    /// Job being streamed, once known.
    #[must_use]
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Endpoint the job runs on.
    #[must_use]
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// Drain tracking so far.
    #[must_use]
    pub const fn progress(&self) -> &JobProgress {
        &self.progress
    }

    /// Next event, or `None` once the stream has ended.
    ///
    /// Pings are answered before the corresponding [`StreamEvent::Ping`] is
    /// returned. Transport failures are retried under the reconnect policy
    /// before they are surfaced.
    ///
    /// # Errors
    ///
    /// - [`ClientError::JobNotFound`] when the service drops the job
    /// - [`ClientError::Protocol`] for undecodable frames
    /// - [`ClientError::Transport`] once the reconnect budget is spent
    /// - [`ClientError::Authentication`] if an in-band refresh fails
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, ClientError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        if self.state.is_terminal() {
            return Ok(None);
        }
        if self.finish_after_pending {
            self.close().await;
            return Ok(None);
        }

        loop {
            let text = match self.receive_frame().await {
                Ok(text) => text,
                Err(e) if e.is_transport() => {
                    self.reconnect(e).await?;
                    continue;
                }
                Err(e) => return Err(self.fail(e).await),
            };

            let decoded = match decode_frame(&text) {
                Ok(decoded) => decoded,
                Err(e) => return Err(self.fail(e.into()).await),
            };

            if decoded.ping {
                if let Err(e) = self.send(&ClientFrame::pong()).await {
                    // the new connection is pinged again by the service
                    self.reconnect(e).await?;
                    continue;
                }
            }

            if decoded.job_missing {
                let job_id = self.job_id.clone().unwrap_or_default();
                return Err(self.fail(ClientError::JobNotFound(job_id)).await);
            }

            if decoded.is_unrecognised() {
                warn!(frame = %text, "skipping unrecognised frame");
                continue;
            }

            for event in &decoded.events {
                trace!(kind = event.kind(), "event");
                self.progress.observe(event);
            }
            if self.progress.is_drained() {
                debug!(job_id = ?self.job_id, "job drained");
                self.finish_after_pending = true;
            }

            self.pending.extend(decoded.events);
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
        }
    }

    /// Close the channel. Later calls to [`next_event`](Self::next_event)
    /// return `None`.
    pub async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            if let Err(e) = ws.close(None).await {
                debug!(error = %e, "error closing channel");
            }
        }
        if self.state != StreamState::Failed {
            self.state = StreamState::Ended;
        }
    }

    /// Adapt into a [`Stream`] of events.
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamEvent, ClientError>> {
        futures::stream::try_unfold(self, |mut reader| async move {
            let event = reader.next_event().await?;
            Ok::<_, ClientError>(event.map(|event| (event, reader)))
        })
    }

    async fn receive_frame(&mut self) -> Result<String, ClientError> {
        self.refresh_if_expired().await?;

        let read_timeout = self.options.read_timeout;
        let ws = self.socket()?;
        match timeout(read_timeout, read_text(ws)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Transport(format!(
                "no frame received for {}s",
                read_timeout.as_secs_f64()
            ))),
        }
    }

    async fn refresh_if_expired(&mut self) -> Result<(), ClientError> {
        if !self.tokens.is_expired() {
            return Ok(());
        }
        let credential = self.tokens.get_credential().await?;
        debug!("sending refreshed token on channel");
        self.send(&ClientFrame::refresh(credential.token())).await
    }

    async fn send(&mut self, frame: &ClientFrame) -> Result<(), ClientError> {
        let ws = self.socket()?;
        send_frame(ws, frame).await
    }

    fn socket(&mut self) -> Result<&mut WsStream, ClientError> {
        self.ws
            .as_mut()
            .ok_or_else(|| ClientError::Transport("channel not connected".into()))
    }

    async fn reconnect(&mut self, cause: ClientError) -> Result<(), ClientError> {
        let Some(job_id) = self.job_id.clone() else {
            return Err(self.fail(cause).await);
        };

        self.state = StreamState::Reconnecting;
        self.ws = None;
        warn!(job_id = %job_id, error = %cause, "channel lost, reconnecting");

        let policy = self.options.reconnect;
        let mut last = cause;
        let mut attempt = 1;
        while policy.allows(attempt) {
            let delay = policy.delay;
            warn!(
                attempt,
                max_attempts = policy.max_attempts,
                delay_secs = delay.as_secs_f64(),
                "reconnect attempt"
            );
            sleep(delay).await;

            match self
                .options
                .connector
                .connect(&self.data_url, &self.tokens, Some(&job_id))
                .await
            {
                Ok(channel) => {
                    info!(job_id = %job_id, channel_id = %channel.channel_id(), attempt, "reconnected");
                    self.ws = Some(channel.into_parts().0);
                    self.state = StreamState::Streaming;
                    return Ok(());
                }
                Err(e) if e.is_transport() => {
                    debug!(attempt, error = %e, "reconnect attempt failed");
                    last = e;
                }
                Err(e) => return Err(self.fail(e).await),
            }
            attempt += 1;
        }

        let exhausted = ClientError::Transport(format!(
            "gave up after {} reconnect attempts: {last}",
            policy.max_attempts
        ));
        Err(self.fail(exhausted).await)
    }

    async fn fail(&mut self, error: ClientError) -> ClientError {
        self.state = StreamState::Failed;
        self.close().await;
        error
    }
}
