//! Renders an agent's server-sent event stream into a text panel.
//!
//! Each response fragment is revealed character by character, and no two
//! fragments ever animate at the same time:
//!
//! bytes -> [`FrameBuffer`] -> records -> [`decode`] -> [`Event`]s ->
//! [`AnimationScheduler`] -> [`Surface`]
//!
//! ```no_run
//! use agent_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = AgentClient::new(ClientConfig::from_env()?, TerminalSurface::stdout())?;
//! client.submit("What's the weather like today?").await?;
//! # Ok(())
//! # }
//! ```

/// Submission entry point.
pub mod client;
/// Client configuration.
pub mod config;
/// Stream driver: transport -> frames -> events -> scheduler.
pub mod driver;
/// Public error types.
pub mod errors;
/// Record payload decoding.
pub mod event;
/// Line reassembly and incremental UTF-8 decoding.
pub mod frame;
/// Diagnostic logging setup.
pub mod logging;
/// Common imports for typical usage.
pub mod prelude;
/// One-at-a-time typing animation.
pub mod scheduler;
/// Session identifiers.
pub mod session;
/// Render targets.
pub mod surface;
/// HTTP transport.
pub mod transport;

pub use client::AgentClient;
pub use config::ClientConfig;
pub use driver::{StreamDriver, StreamEnd, StreamSummary};
pub use errors::{ClientError, TransportError};
pub use event::{Event, Fragment, FragmentKind, decode};
pub use frame::{FrameBuffer, Split, append, flush};
pub use logging::{LogConfig, LogSink, init_logging};
pub use scheduler::{AnimationScheduler, Outcome, SessionTicket, TaskState};
pub use session::SessionId;
pub use surface::{RecordingSurface, Rendered, Surface, SurfaceOp, TerminalSurface};
pub use transport::{
    ByteStream, HistoryEntry, HttpTransport, InvokeReply, InvokeRequest, SessionHistory, Transport,
};
