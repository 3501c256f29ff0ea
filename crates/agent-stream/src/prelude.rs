//! Common imports for typical usage.
pub use crate::{
    AgentClient, AnimationScheduler, ClientConfig, ClientError, Event, FragmentKind,
    HttpTransport, LogConfig, Outcome, RecordingSurface, SessionId, Surface, TaskState, TerminalSurface,
    Transport, TransportError,
};
