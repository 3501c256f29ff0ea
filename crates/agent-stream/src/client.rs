use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::driver::{StreamDriver, StreamEnd};
use crate::errors::ClientError;
use crate::scheduler::AnimationScheduler;
use crate::session::SessionId;
use crate::surface::Surface;
use crate::transport::{HttpTransport, Transport};

/// Status line shown while the request is in flight.
pub const REQUESTING_NOTICE: &str = "Requesting agent service...";

/// Entry point for the input glue: one `submit` per query.
///
/// Clones share the panel, so a submission from any clone supersedes the
/// one in progress.
#[derive(Clone)]
pub struct AgentClient {
    config: ClientConfig,
    scheduler: AnimationScheduler,
    driver: StreamDriver,
    last_session: Arc<Mutex<Option<SessionId>>>,
}

impl AgentClient {
    /// Creates a client talking HTTP to `config.base_url`.
    pub fn new(config: ClientConfig, surface: impl Surface + 'static) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config.clone())?;
        Self::with_transport(config, Arc::new(transport), surface)
    }

    /// Creates a client over any transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        surface: impl Surface + 'static,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let scheduler = AnimationScheduler::new(surface, config.typing_interval);
        let driver = StreamDriver::new(transport, scheduler.clone());
        Ok(Self {
            config,
            scheduler,
            driver,
            last_session: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &AnimationScheduler {
        &self.scheduler
    }

    /// Session id of the most recent submission.
    pub fn last_session(&self) -> Option<SessionId> {
        self.last_session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Submits `query` and renders the agent's response stream.
    ///
    /// Any animation left over from an earlier submission is cancelled and
    /// the panel cleared before the request goes out. A transport failure is
    /// rendered as an error line and also returned.
    pub async fn submit(&self, query: &str) -> Result<(), ClientError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ClientError::Validation("query must not be empty".into()));
        }

        let session = SessionId::generate(&self.config.session_prefix);
        *self
            .last_session
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        let ticket = self.scheduler.begin(session);
        self.scheduler
            .render_notice(&ticket, REQUESTING_NOTICE)
            .await;
        info!(session_id = %ticket.session(), chars = query.chars().count(), "query submitted");

        match self.driver.run(&ticket, query).await {
            Ok(summary) => {
                if summary.end == StreamEnd::Superseded {
                    info!(session_id = %ticket.session(), "submission superseded");
                } else {
                    info!(
                        session_id = %ticket.session(),
                        fragments = summary.fragments,
                        end = ?summary.end,
                        "stream finished"
                    );
                }
                Ok(())
            }
            Err(err) => {
                warn!(session_id = %ticket.session(), status = ?err.status(), error = %err, "stream failed");
                self.scheduler.render_error(&ticket, err.to_string()).await;
                Err(err.into())
            }
        }
    }
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
