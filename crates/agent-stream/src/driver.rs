use std::sync::Arc;

use futures::StreamExt as _;
use tracing::{debug, trace};

use crate::errors::TransportError;
use crate::event::{self, Event};
use crate::frame::FrameBuffer;
use crate::scheduler::{AnimationScheduler, Outcome, SessionTicket};
use crate::transport::{InvokeRequest, Transport};

/// Why a driven stream stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEnd {
    /// The `[DONE]` marker arrived and the completion notice was shown.
    Done,
    /// The transport closed without a `[DONE]` marker.
    Closed,
    /// A newer session took over the panel.
    Superseded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamSummary {
    /// Fragments handed to the scheduler.
    pub fragments: usize,
    pub end: StreamEnd,
}

/// Pipes one response stream through frame buffer, decoder and scheduler.
#[derive(Clone)]
pub struct StreamDriver {
    transport: Arc<dyn Transport>,
    scheduler: AnimationScheduler,
}

impl StreamDriver {
    pub fn new(transport: Arc<dyn Transport>, scheduler: AnimationScheduler) -> Self {
        Self {
            transport,
            scheduler,
        }
    }

    /// Requests a stream for `query` and renders it under `ticket`.
    ///
    /// Only transport failures are returned; undecodable records are
    /// rendered inline as error fragments and the stream goes on.
    pub async fn run(
        &self,
        ticket: &SessionTicket,
        query: &str,
    ) -> Result<StreamSummary, TransportError> {
        let request = InvokeRequest::streaming(ticket.session().clone(), query);
        let mut body = self.transport.open_stream(&request).await?;
        let mut frames = FrameBuffer::default();
        let mut fragments = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            trace!(bytes = chunk.len(), "stream chunk");
            let records = frames.push_chunk(&chunk);
            if let Some(end) = self.render(ticket, records, &mut fragments).await {
                return Ok(StreamSummary { fragments, end });
            }
        }

        let records = frames.finish();
        if !records.is_empty() {
            debug!(records = records.len(), "flushing trailing records");
        }
        let end = self
            .render(ticket, records, &mut fragments)
            .await
            .unwrap_or(StreamEnd::Closed);
        Ok(StreamSummary { fragments, end })
    }

    async fn render(
        &self,
        ticket: &SessionTicket,
        records: Vec<String>,
        fragments: &mut usize,
    ) -> Option<StreamEnd> {
        for record in records {
            let event = event::decode(&record);
            let done = event == Event::Done;
            if !done {
                *fragments += 1;
            }
            match self.scheduler.enqueue(ticket, event).await {
                Outcome::Superseded => return Some(StreamEnd::Superseded),
                Outcome::Completed | Outcome::Cancelled if done => return Some(StreamEnd::Done),
                Outcome::Completed | Outcome::Cancelled => {}
            }
        }
        None
    }
}
