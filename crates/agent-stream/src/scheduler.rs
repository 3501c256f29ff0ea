//! Strictly serialized rendering of decoded events.
//!
//! At most one typing task runs at a time. A caller that enqueues while a
//! task is running first waits on that task's completion signal; it is not
//! a buffered queue. Awaiting each `enqueue` before decoding the next record
//! is what gives the panel its total order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::event::{Event, Fragment, FragmentKind};
use crate::session::SessionId;
use crate::surface::Surface;

/// Lifecycle of the most recent typing task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// How an enqueued render ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Fully rendered.
    Completed,
    /// Stopped part way; characters already shown stay.
    Cancelled,
    /// A newer session has begun; nothing was rendered.
    Superseded,
}

/// Right to render into the panel on behalf of one session.
///
/// Issued by [`AnimationScheduler::begin`] and invalidated by the next call.
#[derive(Clone, Debug)]
pub struct SessionTicket {
    epoch: u64,
    session: SessionId,
}

impl SessionTicket {
    pub fn session(&self) -> &SessionId {
        &self.session
    }
}

enum Job {
    Animate(Fragment),
    Terminal,
    Failure(String),
    Notice(String),
}

impl From<Event> for Job {
    fn from(event: Event) -> Self {
        match event {
            Event::Fragment(fragment) => Job::Animate(fragment),
            Event::Done => Job::Terminal,
        }
    }
}

enum Claim {
    Busy(watch::Receiver<Option<Outcome>>),
    Started(TypingTask),
    Finished(Outcome),
}

struct ActiveTask {
    cancel: watch::Sender<bool>,
    done: watch::Receiver<Option<Outcome>>,
}

impl ActiveTask {
    fn outcome(&self) -> Option<Outcome> {
        *self.done.borrow()
    }
}

struct State {
    epoch: u64,
    next_task_id: u64,
    active: Option<ActiveTask>,
}

struct Shared {
    // lock order: state, then surface
    state: Mutex<State>,
    surface: Mutex<Box<dyn Surface>>,
    interval: Duration,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn surface(&self) -> MutexGuard<'_, Box<dyn Surface>> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owner of the output panel and of the single active typing task.
///
/// Cheap to clone; clones drive the same panel.
#[derive(Clone)]
pub struct AnimationScheduler {
    shared: Arc<Shared>,
}

impl AnimationScheduler {
    /// Creates a scheduler revealing one character per `interval`.
    pub fn new(surface: impl Surface + 'static, interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    epoch: 0,
                    next_task_id: 0,
                    active: None,
                }),
                surface: Mutex::new(Box::new(surface)),
                interval,
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Starts rendering for a new session.
    ///
    /// Cancels any running task, invalidates every earlier ticket and clears
    /// the panel. Once this returns, no character from an earlier session
    /// can reach the panel.
    pub fn begin(&self, session: SessionId) -> SessionTicket {
        let mut state = self.shared.state();
        state.epoch += 1;
        if let Some(active) = &state.active
            && active.outcome().is_none()
        {
            active.cancel.send_replace(true);
        }
        self.shared.surface().clear();
        debug!(session_id = %session, epoch = state.epoch, "render session started");
        SessionTicket {
            epoch: state.epoch,
            session,
        }
    }

    /// Cancels the running task, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        let state = self.shared.state();
        match &state.active {
            Some(active) if active.outcome().is_none() => {
                active.cancel.send_replace(true);
                true
            }
            _ => false,
        }
    }

    /// State of the most recently started task.
    pub fn state(&self) -> TaskState {
        let state = self.shared.state();
        match state.active.as_ref().map(ActiveTask::outcome) {
            None => TaskState::Idle,
            Some(None) => TaskState::Running,
            Some(Some(Outcome::Cancelled)) => TaskState::Cancelled,
            Some(Some(_)) => TaskState::Completed,
        }
    }

    /// Waits until no task is running.
    pub async fn wait_idle(&self) {
        let pending = {
            let state = self.shared.state();
            state.active.as_ref().map(|active| active.done.clone())
        };
        if let Some(done) = pending {
            wait_until_done(done).await;
        }
    }

    /// Renders one decoded event after any running task has finished.
    ///
    /// Fragments are revealed character by character and this resolves once
    /// the reveal ends. `Done` renders the completion notice immediately.
    pub async fn enqueue(&self, ticket: &SessionTicket, event: Event) -> Outcome {
        self.run_job(ticket, Job::from(event)).await
    }

    pub async fn render_fragment(
        &self,
        ticket: &SessionTicket,
        kind: FragmentKind,
        text: impl Into<String>,
    ) -> Outcome {
        self.run_job(ticket, Job::Animate(Fragment::new(kind, text)))
            .await
    }

    pub async fn render_terminal(&self, ticket: &SessionTicket) -> Outcome {
        self.run_job(ticket, Job::Terminal).await
    }

    /// Shows `message` as a labelled failure, without animation.
    pub async fn render_error(&self, ticket: &SessionTicket, message: impl Into<String>) -> Outcome {
        self.run_job(ticket, Job::Failure(message.into())).await
    }

    /// Shows a status line, without animation.
    pub async fn render_notice(&self, ticket: &SessionTicket, text: impl Into<String>) -> Outcome {
        self.run_job(ticket, Job::Notice(text.into())).await
    }

    async fn run_job(&self, ticket: &SessionTicket, job: Job) -> Outcome {
        loop {
            match self.try_claim(ticket, &job) {
                Claim::Busy(done) => wait_until_done(done).await,
                Claim::Started(task) => return task.run(&self.shared).await,
                Claim::Finished(outcome) => return outcome,
            }
        }
    }

    fn try_claim(&self, ticket: &SessionTicket, job: &Job) -> Claim {
        let mut state = self.shared.state();
        if state.epoch != ticket.epoch {
            return Claim::Finished(Outcome::Superseded);
        }
        let running = state
            .active
            .as_ref()
            .filter(|active| active.outcome().is_none())
            .map(|active| active.done.clone());
        if let Some(done) = running {
            return Claim::Busy(done);
        }

        let fragment = match job {
            Job::Animate(fragment) => fragment,
            Job::Terminal => {
                self.shared.surface().terminal();
                return Claim::Finished(Outcome::Completed);
            }
            Job::Failure(message) => {
                self.shared.surface().failure(message);
                return Claim::Finished(Outcome::Completed);
            }
            Job::Notice(text) => {
                self.shared.surface().notice(text);
                return Claim::Finished(Outcome::Completed);
            }
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(None);
        state.next_task_id += 1;
        state.active = Some(ActiveTask {
            cancel: cancel_tx,
            done: done_rx,
        });
        debug!(
            session_id = %ticket.session,
            task = state.next_task_id,
            kind = %fragment.kind,
            chars = fragment.text.chars().count(),
            "typing task started"
        );
        Claim::Started(TypingTask {
            id: state.next_task_id,
            kind: fragment.kind,
            chars: fragment.text.chars().collect(),
            index: 0,
            cancel: cancel_rx,
            done: done_tx,
        })
    }
}

impl std::fmt::Debug for AnimationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationScheduler")
            .field("interval", &self.shared.interval)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn wait_until_done(mut done: watch::Receiver<Option<Outcome>>) {
    while done.borrow_and_update().is_none() {
        if done.changed().await.is_err() {
            break;
        }
    }
}

/// One in-flight reveal. Only its own tick mutates it.
struct TypingTask {
    id: u64,
    kind: FragmentKind,
    chars: Vec<char>,
    index: usize,
    cancel: watch::Receiver<bool>,
    done: watch::Sender<Option<Outcome>>,
}

impl TypingTask {
    async fn run(mut self, shared: &Shared) -> Outcome {
        let kind = self.kind;
        if !self.write(shared, |surface| surface.begin_fragment(kind)) {
            return self.finish(Outcome::Cancelled);
        }
        while self.index < self.chars.len() {
            let cancelled = tokio::select! {
                biased;
                _ = self.cancel.changed() => true,
                () = tokio::time::sleep(shared.interval) => false,
            };
            if cancelled || !self.tick(shared) {
                return self.finish(Outcome::Cancelled);
            }
        }
        if !self.write(shared, |surface| surface.end_fragment()) {
            return self.finish(Outcome::Cancelled);
        }
        self.finish(Outcome::Completed)
    }

    /// Reveals the next character.
    fn tick(&mut self, shared: &Shared) -> bool {
        let ch = self.chars[self.index];
        let written = self.write(shared, |surface| {
            if ch == '\n' {
                surface.line_break();
            } else {
                surface.push_char(ch);
            }
        });
        if written {
            self.index += 1;
        }
        written
    }

    // The cancel flag is read under the surface lock, and `begin` raises it
    // before taking that lock to clear.
    fn write(&self, shared: &Shared, render: impl FnOnce(&mut dyn Surface)) -> bool {
        let mut surface = shared.surface();
        if *self.cancel.borrow() {
            return false;
        }
        render(&mut **surface);
        true
    }

    fn finish(self, outcome: Outcome) -> Outcome {
        debug!(task = self.id, revealed = self.index, ?outcome, "typing task finished");
        self.done.send_replace(Some(outcome));
        outcome
    }
}

impl Drop for TypingTask {
    fn drop(&mut self) {
        // a reveal abandoned mid-way (its future dropped) counts as cancelled
        if self.done.borrow().is_none() {
            self.done.send_replace(Some(Outcome::Cancelled));
        }
    }
}
