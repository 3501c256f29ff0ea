//! Output surfaces the scheduler renders into.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use crate::event::FragmentKind;

/// Text shown once a response stream has completed.
pub const TERMINAL_NOTICE: &str = "✅ Interaction complete";

/// A scrolling text panel.
///
/// Only the scheduler writes to a surface, and always from a single task at
/// a time, so implementations need no internal ordering of their own.
pub trait Surface: Send {
    /// Empties the panel at the start of a new submission.
    fn clear(&mut self);
    /// Shows a status line (for example "requesting...").
    fn notice(&mut self, text: &str);
    /// Opens a labelled fragment; characters follow via [`Surface::push_char`].
    fn begin_fragment(&mut self, kind: FragmentKind);
    fn push_char(&mut self, ch: char);
    /// Rendered in place of a literal `\n` in fragment text.
    fn line_break(&mut self);
    fn end_fragment(&mut self);
    /// Shows the completion notice.
    fn terminal(&mut self);
    /// Shows a labelled error message.
    fn failure(&mut self, message: &str);
}

/// Renders to a terminal (or any writer), flushing after every character.
pub struct TerminalSurface<W: Write + Send> {
    out: W,
}

impl TerminalSurface<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    // A broken terminal must not take the stream down with it.
    fn write(&mut self, text: &str) {
        if let Err(err) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            tracing::warn!(error = %err, "failed to write to terminal");
        }
    }
}

impl<W: Write + Send> Surface for TerminalSurface<W> {
    fn clear(&mut self) {
        self.write("\n");
    }

    fn notice(&mut self, text: &str) {
        self.write(&format!("{text}\n"));
    }

    fn begin_fragment(&mut self, kind: FragmentKind) {
        self.write(&format!("{} ", kind.label()));
    }

    fn push_char(&mut self, ch: char) {
        let mut buf = [0u8; 4];
        self.write(ch.encode_utf8(&mut buf));
    }

    fn line_break(&mut self) {
        self.write("\n");
    }

    fn end_fragment(&mut self) {
        self.write("\n");
    }

    fn terminal(&mut self) {
        self.write(&format!("{TERMINAL_NOTICE}\n"));
    }

    fn failure(&mut self, message: &str) {
        self.write(&format!("❌ Interaction failed: {message}\n"));
    }
}

/// One call made on a [`RecordingSurface`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceOp {
    Clear,
    Notice(String),
    Begin(FragmentKind),
    Char(char),
    LineBreak,
    End,
    Terminal,
    Failure(String),
}

/// Item visible in a [`RecordingSurface`] after the latest clear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rendered {
    Notice(String),
    /// Fragment text with line breaks shown as `\n`; `complete` is false
    /// while (or if) the reveal never reached its end.
    Fragment {
        kind: FragmentKind,
        text: String,
        complete: bool,
    },
    Terminal,
    Failure(String),
}

/// In-memory surface that logs every call. Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    ops: Arc<Mutex<Vec<SurfaceOp>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, clears included.
    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// What the panel currently shows.
    pub fn rendered(&self) -> Vec<Rendered> {
        let ops = self.ops();
        let start = ops
            .iter()
            .rposition(|op| *op == SurfaceOp::Clear)
            .map_or(0, |idx| idx + 1);

        let mut out = Vec::new();
        for op in &ops[start..] {
            match op {
                SurfaceOp::Clear => {}
                SurfaceOp::Notice(text) => out.push(Rendered::Notice(text.clone())),
                SurfaceOp::Begin(kind) => out.push(Rendered::Fragment {
                    kind: *kind,
                    text: String::new(),
                    complete: false,
                }),
                SurfaceOp::Char(ch) => {
                    if let Some(Rendered::Fragment { text, .. }) = out.last_mut() {
                        text.push(*ch);
                    }
                }
                SurfaceOp::LineBreak => {
                    if let Some(Rendered::Fragment { text, .. }) = out.last_mut() {
                        text.push('\n');
                    }
                }
                SurfaceOp::End => {
                    if let Some(Rendered::Fragment { complete, .. }) = out.last_mut() {
                        *complete = true;
                    }
                }
                SurfaceOp::Terminal => out.push(Rendered::Terminal),
                SurfaceOp::Failure(message) => out.push(Rendered::Failure(message.clone())),
            }
        }
        out
    }

    fn record(&self, op: SurfaceOp) {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self) {
        self.record(SurfaceOp::Clear);
    }

    fn notice(&mut self, text: &str) {
        self.record(SurfaceOp::Notice(text.to_string()));
    }

    fn begin_fragment(&mut self, kind: FragmentKind) {
        self.record(SurfaceOp::Begin(kind));
    }

    fn push_char(&mut self, ch: char) {
        self.record(SurfaceOp::Char(ch));
    }

    fn line_break(&mut self) {
        self.record(SurfaceOp::LineBreak);
    }

    fn end_fragment(&mut self) {
        self.record(SurfaceOp::End);
    }

    fn terminal(&mut self) {
        self.record(SurfaceOp::Terminal);
    }

    fn failure(&mut self, message: &str) {
        self.record(SurfaceOp::Failure(message.to_string()));
    }
}
