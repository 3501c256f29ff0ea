use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

static LAST_ISSUED_MS: AtomicI64 = AtomicI64::new(0);

/// Identifier correlating one submission with its response stream.
///
/// Derived from the submission time in milliseconds. Two submissions in the
/// same millisecond are bumped apart, so ids are unique and increasing for
/// the life of the process.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Issues a fresh id for a submission made now.
    pub fn generate(prefix: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = LAST_ISSUED_MS.load(Ordering::Relaxed);
        let stamp = loop {
            let next = now.max(last + 1);
            match LAST_ISSUED_MS.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break next,
                Err(actual) => last = actual,
            }
        };
        Self(format!("{prefix}_{stamp}"))
    }

    /// Wraps an id handed out elsewhere (for example by a previous run).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
