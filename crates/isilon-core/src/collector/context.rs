use std::collections::HashSet;
use std::sync::Mutex;

use tokio::time::Instant;

use super::CollectError;
use super::protocol::ProtocolFamily;

/// State scoped to one collection pass, shared by every collector in it.
///
/// A fresh context is built for each pass, so the protocol-family gate
/// starts empty every time.
#[derive(Debug)]
pub struct PassContext {
    deadline: Option<Instant>,
    started_at: i64,
    gathered_families: Mutex<HashSet<ProtocolFamily>>,
}

impl PassContext {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self {
            deadline,
            started_at: chrono::Utc::now().timestamp(),
            gathered_families: Mutex::new(HashSet::new()),
        }
    }

    /// Overrides the pass start time (unix seconds).
    pub fn with_start_time(mut self, started_at: i64) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Pass start time in unix seconds; snapshot ages are measured against it.
    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    /// Fails once the pass deadline has passed.
    pub fn check_deadline(&self) -> Result<(), CollectError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CollectError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Returns true for the first claim of `family` in this pass, false afterwards.
    pub fn claim_family(&self, family: ProtocolFamily) -> bool {
        let mut gathered = self
            .gathered_families
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        gathered.insert(family)
    }
}
