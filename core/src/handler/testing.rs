//! In-memory source scripting used by the handler tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::{CommitError, FetchError};
use crate::source::{Source, SourceMessage};

pub(crate) enum SourceEvent {
    /// Deliver this message on the next fetch.
    Message(SourceMessage),
    /// Fail the next fetch with a transient error.
    Transient(&'static str),
    /// Make the next fetch hang for this long before consuming further
    /// events. Dropped if the engine abandons the fetch at its deadline.
    Idle(Duration),
    /// Report the source as permanently closed.
    Closed,
}

/// A source that replays a fixed script of fetch outcomes and records every
/// commit request. Once the script runs out it reports itself closed.
pub(crate) struct ScriptedSource {
    events: Mutex<VecDeque<SourceEvent>>,
    committed: Mutex<Vec<Vec<i64>>>,
    fail_commits: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn new(events: Vec<SourceEvent>) -> Self {
        Self {
            events: Mutex::new(events.into()),
            committed: Mutex::new(Vec::new()),
            fail_commits: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_next_commits(self, count: usize) -> Self {
        self.fail_commits.store(count, Ordering::SeqCst);
        self
    }

    /// Offsets of every commit request, in call order.
    pub(crate) fn committed(&self) -> Vec<Vec<i64>> {
        self.committed.lock().unwrap().clone()
    }
}

impl Source for ScriptedSource {
    async fn fetch(&self) -> Result<SourceMessage, FetchError> {
        loop {
            let event = self.events.lock().unwrap().pop_front();
            match event {
                Some(SourceEvent::Message(message)) => return Ok(message),
                Some(SourceEvent::Transient(reason)) => {
                    return Err(FetchError::Transient(reason.into()));
                }
                Some(SourceEvent::Idle(pause)) => tokio::time::sleep(pause).await,
                Some(SourceEvent::Closed) | None => return Err(FetchError::Closed),
            }
        }
    }

    async fn commit(&self, messages: &[SourceMessage]) -> Result<(), CommitError> {
        if self.fail_commits.load(Ordering::SeqCst) > 0 {
            self.fail_commits.fetch_sub(1, Ordering::SeqCst);
            return Err(CommitError("injected commit failure".into()));
        }
        self.committed
            .lock()
            .unwrap()
            .push(messages.iter().map(|m| m.offset).collect());
        Ok(())
    }
}

pub(crate) fn json_msg(offset: i64, payload: &str) -> SourceMessage {
    SourceMessage {
        topic: "orders".to_string(),
        partition: 0,
        offset,
        payload: payload.as_bytes().to_vec(),
    }
}
