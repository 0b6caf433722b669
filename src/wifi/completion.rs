//! Single-shot completion handles and the per-operation registry.
//!
//! Each asynchronous operation (`connect`, `disconnect`, `scan`) has one slot.
//! A slot holds the handle of the most recent caller until the operation
//! resolves; a newer caller replaces (and silently drops) the older handle.
//! Resolving takes the handle out of the slot and passes it to an
//! [`EventSink`], so the callback runs later on the dispatcher, never inside
//! the manager's lock.

use super::delivery::EventSink;
use super::types::ScanBatch;
use log::{debug, warn};
use std::fmt;

/// Asynchronous operation kinds that carry a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Connect,
    Disconnect,
    Scan,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [Self::Connect, Self::Disconnect, Self::Scan];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Scan => "scan",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result handed to a completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Networks(ScanBatch),
    Failed { reason: String },
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

type Callback = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// An owned, single-shot callback. Invoking consumes it.
#[derive(Default)]
pub struct CompletionHandle {
    callback: Option<Callback>,
}

impl CompletionHandle {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// A handle that accepts an outcome and does nothing.
    pub fn noop() -> Self {
        Self { callback: None }
    }

    pub fn is_noop(&self) -> bool {
        self.callback.is_none()
    }

    pub fn invoke(self, outcome: Outcome) {
        if let Some(callback) = self.callback {
            callback(outcome);
        }
    }
}

impl fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_noop() {
            "CompletionHandle(noop)"
        } else {
            "CompletionHandle(..)"
        })
    }
}

/// One optional handle per [`OperationKind`].
#[derive(Debug, Default)]
pub struct CompletionRegistry {
    connect: Option<CompletionHandle>,
    disconnect: Option<CompletionHandle>,
    scan: Option<CompletionHandle>,
}

impl CompletionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, kind: OperationKind) -> &mut Option<CompletionHandle> {
        match kind {
            OperationKind::Connect => &mut self.connect,
            OperationKind::Disconnect => &mut self.disconnect,
            OperationKind::Scan => &mut self.scan,
        }
    }

    /// Store `handle` as the pending completion for `kind`.
    ///
    /// A previous occupant is dropped without being invoked.
    pub fn begin(&mut self, kind: OperationKind, handle: CompletionHandle) {
        if let Some(previous) = self.slot(kind).replace(handle) {
            if !previous.is_noop() {
                warn!("Pending {} superseded; dropping previous callback", kind);
            }
        }
    }

    /// Take the pending handle for `kind` and queue it with `outcome`.
    ///
    /// Returns false (and queues nothing) if no operation of that kind is
    /// pending.
    pub fn resolve<S>(&mut self, kind: OperationKind, outcome: Outcome, sink: &S) -> bool
    where
        S: EventSink + ?Sized,
    {
        match self.slot(kind).take() {
            Some(handle) => {
                debug!("Resolving {}: {:?}", kind, outcome);
                sink.enqueue(handle, outcome);
                true
            }
            None => false,
        }
    }

    /// Release the pending handle for `kind` without invoking it.
    pub fn cancel(&mut self, kind: OperationKind) -> bool {
        self.slot(kind).take().is_some()
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Connect => self.connect.is_some(),
            OperationKind::Disconnect => self.disconnect.is_some(),
            OperationKind::Scan => self.scan.is_some(),
        }
    }

    pub fn pending_kinds(&self) -> Vec<OperationKind> {
        OperationKind::ALL
            .into_iter()
            .filter(|kind| self.is_pending(*kind))
            .collect()
    }
}
