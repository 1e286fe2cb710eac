//! Per-operation busy flags with scoped release.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use tokio::sync::broadcast;

use crate::events::SessionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListDocuments,
    Upload,
    Delete,
    Ask,
    Summarize,
}

impl Operation {
    /// Fallback shown when a failure carries no structured message.
    pub fn failure_label(self) -> &'static str {
        match self {
            Self::ListDocuments => "Document list request failed",
            Self::Upload => "Upload failed",
            Self::Delete => "Delete failed",
            Self::Ask => "Chat request failed",
            Self::Summarize => "Summary request failed",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListDocuments => "list_documents",
            Self::Upload => "upload",
            Self::Delete => "delete",
            Self::Ask => "ask",
            Self::Summarize => "summarize",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity {
    pub uploading: bool,
    pub chatting: bool,
    pub summarizing: bool,
    pub deletes_in_flight: usize,
    pub refreshes_in_flight: usize,
}

impl Activity {
    pub fn deleting(&self) -> bool {
        self.deletes_in_flight > 0
    }

    pub fn refreshing(&self) -> bool {
        self.refreshes_in_flight > 0
    }

    pub fn is_busy(&self) -> bool {
        self.uploading || self.chatting || self.summarizing || self.deleting() || self.refreshing()
    }
}

pub struct BusyFlags {
    uploading: AtomicBool,
    chatting: AtomicBool,
    summarizing: AtomicBool,
    deletes_in_flight: AtomicUsize,
    refreshes_in_flight: AtomicUsize,
    events: broadcast::Sender<SessionEvent>,
}

impl BusyFlags {
    pub fn new(events: broadcast::Sender<SessionEvent>) -> Arc<Self> {
        Arc::new(Self {
            uploading: AtomicBool::new(false),
            chatting: AtomicBool::new(false),
            summarizing: AtomicBool::new(false),
            deletes_in_flight: AtomicUsize::new(0),
            refreshes_in_flight: AtomicUsize::new(0),
            events,
        })
    }

    fn exclusive_flag(&self, operation: Operation) -> Option<&AtomicBool> {
        match operation {
            Operation::Upload => Some(&self.uploading),
            Operation::Ask => Some(&self.chatting),
            Operation::Summarize => Some(&self.summarizing),
            Operation::ListDocuments | Operation::Delete => None,
        }
    }

    fn counter(&self, operation: Operation) -> Option<&AtomicUsize> {
        match operation {
            Operation::Delete => Some(&self.deletes_in_flight),
            Operation::ListDocuments => Some(&self.refreshes_in_flight),
            Operation::Upload | Operation::Ask | Operation::Summarize => None,
        }
    }

    /// Marks `operation` as in flight. Returns `None` when an exclusive
    /// operation is already running; counted operations always succeed.
    pub fn try_acquire(self: &Arc<Self>, operation: Operation) -> Option<BusyGuard> {
        if let Some(flag) = self.exclusive_flag(operation) {
            flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .ok()?;
        } else if let Some(counter) = self.counter(operation) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
        self.publish();
        Some(BusyGuard {
            flags: Arc::clone(self),
            operation,
        })
    }

    pub fn is_busy(&self, operation: Operation) -> bool {
        if let Some(flag) = self.exclusive_flag(operation) {
            flag.load(Ordering::Acquire)
        } else {
            self.counter(operation)
                .is_some_and(|counter| counter.load(Ordering::Acquire) > 0)
        }
    }

    pub fn snapshot(&self) -> Activity {
        Activity {
            uploading: self.uploading.load(Ordering::Acquire),
            chatting: self.chatting.load(Ordering::Acquire),
            summarizing: self.summarizing.load(Ordering::Acquire),
            deletes_in_flight: self.deletes_in_flight.load(Ordering::Acquire),
            refreshes_in_flight: self.refreshes_in_flight.load(Ordering::Acquire),
        }
    }

    fn release(&self, operation: Operation) {
        if let Some(flag) = self.exclusive_flag(operation) {
            flag.store(false, Ordering::Release);
        } else if let Some(counter) = self.counter(operation) {
            counter.fetch_sub(1, Ordering::AcqRel);
        }
        self.publish();
    }

    fn publish(&self) {
        let _ = self
            .events
            .send(SessionEvent::ActivityChanged(self.snapshot()));
    }
}

/// Clears its operation's flag when dropped, on every exit path.
#[must_use = "the busy flag is released as soon as the guard is dropped"]
pub struct BusyGuard {
    flags: Arc<BusyFlags>,
    operation: Operation,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flags.release(self.operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> Arc<BusyFlags> {
        let (events, _) = broadcast::channel(16);
        BusyFlags::new(events)
    }

    #[test]
    fn exclusive_operation_is_single_flight() {
        let flags = flags();
        let guard = flags.try_acquire(Operation::Ask).expect("first acquire");
        assert!(flags.is_busy(Operation::Ask));
        assert!(flags.try_acquire(Operation::Ask).is_none());

        drop(guard);
        assert!(!flags.is_busy(Operation::Ask));
        assert!(flags.try_acquire(Operation::Ask).is_some());
    }

    #[test]
    fn different_kinds_do_not_block_each_other() {
        let flags = flags();
        let _ask = flags.try_acquire(Operation::Ask).expect("ask");
        let _upload = flags.try_acquire(Operation::Upload).expect("upload");
        let _summary = flags.try_acquire(Operation::Summarize).expect("summary");

        let activity = flags.snapshot();
        assert!(activity.chatting && activity.uploading && activity.summarizing);
    }

    #[test]
    fn deletes_are_counted_not_gated() {
        let flags = flags();
        let first = flags.try_acquire(Operation::Delete).expect("first delete");
        let second = flags.try_acquire(Operation::Delete).expect("second delete");
        assert_eq!(flags.snapshot().deletes_in_flight, 2);

        drop(first);
        assert!(flags.snapshot().deleting());
        drop(second);
        assert!(!flags.snapshot().deleting());
        assert!(!flags.snapshot().is_busy());
    }

    #[test]
    fn acquire_and_release_publish_activity() {
        let (events, mut rx) = broadcast::channel(16);
        let flags = BusyFlags::new(events);

        let guard = flags.try_acquire(Operation::Upload).expect("upload");
        drop(guard);

        match rx.try_recv().expect("acquire event") {
            SessionEvent::ActivityChanged(activity) => assert!(activity.uploading),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.try_recv().expect("release event") {
            SessionEvent::ActivityChanged(activity) => assert!(!activity.uploading),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
