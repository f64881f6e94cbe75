use backup_core::{Representation, Termination};

/// Notable steps of a run, for console output and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupEvent {
    ItemDiscovered {
        question: String,
        url: String,
    },
    PassCompleted {
        new_items: usize,
        retries: u32,
    },
    ExtractionFinished {
        termination: Termination,
        new_items: usize,
    },
    ContentSaved {
        question: String,
        representations: Vec<Representation>,
    },
    ContentSkipped {
        question: String,
        reason: SkipReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The answer page has no content container at the expected position.
    ContainerMissing,
    /// The container exists but holds no child elements.
    EmptyContainer,
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: BackupEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: BackupEvent) {}
}
