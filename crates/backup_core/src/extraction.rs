use std::collections::HashSet;
use std::fmt;

/// Why the extraction loop stopped. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The requested number of new items was collected.
    TargetReached,
    /// Scrolling no longer grows the page.
    ExhaustedFeed,
    /// The page kept growing but passes stopped yielding examinable items.
    MaxRetriesExceeded,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::TargetReached => write!(f, "target reached"),
            Termination::ExhaustedFeed => write!(f, "no more content to load"),
            Termination::MaxRetriesExceeded => write!(f, "maximum number of retries exceeded"),
        }
    }
}

/// Snapshot taken at the start of a pass, used to detect a pass without progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassMark {
    checked_before: usize,
}

/// Counters and dedup set of the incremental extraction loop.
///
/// The driver asks [`should_continue`](Self::should_continue) before each pass,
/// reports every examined title, and finally reports the scroll extent before
/// and after scrolling.
#[derive(Debug, Clone)]
pub struct ExtractionState {
    target: usize,
    max_retries: u32,
    retries: u32,
    new_items: usize,
    checked_items: usize,
    known: HashSet<String>,
    stopped: Option<Termination>,
}

impl ExtractionState {
    pub fn new<I, Q>(target: usize, max_retries: u32, known: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<String>,
    {
        Self {
            target,
            max_retries,
            retries: 0,
            new_items: 0,
            checked_items: 0,
            known: known.into_iter().map(Into::into).collect(),
            stopped: None,
        }
    }

    pub fn should_continue(&self) -> bool {
        self.stopped.is_none() && self.new_items < self.target && self.retries < self.max_retries
    }

    pub fn target_reached(&self) -> bool {
        self.new_items >= self.target
    }

    pub fn begin_pass(&self) -> PassMark {
        PassMark {
            checked_before: self.checked_items,
        }
    }

    pub fn is_known(&self, question: &str) -> bool {
        self.known.contains(question)
    }

    /// A previously known title was seen again in this pass.
    pub fn record_known(&mut self) {
        self.checked_items += 1;
    }

    /// A new title was extracted. Returns `false` (and changes nothing) if the
    /// question was already known.
    pub fn record_new(&mut self, question: impl Into<String>) -> bool {
        if !self.known.insert(question.into()) {
            return false;
        }
        self.new_items += 1;
        self.checked_items += 1;
        true
    }

    /// Report the page extent around a scroll. Returns the termination when the
    /// feed is exhausted; otherwise updates the retry counter.
    pub fn record_scroll(&mut self, mark: PassMark, before: u64, after: u64) -> Option<Termination> {
        if before == after {
            self.stopped = Some(Termination::ExhaustedFeed);
            return self.stopped;
        }
        if self.target > 0 && self.checked_items == mark.checked_before {
            self.retries += 1;
        }
        None
    }

    /// Final state, meaningful once [`should_continue`](Self::should_continue)
    /// returns `false`.
    pub fn termination(&self) -> Termination {
        match self.stopped {
            Some(termination) => termination,
            None if self.target_reached() => Termination::TargetReached,
            None => Termination::MaxRetriesExceeded,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn new_items(&self) -> usize {
        self.new_items
    }

    pub fn checked_items(&self) -> usize {
        self.checked_items
    }

    pub fn target(&self) -> usize {
        self.target
    }
}
