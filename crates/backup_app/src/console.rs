use backup_engine::{BackupEvent, ProgressSink, SkipReason};

/// Prints run progress to stdout when console output is enabled.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    enabled: bool,
}

impl ConsoleSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&self, event: BackupEvent) {
        if !self.enabled {
            return;
        }
        if let Some(line) = describe(&event) {
            println!("{line}");
        }
    }
}

fn describe(event: &BackupEvent) -> Option<String> {
    match event {
        BackupEvent::ItemDiscovered { question, url } => Some(format!("{question}\n  {url}")),
        BackupEvent::PassCompleted { .. } => None,
        BackupEvent::ExtractionFinished {
            termination,
            new_items,
        } => Some(format!("{new_items} new answer(s), {termination}")),
        BackupEvent::ContentSaved {
            question,
            representations,
        } => {
            let kinds: Vec<String> = representations.iter().map(ToString::to_string).collect();
            Some(format!("Saved {question} ({})", kinds.join(", ")))
        }
        BackupEvent::ContentSkipped { question, reason } => {
            let why = match reason {
                SkipReason::ContainerMissing => "no answer content found",
                SkipReason::EmptyContainer => "answer content is empty",
            };
            Some(format!("Skipped {question}: {why}"))
        }
    }
}
