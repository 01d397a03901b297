//! Active speaker tracking

use std::collections::HashSet;

use crate::types::ParticipantId;

/// Folds the transport's periodic activity reports into a stable
/// speaking flag per participant.
///
/// Each report is a full snapshot of who is audible right now: presence
/// means speaking, absence means not speaking as of that report. No
/// smoothing happens here; the report cadence is transport
/// configuration.
#[derive(Debug, Default)]
pub(crate) struct SpeakerMonitor {
    speaking: HashSet<ParticipantId>,
}

impl SpeakerMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one activity report. Returns true when the speaking set
    /// changed, i.e. when an event is worth emitting.
    pub fn apply(&mut self, report: Vec<ParticipantId>) -> bool {
        let next: HashSet<ParticipantId> = report.into_iter().collect();
        if next == self.speaking {
            return false;
        }
        self.speaking = next;
        true
    }

    pub fn is_speaking(&self, id: &ParticipantId) -> bool {
        self.speaking.contains(id)
    }

    /// Current speakers, ordered by id for stable output
    pub fn speaking(&self) -> Vec<ParticipantId> {
        let mut all: Vec<ParticipantId> = self.speaking.iter().cloned().collect();
        all.sort();
        all
    }

    /// Drop a participant who left. Returns true when they were speaking.
    pub fn forget(&mut self, id: &ParticipantId) -> bool {
        self.speaking.remove(id)
    }

    pub fn clear(&mut self) {
        self.speaking.clear();
    }
}
