//! Participant and publication bookkeeping

use std::collections::HashMap;

use tracing::debug;

use crate::types::{Participant, ParticipantId, TrackPublication, TrackSource};

/// What an upsert did
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PublicationUpsert {
    /// New publication for this (participant, source)
    Inserted,
    /// Same key existed; the handle or enabled flag changed
    Updated,
    /// Duplicate of what we already hold
    Unchanged,
    /// The participant is not in the session; nothing was stored
    UnknownParticipant,
}

/// Authoritative view of who is in the session and what they publish.
///
/// Owned by the session task; all mutation happens there, so plain maps
/// suffice. `leave` removes a participant and every publication of
/// theirs in one call, which is what keeps snapshots free of orphaned
/// publications.
#[derive(Debug, Default)]
pub(crate) struct ParticipantRegistry {
    participants: HashMap<ParticipantId, Participant>,
    publications: HashMap<(ParticipantId, TrackSource), TrackPublication>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant. Returns false when already present; a repeat
    /// join is a no-op, not an error.
    pub fn join(&mut self, participant: Participant) -> bool {
        if self.participants.contains_key(&participant.id) {
            debug!("repeat join for {} ignored", participant.id);
            return false;
        }
        self.participants.insert(participant.id.clone(), participant);
        true
    }

    /// Remove a participant and all their publications in one step.
    /// Returns what was removed so callers can emit matching events.
    pub fn leave(
        &mut self,
        id: &ParticipantId,
    ) -> Option<(Participant, Vec<TrackPublication>)> {
        let participant = self.participants.remove(id)?;
        let mut removed: Vec<TrackPublication> = Vec::new();
        self.publications.retain(|(owner, _), publication| {
            if owner == id {
                removed.push(publication.clone());
                false
            } else {
                true
            }
        });
        removed.sort_by_key(|p| p.source);
        Some((participant, removed))
    }

    /// Insert or refresh a publication. Rejected when the participant is
    /// unknown, so a publication can never outlive (or predate) its
    /// owner in this registry.
    pub fn upsert_publication(&mut self, publication: TrackPublication) -> PublicationUpsert {
        if !self.participants.contains_key(&publication.participant_id) {
            return PublicationUpsert::UnknownParticipant;
        }
        let key = (publication.participant_id.clone(), publication.source);
        match self.publications.insert(key, publication.clone()) {
            None => PublicationUpsert::Inserted,
            Some(previous) if previous == publication => PublicationUpsert::Unchanged,
            Some(_) => PublicationUpsert::Updated,
        }
    }

    /// Drop one publication. None when there was nothing to drop.
    pub fn remove_publication(
        &mut self,
        id: &ParticipantId,
        source: TrackSource,
    ) -> Option<TrackPublication> {
        self.publications.remove(&(id.clone(), source))
    }

    /// All participants, ordered by id for stable output
    pub fn participants(&self) -> Vec<Participant> {
        let mut all: Vec<Participant> = self.participants.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// All publications, ordered by (participant, source)
    pub fn publications(&self) -> Vec<TrackPublication> {
        let mut all: Vec<TrackPublication> = self.publications.values().cloned().collect();
        all.sort_by(|a, b| {
            (&a.participant_id, a.source).cmp(&(&b.participant_id, b.source))
        });
        all
    }

    pub fn clear(&mut self) {
        self.participants.clear();
        self.publications.clear();
    }
}
