//! Participant registry.
//!
//! Maps each reservable [`ResourceKind`] to the participant that owns it.
//! The registry is built explicitly and handed to the coordinator, so two
//! coordinators in one process never share participants by accident.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tandem_common::error::{TxnError, TxnResult};
use tandem_common::types::ResourceKind;
use tandem_rm::{Participant, ResourceManager};

/// The participants a coordinator can enlist, keyed by the kind they own.
#[derive(Clone, Default)]
pub struct ParticipantRegistry {
    participants: BTreeMap<ResourceKind, Arc<dyn Participant>>,
}

impl ParticipantRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with one in-process [`ResourceManager`] per reservable kind.
    pub fn in_process() -> Self {
        let mut registry = Self::new();
        for kind in ResourceKind::RESERVABLE {
            registry
                .participants
                .insert(kind, Arc::new(ResourceManager::new(kind)));
        }
        registry
    }

    /// Registers a participant under the kind it reports.
    ///
    /// Fails if the kind is not reservable or already has an owner.
    pub fn register(&mut self, participant: Arc<dyn Participant>) -> TxnResult<()> {
        let kind = participant.kind();
        if !kind.is_reservable() {
            return Err(TxnError::invalid_argument(format!(
                "participant '{}' claims non-reservable kind {kind}",
                participant.name()
            )));
        }
        if let Some(existing) = self.participants.get(&kind) {
            return Err(TxnError::invalid_argument(format!(
                "{kind} is already owned by '{}'",
                existing.name()
            )));
        }
        self.participants.insert(kind, participant);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, participant: Arc<dyn Participant>) -> TxnResult<Self> {
        self.register(participant)?;
        Ok(self)
    }

    /// Returns the participant owning `kind`.
    pub fn get(&self, kind: ResourceKind) -> TxnResult<Arc<dyn Participant>> {
        self.participants
            .get(&kind)
            .cloned()
            .ok_or(TxnError::ParticipantUnavailable { kind })
    }

    /// Returns the registered kinds in commit order.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.participants.keys().copied().collect()
    }

    /// Returns the number of registered participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns true if no participant is registered.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

impl fmt::Debug for ParticipantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: BTreeMap<ResourceKind, &str> = self
            .participants
            .iter()
            .map(|(kind, p)| (*kind, p.name()))
            .collect();
        f.debug_struct("ParticipantRegistry")
            .field("participants", &names)
            .finish()
    }
}
