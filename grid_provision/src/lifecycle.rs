use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt;

/// The next action the explorer will take for a reservation or workload.
///
/// The state is owned by the explorer. It is never advanced locally, a client only reads it to
/// decide which requests still make sense.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
pub enum NextAction {
    /// The reservation is being created.
    #[default]
    Create = 0,
    /// Waiting for the required provisioning signatures.
    Sign = 1,
    /// Waiting for the escrow to be funded.
    Pay = 2,
    /// Ready to be deployed by the nodes.
    Deploy = 3,
    /// Marked for deletion, waiting for the nodes to clean up.
    Delete = 4,
    /// The reservation can't be deployed.
    Invalid = 5,
    /// Every workload of the reservation has been removed.
    Deleted = 6,
    /// The reservation was moved to a newer explorer model.
    Migrated = 7,
}

impl NextAction {
    /// Check if the reservation reached a state it never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NextAction::Invalid | NextAction::Deleted | NextAction::Migrated
        )
    }

    /// Check if a deletion request changes anything for a reservation in this state. Terminal
    /// states have nothing left to delete. A reservation in the `Delete` state still accepts
    /// signatures, as the quorum might not be complete yet.
    pub fn accepts_delete(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for NextAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            NextAction::Create => "create",
            NextAction::Sign => "sign",
            NextAction::Pay => "pay",
            NextAction::Deploy => "deploy",
            NextAction::Delete => "delete",
            NextAction::Invalid => "invalid",
            NextAction::Deleted => "deleted",
            NextAction::Migrated => "migrated",
        })
    }
}
