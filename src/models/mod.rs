//! Data models for courtfile.

mod batch;
mod case;
mod participant;

pub use batch::{BatchId, ProgressSnapshot};
pub use case::{blank_to_none, Case, CaseDraft, DocumentPaths, PartyFields};
pub use participant::{Participant, ParticipantRole, PartyKind};
