//! The case-filing engine.
//!
//! [`BatchOrchestrator`] walks a batch's pending cases; [`FormDriver`]
//! pushes each through the portal wizard over a [`FormSurface`], adding
//! participants with [`ParticipantModal`] and documents with the
//! [`attachment`] step, then reads the confirmation token.

pub mod assembler;
pub mod attachment;
pub mod confirmation;
pub mod driver;
pub mod error;
pub mod modal;
pub mod orchestrator;
pub mod pacing;
pub mod scripted;
pub mod surface;

pub use assembler::{assemble, AssembledParticipants};
pub use driver::FormDriver;
pub use error::{FilingError, Stage, StageError};
pub use modal::ParticipantModal;
pub use orchestrator::{BatchError, BatchEvent, BatchOrchestrator, BatchReport};
pub use pacing::Throttle;
pub use scripted::ScriptedSurface;
pub use surface::{Control, Dialog, Element, Field, FormSurface, Location, SurfaceError, Target};
