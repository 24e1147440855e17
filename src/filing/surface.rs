//! The seam between the filing engine and whatever drives the portal.
//!
//! The wizard and the participant dialog only speak in terms of the closed
//! target enums below; mapping them to concrete page elements is left to
//! the surface implementation.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

/// Interval between visibility checks while waiting.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A driven-system primitive failed.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Element not found: {0}")]
    NotFound(String),
    #[error("Option '{value}' is not available in {field}")]
    OptionUnavailable { field: String, value: String },
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Script failed: {0}")]
    Script(String),
    #[error("Browser error: {0}")]
    Browser(String),
}

/// Pages the engine navigates to directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Portal root, opened once per session.
    Portal,
    /// Service listing the engine returns to between cases.
    Landing,
}

/// Inputs: selects, text boxes and text areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    LitigationKind,
    InstanceLevel,
    DocumentType,
    ProceedingType,
    CaseCategory,
    ClaimNature,
    Region,
    Court,
    ParticipantKind,
    ParticipantSide,
    OrganizationBin,
    FactAddress,
    BankDetails,
    PersonIin,
    Phone,
    Email,
    ClaimCategory,
    ClaimAmount,
    StateDuty,
    /// N-th free text area on the claim page.
    TextArea(usize),
}

/// Buttons, links and toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    FilingEntry,
    SubmitFilingKind,
    AddParticipant,
    SideSelectProceed,
    JuridicalLookup,
    JuridicalSave,
    PhysicalLookup,
    PhysicalSave,
    /// The wizard's "next" button.
    Proceed,
    OnlinePayment,
    AttachFile,
    UploadClaim,
}

/// Sub-dialogs of the participant flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialog {
    SideSelect,
    Juridical,
    Physical,
}

/// Read-only page elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    /// Escaped XML document shown for signing after submission.
    ConfirmationPayload,
}

/// Anything whose visibility can be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Field(Field),
    Control(Control),
    Dialog(Dialog),
    Element(Element),
}

impl From<Field> for Target {
    fn from(field: Field) -> Self {
        Target::Field(field)
    }
}

impl From<Control> for Target {
    fn from(control: Control) -> Self {
        Target::Control(control)
    }
}

impl From<Dialog> for Target {
    fn from(dialog: Dialog) -> Self {
        Target::Dialog(dialog)
    }
}

impl From<Element> for Target {
    fn from(element: Element) -> Self {
        Target::Element(element)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::TextArea(n) => write!(f, "text area #{}", n + 1),
            other => write!(f, "{:?}", other),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Field(field) => write!(f, "field {}", field),
            Target::Control(control) => write!(f, "control {:?}", control),
            Target::Dialog(dialog) => write!(f, "dialog {:?}", dialog),
            Target::Element(element) => write!(f, "element {:?}", element),
        }
    }
}

/// Interaction primitives over the portal.
///
/// `&mut self` everywhere: one surface is one exclusive session and must
/// never be driven from two places at once.
#[async_trait]
pub trait FormSurface: Send {
    /// Navigate to a location.
    async fn open(&mut self, location: Location) -> Result<(), SurfaceError>;

    /// Wait until the current document has loaded. Timing out is not an error.
    async fn wait_page_ready(&mut self, timeout: Duration) -> Result<(), SurfaceError>;

    async fn select_option(&mut self, field: Field, value: &str) -> Result<(), SurfaceError>;

    /// Replace the field's content in one step.
    async fn fill(&mut self, field: Field, value: &str) -> Result<(), SurfaceError>;

    async fn clear(&mut self, field: Field) -> Result<(), SurfaceError>;

    /// Type character by character with `delay` between keystrokes.
    async fn type_paced(
        &mut self,
        field: Field,
        value: &str,
        delay: Duration,
    ) -> Result<(), SurfaceError>;

    async fn click(&mut self, control: Control) -> Result<(), SurfaceError>;

    /// Dispatch a click even if the control is hidden or covered.
    async fn force_click(&mut self, control: Control) -> Result<(), SurfaceError>;

    /// Move focus back to the document body.
    async fn focus_page(&mut self) -> Result<(), SurfaceError>;

    async fn is_checked(&mut self, control: Control) -> Result<bool, SurfaceError>;

    async fn is_visible(&mut self, target: Target) -> Result<bool, SurfaceError>;

    /// Wait for the global loading indicator to clear; `false` on timeout.
    async fn wait_loading_cleared(&mut self, timeout: Duration) -> Result<bool, SurfaceError>;

    /// Wait for the portal's ajax status to report idle; `false` on timeout.
    async fn wait_ajax_settled(&mut self, timeout: Duration) -> Result<bool, SurfaceError>;

    /// Number of elements of the field's kind. Indices are ignored, so
    /// `count(Field::TextArea(0))` counts all text areas.
    async fn count(&mut self, field: Field) -> Result<usize, SurfaceError>;

    /// Attach local files through the file chooser behind `control`.
    async fn upload_files(&mut self, control: Control, files: &[PathBuf])
        -> Result<(), SurfaceError>;

    /// Value of a read-only element; `None` if it is not on the page.
    async fn read_value(&mut self, element: Element) -> Result<Option<String>, SurfaceError>;

    /// Poll `is_visible` until it holds or `timeout` elapses.
    async fn wait_visible(&mut self, target: Target, timeout: Duration) -> Result<bool, SurfaceError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(target).await? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}
