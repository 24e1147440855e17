//! In-memory form surface.
//!
//! Models just enough of the portal to walk the whole wizard: dialogs open
//! and close in response to clicks, the court selector appears after a
//! region is chosen, and confirmation payloads are served from a queue.
//! Faults can be scripted in to exercise the retry paths. Every primitive
//! call is recorded.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use super::surface::{
    Control, Dialog, Element, Field, FormSurface, Location, SurfaceError, Target,
};

/// One recorded primitive call.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Open(Location),
    WaitPageReady,
    Select(Field, String),
    Fill(Field, String),
    Clear(Field),
    Type(Field, String),
    Click(Control),
    ForceClick(Control),
    FocusPage,
    Upload(Control, Vec<PathBuf>),
    Read(Element),
}

/// How the add-participant button behaves when checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonVisibility {
    #[default]
    Visible,
    /// Hidden until the page body has been focused.
    AfterFocus,
    /// Never visible; only a forced click reaches it.
    Hidden,
}

type CaseStartHook = Box<dyn FnMut(usize) + Send>;

/// Scriptable stand-in for the portal.
pub struct ScriptedSurface {
    log: Vec<Interaction>,
    open_dialog: Option<Dialog>,
    dialog_checks: usize,
    participant_kind: Option<String>,
    court_visible: bool,
    page_focused: bool,
    checked: HashSet<Control>,
    saved_participants: usize,
    portal_opens: usize,
    cases_started: usize,

    text_areas: usize,
    add_button: ButtonVisibility,
    court_hidden_selections: u32,
    select_failures: HashMap<Field, u32>,
    side_select_misses: u32,
    dialog_drops: VecDeque<(Dialog, usize)>,
    phone_field_ready: bool,
    loader_stuck: bool,
    landing_ready: bool,
    payloads: VecDeque<Option<String>>,
    auto_token_prefix: Option<String>,
    on_case_start: Option<CaseStartHook>,
}

impl Default for ScriptedSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSurface {
    /// A portal that behaves: everything appears, nothing vanishes, no
    /// confirmation payloads are queued.
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            open_dialog: None,
            dialog_checks: 0,
            participant_kind: None,
            court_visible: false,
            page_focused: false,
            checked: HashSet::new(),
            saved_participants: 0,
            portal_opens: 0,
            cases_started: 0,
            text_areas: 2,
            add_button: ButtonVisibility::Visible,
            court_hidden_selections: 0,
            select_failures: HashMap::new(),
            side_select_misses: 0,
            dialog_drops: VecDeque::new(),
            phone_field_ready: true,
            loader_stuck: false,
            landing_ready: true,
            payloads: VecDeque::new(),
            auto_token_prefix: None,
            on_case_start: None,
        }
    }

    /// A surface for dry runs: every case gets a confirmation payload with
    /// a token `<prefix>-<n>`.
    pub fn rehearsal(prefix: &str) -> Self {
        Self {
            auto_token_prefix: Some(prefix.to_string()),
            ..Self::new()
        }
    }

    /// Escaped payload of the kind the portal embeds for signing.
    pub fn payload_for(token: &str) -> String {
        format!(
            "&lt;?xml version=\"1.0\" encoding=\"UTF-8\"?&gt;&lt;data&gt;&lt;f1&gt;{}&lt;/f1&gt;&lt;f2&gt;claim&lt;/f2&gt;&lt;/data&gt;",
            token
        )
    }

    /// Queue the confirmation payload for the next read.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payloads.push_back(Some(payload.into()));
        self
    }

    /// Queue a read that finds no confirmation element.
    pub fn with_missing_payload(mut self) -> Self {
        self.payloads.push_back(None);
        self
    }

    pub fn with_text_areas(mut self, count: usize) -> Self {
        self.text_areas = count;
        self
    }

    pub fn with_add_button(mut self, visibility: ButtonVisibility) -> Self {
        self.add_button = visibility;
        self
    }

    /// The court selector stays hidden after the next `n` region selections.
    pub fn with_court_hidden_for(mut self, n: u32) -> Self {
        self.court_hidden_selections = n;
        self
    }

    /// The next `n` selections on `field` fail.
    pub fn with_select_failures(mut self, field: Field, n: u32) -> Self {
        self.select_failures.insert(field, n);
        self
    }

    /// The next `n` add-participant clicks do not open the side dialog.
    pub fn with_side_select_misses(mut self, n: u32) -> Self {
        self.side_select_misses = n;
        self
    }

    /// Close `dialog` on its `check`-th visibility check (1-based, counted
    /// from when it opened). Drops are consumed in order.
    pub fn with_dialog_drop(mut self, dialog: Dialog, check: usize) -> Self {
        self.dialog_drops.push_back((dialog, check));
        self
    }

    pub fn with_phone_field_ready(mut self, ready: bool) -> Self {
        self.phone_field_ready = ready;
        self
    }

    pub fn with_loader_stuck(mut self, stuck: bool) -> Self {
        self.loader_stuck = stuck;
        self
    }

    pub fn with_landing_ready(mut self, ready: bool) -> Self {
        self.landing_ready = ready;
        self
    }

    /// Call `hook` each time the filing entry is clicked, with the number
    /// of cases started so far.
    pub fn on_case_start(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_case_start = Some(Box::new(hook));
        self
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.log
    }

    /// Participants saved through either dialog.
    pub fn saved_participants(&self) -> usize {
        self.saved_participants
    }

    /// Navigations to the portal root.
    pub fn portal_opens(&self) -> usize {
        self.portal_opens
    }

    /// Cases started, counted by clicks on the filing entry.
    pub fn cases_started(&self) -> usize {
        self.cases_started
    }

    pub fn count_of(&self, pred: impl Fn(&Interaction) -> bool) -> usize {
        self.log.iter().filter(|i| pred(*i)).count()
    }

    /// Values selected on `field`, in order.
    pub fn selections(&self, field: Field) -> Vec<&str> {
        self.log
            .iter()
            .filter_map(|i| match i {
                Interaction::Select(f, v) if *f == field => Some(v.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Values entered into `field` by fill or typing, in order.
    pub fn entries(&self, field: Field) -> Vec<&str> {
        self.log
            .iter()
            .filter_map(|i| match i {
                Interaction::Fill(f, v) | Interaction::Type(f, v) if *f == field => {
                    Some(v.as_str())
                }
                _ => None,
            })
            .collect()
    }

    fn show_dialog(&mut self, dialog: Dialog) {
        self.open_dialog = Some(dialog);
        self.dialog_checks = 0;
    }

    fn check_dialog(&mut self, dialog: Dialog) -> bool {
        if self.open_dialog != Some(dialog) {
            return false;
        }
        self.dialog_checks += 1;
        if let Some(&(drop_dialog, check)) = self.dialog_drops.front() {
            if drop_dialog == dialog && self.dialog_checks >= check {
                self.dialog_drops.pop_front();
                self.open_dialog = None;
                return false;
            }
        }
        true
    }

    fn field_visible(&self, field: Field) -> bool {
        match field {
            Field::Court => self.court_visible,
            Field::Phone => self.open_dialog == Some(Dialog::Physical) && self.phone_field_ready,
            Field::TextArea(n) => n < self.text_areas,
            _ => true,
        }
    }

    fn next_payload(&mut self) -> Option<String> {
        if let Some(prefix) = &self.auto_token_prefix {
            return Some(Self::payload_for(&format!("{}-{}", prefix, self.cases_started)));
        }
        self.payloads.pop_front().flatten()
    }
}

#[async_trait]
impl FormSurface for ScriptedSurface {
    async fn open(&mut self, location: Location) -> Result<(), SurfaceError> {
        self.log.push(Interaction::Open(location));
        self.open_dialog = None;
        self.court_visible = false;
        self.page_focused = false;
        self.checked.clear();
        if location == Location::Portal {
            self.portal_opens += 1;
        }
        Ok(())
    }

    async fn wait_page_ready(&mut self, _timeout: Duration) -> Result<(), SurfaceError> {
        self.log.push(Interaction::WaitPageReady);
        Ok(())
    }

    async fn select_option(&mut self, field: Field, value: &str) -> Result<(), SurfaceError> {
        self.log.push(Interaction::Select(field, value.to_string()));

        if let Some(remaining) = self.select_failures.get_mut(&field) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SurfaceError::OptionUnavailable {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }

        match field {
            Field::Region => {
                if self.court_hidden_selections > 0 {
                    self.court_hidden_selections -= 1;
                    self.court_visible = false;
                } else {
                    self.court_visible = true;
                }
            }
            Field::ParticipantKind => self.participant_kind = Some(value.to_string()),
            _ => {}
        }
        Ok(())
    }

    async fn fill(&mut self, field: Field, value: &str) -> Result<(), SurfaceError> {
        if !self.field_visible(field) {
            return Err(SurfaceError::NotFound(field.to_string()));
        }
        self.log.push(Interaction::Fill(field, value.to_string()));
        Ok(())
    }

    async fn clear(&mut self, field: Field) -> Result<(), SurfaceError> {
        self.log.push(Interaction::Clear(field));
        Ok(())
    }

    async fn type_paced(
        &mut self,
        field: Field,
        value: &str,
        _delay: Duration,
    ) -> Result<(), SurfaceError> {
        if !self.field_visible(field) {
            return Err(SurfaceError::NotFound(field.to_string()));
        }
        self.log.push(Interaction::Type(field, value.to_string()));
        Ok(())
    }

    async fn click(&mut self, control: Control) -> Result<(), SurfaceError> {
        self.log.push(Interaction::Click(control));
        self.press(control);
        Ok(())
    }

    async fn force_click(&mut self, control: Control) -> Result<(), SurfaceError> {
        self.log.push(Interaction::ForceClick(control));
        self.press(control);
        Ok(())
    }

    async fn focus_page(&mut self) -> Result<(), SurfaceError> {
        self.log.push(Interaction::FocusPage);
        self.page_focused = true;
        Ok(())
    }

    async fn is_checked(&mut self, control: Control) -> Result<bool, SurfaceError> {
        Ok(self.checked.contains(&control))
    }

    async fn is_visible(&mut self, target: Target) -> Result<bool, SurfaceError> {
        Ok(match target {
            Target::Dialog(dialog) => self.check_dialog(dialog),
            Target::Field(field) => self.field_visible(field),
            Target::Control(Control::AddParticipant) => match self.add_button {
                ButtonVisibility::Visible => true,
                ButtonVisibility::AfterFocus => self.page_focused,
                ButtonVisibility::Hidden => false,
            },
            Target::Control(Control::FilingEntry) => self.landing_ready,
            Target::Control(_) => true,
            Target::Element(_) => true,
        })
    }

    async fn wait_loading_cleared(&mut self, _timeout: Duration) -> Result<bool, SurfaceError> {
        Ok(!self.loader_stuck)
    }

    async fn wait_ajax_settled(&mut self, _timeout: Duration) -> Result<bool, SurfaceError> {
        Ok(true)
    }

    async fn count(&mut self, field: Field) -> Result<usize, SurfaceError> {
        Ok(match field {
            Field::TextArea(_) => self.text_areas,
            other => usize::from(self.field_visible(other)),
        })
    }

    async fn upload_files(
        &mut self,
        control: Control,
        files: &[PathBuf],
    ) -> Result<(), SurfaceError> {
        self.log.push(Interaction::Upload(control, files.to_vec()));
        Ok(())
    }

    async fn read_value(&mut self, element: Element) -> Result<Option<String>, SurfaceError> {
        self.log.push(Interaction::Read(element));
        Ok(self.next_payload())
    }
}

impl ScriptedSurface {
    fn press(&mut self, control: Control) {
        match control {
            Control::FilingEntry => {
                self.cases_started += 1;
                let started = self.cases_started;
                if let Some(hook) = self.on_case_start.as_mut() {
                    hook(started);
                }
            }
            Control::AddParticipant => {
                if self.side_select_misses > 0 {
                    self.side_select_misses -= 1;
                } else {
                    self.show_dialog(Dialog::SideSelect);
                }
            }
            Control::SideSelectProceed => {
                if self.open_dialog == Some(Dialog::SideSelect) {
                    let juridical = self.participant_kind.as_deref() == Some("true");
                    self.show_dialog(if juridical {
                        Dialog::Juridical
                    } else {
                        Dialog::Physical
                    });
                }
            }
            Control::JuridicalSave | Control::PhysicalSave => {
                if self.open_dialog.is_some() {
                    self.saved_participants += 1;
                }
                self.open_dialog = None;
            }
            Control::OnlinePayment => {
                if !self.checked.remove(&control) {
                    self.checked.insert(control);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dialog_flow() {
        let mut surface = ScriptedSurface::new();
        surface.click(Control::AddParticipant).await.unwrap();
        assert!(surface.is_visible(Dialog::SideSelect.into()).await.unwrap());

        surface
            .select_option(Field::ParticipantKind, "true")
            .await
            .unwrap();
        surface.click(Control::SideSelectProceed).await.unwrap();
        assert!(surface.is_visible(Dialog::Juridical.into()).await.unwrap());
        assert!(!surface.is_visible(Dialog::SideSelect.into()).await.unwrap());

        surface.click(Control::JuridicalSave).await.unwrap();
        assert_eq!(surface.saved_participants(), 1);
        assert!(!surface.is_visible(Dialog::Juridical.into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_dialog_drop_on_nth_check() {
        let mut surface = ScriptedSurface::new().with_dialog_drop(Dialog::SideSelect, 2);
        surface.click(Control::AddParticipant).await.unwrap();
        assert!(surface.is_visible(Dialog::SideSelect.into()).await.unwrap());
        assert!(!surface.is_visible(Dialog::SideSelect.into()).await.unwrap());

        // the drop is consumed; reopening behaves again
        surface.click(Control::AddParticipant).await.unwrap();
        assert!(surface.is_visible(Dialog::SideSelect.into()).await.unwrap());
        assert!(surface.is_visible(Dialog::SideSelect.into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_court_hidden_then_visible() {
        let mut surface = ScriptedSurface::new().with_court_hidden_for(1);
        surface.select_option(Field::Region, "5").await.unwrap();
        assert!(!surface.is_visible(Field::Court.into()).await.unwrap());
        surface.select_option(Field::Region, "5").await.unwrap();
        assert!(surface.is_visible(Field::Court.into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_payload_queue() {
        let mut surface = ScriptedSurface::new()
            .with_payload(ScriptedSurface::payload_for("T-1"))
            .with_missing_payload();
        let first = surface.read_value(Element::ConfirmationPayload).await.unwrap();
        assert!(first.unwrap().contains("&lt;f1&gt;T-1&lt;/f1&gt;"));
        assert!(surface
            .read_value(Element::ConfirmationPayload)
            .await
            .unwrap()
            .is_none());
        assert!(surface
            .read_value(Element::ConfirmationPayload)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_wait_visible_times_out() {
        let mut surface = ScriptedSurface::new();
        let visible = surface
            .wait_visible(Field::Court.into(), Duration::from_millis(20))
            .await
            .unwrap();
        assert!(!visible);
    }
}
