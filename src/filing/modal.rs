//! Participant registration dialog.
//!
//! Adding one participant walks `Closed -> SideSelect -> Juridical |
//! Physical -> Saved`. The dialog can vanish at any point; each step
//! re-checks it and reports a vanished dialog as recoverable so the whole
//! sequence can be restarted from the add button.

use tracing::{debug, info, warn};

use crate::config::FilingConfig;
use crate::models::{Participant, PartyKind};

use super::error::FilingError;
use super::pacing::Throttle;
use super::surface::{Control, Dialog, Field, FormSurface};

/// Drives the participant dialog for one case page.
pub struct ParticipantModal<'a> {
    config: &'a FilingConfig,
    throttle: &'a Throttle,
}

impl<'a> ParticipantModal<'a> {
    pub fn new(config: &'a FilingConfig, throttle: &'a Throttle) -> Self {
        Self { config, throttle }
    }

    /// Register a participant, restarting the sequence on recoverable
    /// failures up to the configured attempt count.
    pub async fn add_with_retry<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        participant: &Participant,
    ) -> Result<(), FilingError> {
        let attempts = self.config.retries.participant_attempts.max(1);
        info!(
            role = %participant.role,
            side = participant.side.as_deref().unwrap_or(""),
            juridical = participant.kind.is_juridical(),
            id = participant.id.as_deref().unwrap_or(""),
            "Adding participant"
        );

        let mut last = String::new();
        for attempt in 1..=attempts {
            debug!(attempt, "Participant add attempt");
            match self.add(surface, participant).await {
                Ok(()) => {
                    self.throttle.participant().await;
                    info!(role = %participant.role, "Participant added");
                    return Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    warn!(attempt, "Participant dialog failed: {}", e);
                    last = e.to_string();
                    if attempt < attempts {
                        self.throttle.participant().await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(FilingError::RetriesExhausted { attempts, last })
    }

    /// One pass through the dialog, from the add button to save.
    pub async fn add<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        participant: &Participant,
    ) -> Result<(), FilingError> {
        self.open_side_select(surface).await?;
        self.choose_side(surface, participant).await?;
        match participant.kind {
            PartyKind::Juridical => self.fill_juridical(surface, participant).await,
            PartyKind::Physical => self.fill_physical(surface, participant).await,
        }
    }

    async fn open_side_select<S: FormSurface + ?Sized>(&self, surface: &mut S) -> Result<(), FilingError> {
        self.modal_loader(surface).await?;

        let button = Control::AddParticipant;
        if surface.is_visible(button.into()).await? {
            surface.click(button).await?;
        } else {
            surface.focus_page().await?;
            if surface.is_visible(button.into()).await? {
                surface.click(button).await?;
            } else {
                warn!("Add participant button not visible, forcing click");
                surface.force_click(button).await?;
            }
        }
        self.ajax(surface).await?;

        let timeout = self.config.timeouts.dialog();
        if !surface.wait_visible(Dialog::SideSelect.into(), timeout).await? {
            return Err(FilingError::recoverable(
                "Side selection dialog did not open",
            ));
        }
        Ok(())
    }

    async fn choose_side<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        participant: &Participant,
    ) -> Result<(), FilingError> {
        surface
            .select_option(Field::ParticipantKind, participant.kind.form_value())
            .await?;
        self.ajax(surface).await?;

        surface
            .select_option(
                Field::ParticipantSide,
                participant.side.as_deref().unwrap_or(""),
            )
            .await?;
        self.ajax(surface).await?;

        self.check(surface, Dialog::SideSelect, "before proceeding").await?;
        surface.click(Control::SideSelectProceed).await?;
        self.ajax(surface).await?;
        Ok(())
    }

    async fn fill_juridical<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        participant: &Participant,
    ) -> Result<(), FilingError> {
        let dialog = Dialog::Juridical;
        self.await_form(surface, dialog).await?;
        self.modal_loader(surface).await?;
        self.check(surface, dialog, "on open").await?;

        surface
            .type_paced(
                Field::OrganizationBin,
                participant.id.as_deref().unwrap_or(""),
                self.throttle.keystroke(),
            )
            .await?;
        self.throttle.settle().await;
        self.check(surface, dialog, "after BIN").await?;

        surface.click(Control::JuridicalLookup).await?;
        self.modal_loader(surface).await?;
        self.throttle.settle().await;
        self.check(surface, dialog, "after lookup").await?;

        surface
            .fill(Field::FactAddress, participant.address.as_deref().unwrap_or(""))
            .await?;
        self.throttle.settle().await;
        self.check(surface, dialog, "after address").await?;

        surface
            .fill(Field::BankDetails, participant.bank.as_deref().unwrap_or(""))
            .await?;
        self.throttle.settle().await;
        self.check(surface, dialog, "after bank details").await?;

        surface.click(Control::JuridicalSave).await?;
        self.modal_loader(surface).await?;
        Ok(())
    }

    async fn fill_physical<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        participant: &Participant,
    ) -> Result<(), FilingError> {
        let dialog = Dialog::Physical;
        self.await_form(surface, dialog).await?;
        self.modal_loader(surface).await?;
        self.check(surface, dialog, "on open").await?;

        surface
            .type_paced(
                Field::PersonIin,
                participant.id.as_deref().unwrap_or(""),
                self.throttle.keystroke(),
            )
            .await?;
        self.check(surface, dialog, "after IIN").await?;

        surface.click(Control::PhysicalLookup).await?;
        self.modal_loader(surface).await?;
        self.ajax(surface).await?;
        self.throttle.settle().await;
        self.check(surface, dialog, "after lookup").await?;

        if let Some(phone) = participant.phone.as_deref() {
            let ready = surface
                .wait_visible(Field::Phone.into(), self.config.timeouts.phone_field())
                .await?;
            if !ready {
                return Err(FilingError::fatal("Phone field is not ready for input"));
            }
            surface.clear(Field::Phone).await?;
            surface
                .type_paced(Field::Phone, phone, self.throttle.keystroke())
                .await?;
            self.throttle.settle().await;
            self.check(surface, dialog, "after phone").await?;
        }

        if let Some(email) = participant.email.as_deref() {
            surface
                .type_paced(Field::Email, email, self.throttle.email_keystroke())
                .await?;
            self.throttle.settle().await;
            self.check(surface, dialog, "after email").await?;
        }

        self.check(surface, dialog, "before save").await?;
        surface.click(Control::PhysicalSave).await?;
        self.modal_loader(surface).await?;
        Ok(())
    }

    async fn await_form<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        dialog: Dialog,
    ) -> Result<(), FilingError> {
        let timeout = self.config.timeouts.dialog();
        if !surface.wait_visible(dialog.into(), timeout).await? {
            return Err(FilingError::recoverable(format!(
                "{:?} dialog did not appear",
                dialog
            )));
        }
        Ok(())
    }

    async fn check<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        dialog: Dialog,
        step: &str,
    ) -> Result<(), FilingError> {
        if surface.is_visible(dialog.into()).await? {
            return Ok(());
        }
        Err(FilingError::recoverable(format!(
            "{:?} dialog disappeared {}",
            dialog, step
        )))
    }

    async fn modal_loader<S: FormSurface + ?Sized>(&self, surface: &mut S) -> Result<(), FilingError> {
        if !surface
            .wait_loading_cleared(self.config.timeouts.modal_loader())
            .await?
        {
            warn!("Loader did not clear inside the participant dialog, continuing");
        }
        Ok(())
    }

    async fn ajax<S: FormSurface + ?Sized>(&self, surface: &mut S) -> Result<(), FilingError> {
        if !surface.wait_ajax_settled(self.config.timeouts.ajax()).await? {
            warn!("Ajax requests did not settle in time");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filing::scripted::{ButtonVisibility, Interaction, ScriptedSurface};
    use crate::models::ParticipantRole;

    fn juridical() -> Participant {
        Participant {
            id: Some("123456789012".into()),
            side: Some("1".into()),
            address: Some("Almaty, Abai 1".into()),
            bank: Some("KZ123".into()),
            ..Participant::new(ParticipantRole::Plaintiff, PartyKind::Juridical)
        }
    }

    fn physical() -> Participant {
        Participant {
            id: Some("900101300123".into()),
            side: Some("2".into()),
            phone: Some("+77001234567".into()),
            email: Some("d@example.kz".into()),
            ..Participant::new(ParticipantRole::Defendant, PartyKind::Physical)
        }
    }

    async fn add(surface: &mut ScriptedSurface, participant: &Participant) -> Result<(), FilingError> {
        let config = FilingConfig::rehearsal();
        let throttle = Throttle::new(config.pacing.clone());
        ParticipantModal::new(&config, &throttle)
            .add_with_retry(surface, participant)
            .await
    }

    #[tokio::test]
    async fn test_juridical_flow() {
        let mut surface = ScriptedSurface::new();
        add(&mut surface, &juridical()).await.unwrap();

        assert_eq!(surface.saved_participants(), 1);
        assert_eq!(surface.selections(Field::ParticipantKind), vec!["true"]);
        assert_eq!(surface.selections(Field::ParticipantSide), vec!["1"]);
        assert_eq!(surface.entries(Field::OrganizationBin), vec!["123456789012"]);
        assert_eq!(surface.entries(Field::FactAddress), vec!["Almaty, Abai 1"]);
        assert_eq!(surface.entries(Field::BankDetails), vec!["KZ123"]);
        assert_eq!(surface.count_of(|i| *i == Interaction::Click(Control::JuridicalLookup)), 1);
    }

    #[tokio::test]
    async fn test_physical_flow_types_contacts() {
        let mut surface = ScriptedSurface::new();
        add(&mut surface, &physical()).await.unwrap();

        assert_eq!(surface.saved_participants(), 1);
        assert_eq!(surface.selections(Field::ParticipantKind), vec!["false"]);
        assert_eq!(surface.entries(Field::PersonIin), vec!["900101300123"]);
        assert_eq!(surface.entries(Field::Phone), vec!["+77001234567"]);
        assert_eq!(surface.entries(Field::Email), vec!["d@example.kz"]);
        assert_eq!(surface.count_of(|i| *i == Interaction::Clear(Field::Phone)), 1);
    }

    #[tokio::test]
    async fn test_physical_without_contacts_skips_fields() {
        let mut surface = ScriptedSurface::new().with_phone_field_ready(false);
        let participant = Participant {
            id: Some("900101300123".into()),
            ..Participant::new(ParticipantRole::Representative, PartyKind::Physical)
        };
        add(&mut surface, &participant).await.unwrap();
        assert!(surface.entries(Field::Phone).is_empty());
        assert!(surface.entries(Field::Email).is_empty());
    }

    #[tokio::test]
    async fn test_vanished_dialog_restarts_sequence() {
        let mut surface = ScriptedSurface::new()
            .with_dialog_drop(Dialog::Juridical, 3)
            .with_dialog_drop(Dialog::SideSelect, 2);
        add(&mut surface, &juridical()).await.unwrap();

        assert_eq!(surface.saved_participants(), 1);
        // two failed passes plus the successful one
        assert_eq!(
            surface.count_of(|i| *i == Interaction::Click(Control::AddParticipant)),
            3
        );
    }

    #[tokio::test]
    async fn test_side_dialog_never_opening_exhausts_attempts() {
        let mut surface = ScriptedSurface::new().with_side_select_misses(5);
        let err = add(&mut surface, &physical()).await.unwrap_err();

        assert!(matches!(err, FilingError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(surface.saved_participants(), 0);
        assert_eq!(
            surface.count_of(|i| *i == Interaction::Click(Control::AddParticipant)),
            3
        );
    }

    #[tokio::test]
    async fn test_phone_field_never_ready_is_fatal_without_retry() {
        let mut surface = ScriptedSurface::new().with_phone_field_ready(false);
        let err = add(&mut surface, &physical()).await.unwrap_err();

        assert!(matches!(err, FilingError::Fatal(_)));
        assert_eq!(
            surface.count_of(|i| *i == Interaction::Click(Control::AddParticipant)),
            1
        );
    }

    #[tokio::test]
    async fn test_hidden_button_is_reached() {
        let mut surface = ScriptedSurface::new().with_add_button(ButtonVisibility::AfterFocus);
        add(&mut surface, &juridical()).await.unwrap();
        assert_eq!(surface.count_of(|i| *i == Interaction::FocusPage), 1);
        assert_eq!(surface.count_of(|i| matches!(i, Interaction::ForceClick(_))), 0);

        let mut surface = ScriptedSurface::new().with_add_button(ButtonVisibility::Hidden);
        add(&mut surface, &juridical()).await.unwrap();
        assert_eq!(
            surface.count_of(|i| *i == Interaction::ForceClick(Control::AddParticipant)),
            1
        );
        assert_eq!(surface.saved_participants(), 1);
    }

    #[tokio::test]
    async fn test_surface_error_is_not_retried() {
        let mut surface = ScriptedSurface::new().with_select_failures(Field::ParticipantSide, 1);
        let err = add(&mut surface, &juridical()).await.unwrap_err();
        assert!(matches!(err, FilingError::Surface(_)));
        assert_eq!(surface.saved_participants(), 0);
    }
}
