//! The filing wizard, stage by stage.

use tracing::{debug, info, warn};

use crate::config::FilingConfig;
use crate::models::Case;

use super::assembler::AssembledParticipants;
use super::attachment;
use super::confirmation;
use super::error::{AtStage, FilingError, Stage, StageError};
use super::modal::ParticipantModal;
use super::pacing::Throttle;
use super::surface::{Control, Field, FormSurface, Location};

/// Pushes one case at a time through the portal's filing wizard.
#[derive(Debug, Clone)]
pub struct FormDriver {
    config: FilingConfig,
    throttle: Throttle,
}

impl FormDriver {
    pub fn new(config: FilingConfig) -> Self {
        let throttle = Throttle::new(config.pacing.clone());
        Self { config, throttle }
    }

    pub fn config(&self) -> &FilingConfig {
        &self.config
    }

    /// Open the portal root. Called once before the first case of a session.
    pub async fn start_session<S: FormSurface + ?Sized>(&self, surface: &mut S) -> Result<(), StageError> {
        info!("Opening portal");
        surface.open(Location::Portal).await.at(Stage::OpenForm)
    }

    /// Run every stage for `case` and read the confirmation token.
    ///
    /// `Ok(None)` means the wizard completed but no token could be read;
    /// the case stays pending.
    pub async fn file_case<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        case: &Case,
        participants: &AssembledParticipants,
    ) -> Result<Option<String>, StageError> {
        info!(
            internal_id = %case.internal_id,
            region = case.region_id.as_deref().unwrap_or(""),
            court = case.court_id.as_deref().unwrap_or(""),
            participants = participants.len(),
            "Filing case"
        );

        self.open_form(surface).await.at(Stage::OpenForm)?;
        self.classify(surface).await.at(Stage::Classification)?;
        self.select_region_and_court(surface, case)
            .await
            .at(Stage::RegionCourt)?;
        self.add_participants(surface, participants)
            .await
            .at(Stage::Participants)?;
        self.fill_payment(surface, case).await.at(Stage::Payment)?;
        self.fill_claim_text(surface, case)
            .await
            .at(Stage::ClaimText)?;
        self.attach_documents(surface, case)
            .await
            .at(Stage::Documents)?;

        Ok(confirmation::extract_token(surface).await)
    }

    /// Cool down, then go back to the service listing for the next case.
    pub async fn return_home<S: FormSurface + ?Sized>(&self, surface: &mut S) -> Result<(), StageError> {
        self.throttle.cooldown().await;
        info!("Returning to landing page");
        self.open_landing(surface).await.at(Stage::ReturnHome)?;
        self.throttle.landing().await;
        Ok(())
    }

    async fn open_landing<S: FormSurface + ?Sized>(&self, surface: &mut S) -> Result<(), FilingError> {
        surface.open(Location::Landing).await?;
        let ready = surface
            .wait_visible(Control::FilingEntry.into(), self.config.timeouts.landing())
            .await?;
        if !ready {
            return Err(FilingError::fatal(
                "Filing entry did not appear on the landing page",
            ));
        }
        Ok(())
    }

    async fn open_form<S: FormSurface + ?Sized>(&self, surface: &mut S) -> Result<(), FilingError> {
        let form = &self.config.form;
        surface
            .wait_page_ready(self.config.timeouts.page_ready())
            .await?;
        surface.click(Control::FilingEntry).await?;
        self.wait_loader(surface).await?;

        surface
            .select_option(Field::LitigationKind, &form.litigation_kind)
            .await?;
        self.wait_loader(surface).await?;

        surface
            .select_option(Field::InstanceLevel, &form.instance_level)
            .await?;
        surface
            .select_option(Field::DocumentType, &form.document_type)
            .await?;
        self.wait_loader(surface).await?;

        surface.click(Control::SubmitFilingKind).await?;
        self.wait_loader(surface).await
    }

    async fn classify<S: FormSurface + ?Sized>(&self, surface: &mut S) -> Result<(), FilingError> {
        let form = &self.config.form;
        for (field, value) in [
            (Field::ProceedingType, &form.proceeding_type),
            (Field::CaseCategory, &form.case_category),
            (Field::ClaimNature, &form.claim_nature),
        ] {
            surface.select_option(field, value).await?;
            self.wait_loader(surface).await?;
        }
        Ok(())
    }

    async fn select_region_and_court<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        case: &Case,
    ) -> Result<(), FilingError> {
        let attempts = self.config.retries.region_court_attempts.max(1);
        let region = case.region_id.as_deref().unwrap_or("");
        let court = case.court_id.as_deref().unwrap_or("");

        for attempt in 1..=attempts {
            debug!(attempt, region, court, "Selecting region and court");
            match self.try_region_and_court(surface, region, court).await {
                Ok(true) => {
                    info!(region, court, "Region and court selected");
                    return Ok(());
                }
                Ok(false) => warn!(attempt, "Court selector not visible"),
                Err(e) => warn!(attempt, "Region/court selection failed: {}", e),
            }

            if attempt < attempts {
                let form = &self.config.form;
                surface
                    .select_option(Field::ProceedingType, &form.proceeding_type)
                    .await?;
                surface
                    .select_option(Field::CaseCategory, &form.case_category)
                    .await?;
                surface
                    .select_option(Field::ClaimNature, &form.claim_nature)
                    .await?;
                self.throttle.settle().await;
            }
        }

        Err(FilingError::fatal(format!(
            "Failed to select region {} and court {} after {} attempts",
            region, court, attempts
        )))
    }

    /// `Ok(false)` when the court selector never showed up.
    async fn try_region_and_court<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        region: &str,
        court: &str,
    ) -> Result<bool, FilingError> {
        surface.select_option(Field::Region, region).await?;
        self.throttle.settle().await;
        if !surface
            .wait_visible(Field::Court.into(), self.config.timeouts.court())
            .await?
        {
            return Ok(false);
        }
        surface.select_option(Field::Court, court).await?;
        self.throttle.court_settle().await;
        Ok(true)
    }

    async fn add_participants<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        participants: &AssembledParticipants,
    ) -> Result<(), FilingError> {
        let modal = ParticipantModal::new(&self.config, &self.throttle);
        for participant in participants.iter() {
            modal.add_with_retry(surface, participant).await?;
        }
        Ok(())
    }

    async fn fill_payment<S: FormSurface + ?Sized>(&self, surface: &mut S, case: &Case) -> Result<(), FilingError> {
        surface.click(Control::Proceed).await?;
        self.wait_loader(surface).await?;

        surface
            .select_option(Field::ClaimCategory, &self.config.form.claim_category)
            .await?;
        self.wait_loader(surface).await?;

        surface
            .fill(Field::ClaimAmount, &format_amount(case.claim_amount))
            .await?;
        self.wait_loader(surface).await?;
        surface
            .fill(Field::StateDuty, &format_amount(case.state_duty))
            .await?;

        attachment::attach_payment(surface, &self.throttle, case.documents.payment.as_deref()).await?;
        self.wait_loader(surface).await?;

        surface.click(Control::Proceed).await?;
        self.wait_loader(surface).await
    }

    async fn fill_claim_text<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        case: &Case,
    ) -> Result<(), FilingError> {
        let areas = surface.count(Field::TextArea(0)).await?;
        debug!(areas, "Claim text areas");
        let texts = [&case.claim_summary, &case.claim_basis];
        for (index, text) in texts.into_iter().enumerate().take(areas) {
            surface
                .fill(Field::TextArea(index), text.as_deref().unwrap_or(""))
                .await?;
            self.throttle.settle().await;
        }
        Ok(())
    }

    async fn attach_documents<S: FormSurface + ?Sized>(
        &self,
        surface: &mut S,
        case: &Case,
    ) -> Result<(), FilingError> {
        attachment::upload(
            surface,
            &self.throttle,
            Control::UploadClaim,
            case.documents.main.as_deref(),
        )
        .await?;
        self.throttle.settle().await;
        attachment::upload(
            surface,
            &self.throttle,
            Control::AttachFile,
            case.documents.other.as_deref(),
        )
        .await?;

        if !surface
            .wait_loading_cleared(self.config.timeouts.upload_loader())
            .await?
        {
            warn!("Loader still visible after document upload");
        }
        self.throttle.settle().await;
        self.wait_loader(surface).await?;

        surface.click(Control::Proceed).await?;
        surface
            .wait_page_ready(self.config.timeouts.page_ready())
            .await?;
        Ok(())
    }

    /// Wait for the loading indicator, then settle. A page that stays busy
    /// past the timeout is stuck.
    async fn wait_loader<S: FormSurface + ?Sized>(&self, surface: &mut S) -> Result<(), FilingError> {
        let timeout = self.config.timeouts.loader();
        if !surface.wait_loading_cleared(timeout).await? {
            return Err(FilingError::fatal(format!(
                "Loading indicator did not clear within {:.0}s",
                timeout.as_secs_f64()
            )));
        }
        self.throttle.settle().await;
        Ok(())
    }
}

/// Render an amount the way the portal's numeric inputs expect it.
///
/// Whole amounts are sent without a decimal part, so `150000.0` is typed
/// as `150000` rather than `150000.0`. A missing amount clears the input.
pub fn format_amount(amount: Option<f64>) -> String {
    match amount {
        None => String::new(),
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        Some(v) => v.to_string(),
    }
}
