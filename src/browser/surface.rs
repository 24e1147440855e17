//! The portal, driven through Chrome.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventFileChooserOpened, SetInterceptFileChooserDialogParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PortalConfig;
use crate::filing::surface::POLL_INTERVAL;
use crate::filing::{Control, Element, Field, FormSurface, Location, SurfaceError, Target};

use super::config::BrowserConfig;
use super::script::{self, Action, Reply};
use super::selectors::{self, Locator, AJAX_IDLE_CSS, LOADER_CSS};
use super::session::BrowserSession;

/// How long to wait for the file chooser after clicking an upload button.
const FILE_CHOOSER_TIMEOUT: Duration = Duration::from_secs(10);

fn browser_err(e: impl std::fmt::Display) -> SurfaceError {
    SurfaceError::Browser(e.to_string())
}

/// A [`FormSurface`] backed by one Chrome tab. Chrome is started on the
/// first navigation.
pub struct ChromeSurface {
    session: BrowserSession,
    portal: PortalConfig,
    page: Option<Page>,
}

impl ChromeSurface {
    pub fn new(browser: BrowserConfig, portal: PortalConfig) -> Self {
        Self {
            session: BrowserSession::new(browser),
            portal,
            page: None,
        }
    }

    /// Close the tab and the browser, if one was started.
    pub async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        self.session.close().await;
    }

    async fn page(&mut self) -> Result<Page, SurfaceError> {
        if let Some(page) = &self.page {
            return Ok(page.clone());
        }
        let page = self.session.new_page().await.map_err(browser_err)?;
        self.page = Some(page.clone());
        Ok(page)
    }

    async fn run(
        &mut self,
        action: Action,
        locator: Option<&Locator>,
        arg: &str,
    ) -> Result<Reply, SurfaceError> {
        let page = self.page().await?;
        let expression = script::build(action, locator, arg);
        page.evaluate(expression)
            .await
            .map_err(|e| SurfaceError::Script(e.to_string()))?
            .into_value::<Reply>()
            .map_err(|e| SurfaceError::Script(e.to_string()))
    }

    /// Run an action that must find its element.
    async fn act(
        &mut self,
        action: Action,
        target: Target,
        arg: &str,
    ) -> Result<Reply, SurfaceError> {
        let locator = selectors::locate(target);
        let reply = self.run(action, Some(&locator), arg).await?;
        if reply.ok {
            return Ok(reply);
        }
        match reply.error.as_deref() {
            Some("option unavailable") => Err(SurfaceError::OptionUnavailable {
                field: target.to_string(),
                value: arg.to_string(),
            }),
            Some("not found") => Err(SurfaceError::NotFound(target.to_string())),
            other => Err(SurfaceError::Script(other.unwrap_or("unknown").to_string())),
        }
    }

    /// Tag the target and return it as a native element handle.
    async fn resolve(&mut self, target: Target) -> Result<chromiumoxide::Element, SurfaceError> {
        self.act(Action::Mark, target, "").await?;
        let page = self.page().await?;
        page.find_element(script::marked())
            .await
            .map_err(|_| SurfaceError::NotFound(target.to_string()))
    }

    async fn flag(&mut self, action: Action, arg: &str) -> Result<bool, SurfaceError> {
        let reply = self.run(action, None, arg).await?;
        Ok(reply.value.as_bool().unwrap_or(false))
    }

    async fn poll_flag(
        &mut self,
        action: Action,
        arg: &str,
        timeout: Duration,
    ) -> Result<bool, SurfaceError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.flag(action, arg).await? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    fn url_for(&self, location: Location) -> Result<String, SurfaceError> {
        let url = match location {
            Location::Portal => self.portal.base(),
            Location::Landing => self.portal.landing_url(),
        };
        url.map(|u| u.to_string())
            .map_err(|e| SurfaceError::Navigation(e.to_string()))
    }
}

#[async_trait]
impl FormSurface for ChromeSurface {
    async fn open(&mut self, location: Location) -> Result<(), SurfaceError> {
        let url = self.url_for(location)?;
        let page = self.page().await?;
        debug!("Navigating to {}", url);
        page.goto(url.as_str())
            .await
            .map_err(|e| SurfaceError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn wait_page_ready(&mut self, timeout: Duration) -> Result<(), SurfaceError> {
        let page = self.page().await?;
        let script = script::ready_state(timeout.as_millis() as u64);
        match tokio::time::timeout(timeout, page.evaluate(script)).await {
            Ok(Ok(result)) => {
                let state: String = result.into_value().unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }
        Ok(())
    }

    async fn select_option(&mut self, field: Field, value: &str) -> Result<(), SurfaceError> {
        self.act(Action::Select, field.into(), value).await.map(|_| ())
    }

    async fn fill(&mut self, field: Field, value: &str) -> Result<(), SurfaceError> {
        self.act(Action::Fill, field.into(), value).await.map(|_| ())
    }

    async fn clear(&mut self, field: Field) -> Result<(), SurfaceError> {
        self.act(Action::Clear, field.into(), "").await.map(|_| ())
    }

    async fn type_paced(
        &mut self,
        field: Field,
        value: &str,
        delay: Duration,
    ) -> Result<(), SurfaceError> {
        let element = self.resolve(field.into()).await?;
        element.click().await.map_err(browser_err)?;
        let page = self.page().await?;

        let mut buf = [0u8; 4];
        for ch in value.chars() {
            let key = ch.encode_utf8(&mut buf);
            if ch.is_ascii_graphic() || ch == ' ' {
                element.type_str(&*key).await.map_err(browser_err)?;
            } else {
                page.execute(InsertTextParams::new(key.to_string()))
                    .await
                    .map_err(browser_err)?;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn click(&mut self, control: Control) -> Result<(), SurfaceError> {
        let element = self.resolve(control.into()).await?;
        element.click().await.map_err(browser_err)?;
        Ok(())
    }

    async fn force_click(&mut self, control: Control) -> Result<(), SurfaceError> {
        self.act(Action::ForceClick, control.into(), "").await.map(|_| ())
    }

    async fn focus_page(&mut self) -> Result<(), SurfaceError> {
        self.run(Action::Blur, None, "").await.map(|_| ())
    }

    async fn is_checked(&mut self, control: Control) -> Result<bool, SurfaceError> {
        let reply = self.act(Action::Checked, control.into(), "").await?;
        Ok(reply.value.as_bool().unwrap_or(false))
    }

    async fn is_visible(&mut self, target: Target) -> Result<bool, SurfaceError> {
        let locator = selectors::locate(target);
        let reply = self.run(Action::Visible, Some(&locator), "").await?;
        Ok(reply.value.as_bool().unwrap_or(false))
    }

    async fn wait_loading_cleared(&mut self, timeout: Duration) -> Result<bool, SurfaceError> {
        self.poll_flag(Action::LoaderCleared, LOADER_CSS, timeout).await
    }

    async fn wait_ajax_settled(&mut self, timeout: Duration) -> Result<bool, SurfaceError> {
        self.poll_flag(Action::Present, AJAX_IDLE_CSS, timeout).await
    }

    async fn count(&mut self, field: Field) -> Result<usize, SurfaceError> {
        let locator = match field {
            Field::TextArea(_) => Locator {
                by: selectors::By::Css { css: "textarea" },
                scope: None,
            },
            other => selectors::field(other),
        };
        let reply = self.run(Action::Count, Some(&locator), "").await?;
        Ok(reply.value.as_u64().unwrap_or(0) as usize)
    }

    async fn upload_files(
        &mut self,
        control: Control,
        files: &[PathBuf],
    ) -> Result<(), SurfaceError> {
        let page = self.page().await?;
        let mut chooser = page
            .event_listener::<EventFileChooserOpened>()
            .await
            .map_err(browser_err)?;
        page.execute(SetInterceptFileChooserDialogParams::new(true))
            .await
            .map_err(browser_err)?;

        let result = async {
            self.click(control).await?;
            let opened = tokio::time::timeout(FILE_CHOOSER_TIMEOUT, chooser.next())
                .await
                .map_err(|_| SurfaceError::NotFound(format!("file chooser for {:?}", control)))?
                .ok_or_else(|| SurfaceError::Browser("event stream closed".to_string()))?;
            let node = opened
                .backend_node_id
                .clone()
                .ok_or_else(|| SurfaceError::Browser("file chooser has no input node".to_string()))?;

            let params = SetFileInputFilesParams::builder()
                .files(files.iter().map(|f| f.display().to_string()).collect::<Vec<_>>())
                .backend_node_id(node)
                .build()
                .map_err(SurfaceError::Browser)?;
            page.execute(params).await.map_err(browser_err)?;
            Ok::<_, SurfaceError>(())
        }
        .await;

        let _ = page
            .execute(SetInterceptFileChooserDialogParams::new(false))
            .await;
        result
    }

    async fn read_value(&mut self, element: Element) -> Result<Option<String>, SurfaceError> {
        let locator = selectors::element(element);
        let reply = self.run(Action::Read, Some(&locator), "").await?;
        if !reply.found {
            return Ok(None);
        }
        Ok(reply.value.as_str().map(str::to_string))
    }
}
