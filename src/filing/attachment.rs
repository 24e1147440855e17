//! Document uploads.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use super::assembler::split_field;
use super::error::FilingError;
use super::pacing::Throttle;
use super::surface::{Control, FormSurface};

/// Split a `*`-delimited path list and keep the files that exist.
///
/// Relative paths are taken against the working directory. Missing files
/// are logged and dropped.
pub fn resolve_paths(delimited: Option<&str>) -> Vec<PathBuf> {
    split_field(delimited)
        .into_iter()
        .filter(|p| !p.is_empty())
        .filter_map(|p| {
            let path = std::path::absolute(Path::new(&p)).unwrap_or_else(|_| PathBuf::from(&p));
            if path.is_file() {
                Some(path)
            } else {
                error!("File not found: {}", path.display());
                None
            }
        })
        .collect()
}

/// Upload a document group through `control`. An empty group is a no-op.
///
/// Returns the number of files attached.
pub async fn upload<S: FormSurface + ?Sized>(
    surface: &mut S,
    throttle: &Throttle,
    control: Control,
    delimited: Option<&str>,
) -> Result<usize, FilingError> {
    let files = resolve_paths(delimited);
    if files.is_empty() {
        debug!(?control, "No files to upload");
        return Ok(0);
    }
    surface.upload_files(control, &files).await?;
    debug!(?control, count = files.len(), "Uploaded files");
    throttle.settle().await;
    Ok(files.len())
}

/// Payment documents go through the generic upload once online payment
/// is switched on.
pub async fn attach_payment<S: FormSurface + ?Sized>(
    surface: &mut S,
    throttle: &Throttle,
    delimited: Option<&str>,
) -> Result<usize, FilingError> {
    if !surface.is_checked(Control::OnlinePayment).await? {
        surface.click(Control::OnlinePayment).await?;
        throttle.settle().await;
    }
    upload(surface, throttle, Control::AttachFile, delimited).await
}
