//! Chrome-backed implementation of the filing surface.

mod config;
pub mod script;
pub mod selectors;
pub mod stealth;

#[cfg(feature = "browser")]
mod session;
#[cfg(feature = "browser")]
mod surface;

pub use config::BrowserConfig;
#[cfg(feature = "browser")]
pub use surface::ChromeSurface;
