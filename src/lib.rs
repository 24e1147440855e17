//! courtfile - resumable batch filing of claims through a court e-filing portal.
//!
//! Cases are imported into a local SQLite queue grouped by batch. Running a
//! batch pushes every case without a confirmation token through the
//! portal's filing wizard and records the token the portal issues, so an
//! interrupted batch resumes where it stopped.

pub mod browser;
pub mod cli;
pub mod config;
pub mod filing;
pub mod models;
pub mod repository;
pub mod schema;
