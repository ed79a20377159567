//! Client for the Mango Office virtual PBX API.
//!
//! - [`api::MangoApi`]: signed REST calls (stats report, recording lookup).
//! - [`recording::RecordingDownloader`]: fetches call recordings to local storage.
//! - [`webhook`]: parsing and verification of pushed call summaries.

pub mod api;
pub mod config;
pub mod error;
pub mod recording;
pub mod webhook;

pub use api::MangoApi;
pub use config::{MangoConfig, RecordingStorageConfig};
pub use error::MangoError;
pub use recording::{RecordingDownloader, RecordingProbe};
