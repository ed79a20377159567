//! Call recording download pipeline.
//!
//! Recordings are stored once per entry id under the configured directory
//! and served statically. Every failure maps to "no recording"; the caller
//! retries on a later pass.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crm_core::recording::{
    extension_for_content_type, sanitize_file_stem, RecordingToken, MIN_RECORDING_BYTES,
    RECORDING_EXTENSIONS,
};

use crate::api::{DownloadedFile, MangoApi, RecordingLink};
use crate::config::RecordingStorageConfig;
use crate::error::MangoError;

/// Downloads recordings into local storage.
#[derive(Clone)]
pub struct RecordingDownloader {
    api: Arc<MangoApi>,
    storage: RecordingStorageConfig,
}

/// Stage-by-stage report of one recording fetch, for diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingProbe {
    pub token_decoded: bool,
    pub recording_id: Option<String>,
    pub fallback_url: Option<String>,
    pub location: Option<String>,
    pub bytes: Option<usize>,
    pub content_type: Option<String>,
    pub public_url: Option<String>,
    pub reused_existing: bool,
    pub error: Option<String>,
}

impl RecordingDownloader {
    pub fn new(api: Arc<MangoApi>, storage: RecordingStorageConfig) -> Self {
        Self { api, storage }
    }

    /// Fetch the recording for `entry_id` and return its public path.
    pub async fn fetch(&self, entry_id: &str, raw_token: &str) -> Option<String> {
        let probe = self.probe(entry_id, raw_token).await;
        if let Some(error) = &probe.error {
            tracing::warn!(entry_id, error = %error, "Recording not available");
        }
        probe.public_url
    }

    /// Run the pipeline and report what happened at each stage.
    pub async fn probe(&self, entry_id: &str, raw_token: &str) -> RecordingProbe {
        let mut probe = RecordingProbe::default();

        let Some(token) = RecordingToken::decode(raw_token) else {
            probe.error = Some("recording token could not be decoded".into());
            return probe;
        };
        probe.token_decoded = true;
        probe.fallback_url = token.fallback_url();
        let Some(recording_id) = token.recording_id() else {
            probe.error = Some("recording token has no numeric recording id".into());
            return probe;
        };
        probe.recording_id = Some(recording_id.to_string());

        let stem = sanitize_file_stem(entry_id);
        if let Some(existing) = self.existing_file(&stem).await {
            probe.reused_existing = true;
            probe.public_url = Some(self.storage.public_url(&existing));
            return probe;
        }

        let file = match self.locate_and_download(&token, &mut probe).await {
            Ok(file) => file,
            Err(e) => {
                probe.error = Some(e.to_string());
                return probe;
            }
        };
        probe.bytes = Some(file.bytes.len());
        probe.content_type = file.content_type.clone();

        if file.bytes.len() < MIN_RECORDING_BYTES {
            probe.error = Some(format!(
                "recording too small ({} bytes), likely an error page",
                file.bytes.len()
            ));
            return probe;
        }

        let file_name = format!(
            "{stem}.{}",
            extension_for_content_type(file.content_type.as_deref())
        );
        match self.store(&file_name, &file.bytes).await {
            Ok(()) => {
                tracing::info!(entry_id, file = %file_name, bytes = file.bytes.len(), "Stored call recording");
                probe.public_url = Some(self.storage.public_url(&file_name));
            }
            Err(e) => probe.error = Some(e.to_string()),
        }
        probe
    }

    async fn locate_and_download(
        &self,
        token: &RecordingToken,
        probe: &mut RecordingProbe,
    ) -> Result<DownloadedFile, MangoError> {
        let location = match self.api.recording_link(token.as_provider_id()).await {
            Ok(RecordingLink::Inline(file)) => return Ok(file),
            Ok(RecordingLink::Redirect(location)) => location,
            Err(e) => match e.redirect_location() {
                Some(location) => location.to_string(),
                None => return Err(e),
            },
        };
        probe.location = Some(location.clone());
        self.api.download(&location).await
    }

    async fn existing_file(&self, stem: &str) -> Option<String> {
        for ext in RECORDING_EXTENSIONS {
            let name = format!("{stem}.{ext}");
            if tokio::fs::try_exists(self.storage.dir.join(&name))
                .await
                .unwrap_or(false)
            {
                return Some(name);
            }
        }
        None
    }

    /// Write through a temporary sibling and rename, so a half-written file
    /// is never picked up as an existing recording.
    async fn store(&self, file_name: &str, bytes: &[u8]) -> Result<(), MangoError> {
        tokio::fs::create_dir_all(&self.storage.dir).await?;
        let target = self.storage.dir.join(file_name);
        let partial = partial_path(&self.storage.dir, file_name);
        tokio::fs::write(&partial, bytes).await?;
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn partial_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(format!(".{file_name}.part"))
}
