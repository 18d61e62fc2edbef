//! Proxy backend configuration document and the profile switch sequence.
//!
//! The backend's config file is an opaque JSON document. The panel touches
//! exactly one nested path, `outbounds[0].settings.vnext[0]` with leaf
//! fields `address`, `port` and `users[0].id`, and preserves everything
//! else on save. The document must already contain that path; the patcher
//! mutates existing leaves and never creates structure.

use crate::error::{PatchError, ResourceError};
use crate::models::{ProxyProfile, Timing};
use crate::resource::ResourceController;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const VNEXT_PATH: &str = "outbounds[0].settings.vnext[0]";

/// The backend's configuration document, held in memory between persists.
#[derive(Debug, Clone)]
pub struct BackendDocument {
    root: Value,
}

impl BackendDocument {
    /// Load the document from disk. A missing or malformed file is a
    /// startup precondition failure, not a runtime error.
    pub fn load(path: &Path) -> Result<Self, PatchError> {
        let content = fs::read_to_string(path)?;
        let root: Value = serde_json::from_str(&content)?;
        Ok(BackendDocument { root })
    }

    /// Build a document from an already-parsed value (tests).
    pub fn from_value(root: Value) -> Self {
        BackendDocument { root }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    fn vnext(&self) -> Result<&Value, PatchError> {
        self.root
            .get("outbounds")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("settings"))
            .and_then(|v| v.get("vnext"))
            .and_then(|v| v.get(0))
            .ok_or_else(|| PatchError::PathNotFound(VNEXT_PATH.to_string()))
    }

    fn vnext_mut(&mut self) -> Result<&mut Value, PatchError> {
        self.root
            .get_mut("outbounds")
            .and_then(|v| v.get_mut(0))
            .and_then(|v| v.get_mut("settings"))
            .and_then(|v| v.get_mut("vnext"))
            .and_then(|v| v.get_mut(0))
            .ok_or_else(|| PatchError::PathNotFound(VNEXT_PATH.to_string()))
    }

    /// The upstream address currently configured, used to decide which
    /// profile control starts checked.
    pub fn active_address(&self) -> Result<String, PatchError> {
        self.vnext()?
            .get("address")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PatchError::PathNotFound(format!("{}.address", VNEXT_PATH)))
    }

    /// Mutate the three targeted leaves in place. Pure with respect to
    /// every other field in the document.
    pub fn apply_profile(&mut self, profile: &ProxyProfile) -> Result<(), PatchError> {
        let vnext = self.vnext_mut()?;

        match vnext.get_mut("address") {
            Some(slot) => *slot = Value::String(profile.address.clone()),
            None => {
                return Err(PatchError::PathNotFound(format!(
                    "{}.address",
                    VNEXT_PATH
                )))
            }
        }

        match vnext.get_mut("port") {
            Some(slot) => *slot = Value::Number(profile.port.into()),
            None => return Err(PatchError::PathNotFound(format!("{}.port", VNEXT_PATH))),
        }

        let user = vnext
            .get_mut("users")
            .and_then(|v| v.get_mut(0))
            .ok_or_else(|| PatchError::PathNotFound(format!("{}.users[0]", VNEXT_PATH)))?;

        match user.get_mut("id") {
            Some(slot) => *slot = Value::String(profile.id.clone()),
            None => {
                return Err(PatchError::PathNotFound(format!(
                    "{}.users[0].id",
                    VNEXT_PATH
                )))
            }
        }

        Ok(())
    }

    /// Serialize with stable two-space indentation and overwrite the file.
    /// On failure the in-memory document is NOT rolled back; memory and
    /// disk may diverge until the next successful persist.
    pub fn persist(&self, path: &Path) -> Result<(), PatchError> {
        let data = serde_json::to_string_pretty(&self.root)?;
        fs::write(path, data)
            .map_err(|e| PatchError::PersistFailed(format!("{}: {}", path.display(), e)))
    }
}

/// Executes the profile switch sequence against the live backend process.
///
/// The order is a contract: stop the backend, patch and persist the
/// document, pause so the OS releases the terminated instance, then start
/// the backend against the updated file. Starting earlier risks the
/// backend loading stale configuration.
pub struct ProfileSwitcher {
    controller: Arc<ResourceController>,
    document: Arc<Mutex<BackendDocument>>,
    backend_exe: String,
    backend_path: PathBuf,
    config_path: PathBuf,
    timing: Timing,
}

impl ProfileSwitcher {
    pub fn new(
        controller: Arc<ResourceController>,
        document: Arc<Mutex<BackendDocument>>,
        backend_dir: &str,
        backend_exe: &str,
        config_file: &str,
        timing: Timing,
    ) -> Self {
        let dir = PathBuf::from(backend_dir);
        ProfileSwitcher {
            controller,
            document,
            backend_exe: backend_exe.to_string(),
            backend_path: dir.join(backend_exe),
            config_path: dir.join(config_file),
            timing,
        }
    }

    pub fn document(&self) -> Arc<Mutex<BackendDocument>> {
        self.document.clone()
    }

    /// Run the full switch sequence. Each step degrades to log-and-continue
    /// except the patch itself: a document whose contract path is missing
    /// aborts the switch before the backend is restarted.
    pub async fn switch_to(&self, profile: &ProxyProfile) -> Result<(), ResourceError> {
        log::info!("Switch backend to \"{}\"", profile.address);

        if let Err(e) = self.controller.stop_process(&self.backend_exe).await {
            // The backend may simply not be running; a later start is
            // still safe because taskkill has finished either way.
            log::warn!("Backend stop: {}", e);
        }

        {
            let mut doc = self.document.lock().await;
            if let Err(e) = doc.apply_profile(profile) {
                log::error!("Backend config patch failed, switch aborted: {}", e);
                return Err(ResourceError::CommandFailed {
                    cmd: self.backend_exe.clone(),
                    reason: e.to_string(),
                });
            }
            if let Err(e) = doc.persist(&self.config_path) {
                log::error!("Backend config persist failed: {}", e);
            }
        }

        tokio::time::sleep(self.timing.backend_restart_pause).await;

        let args = vec![
            "-config".to_string(),
            self.config_path.to_string_lossy().into_owned(),
        ];
        self.controller
            .start_executable(&self.backend_path.to_string_lossy(), &args)
    }
}
