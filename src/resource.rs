//! Uniform start/stop/query operations over the externally-owned
//! resources: the VM, named OS processes, and the system proxy flag.
//!
//! Failure semantics are log-and-continue at every call site. Nothing here
//! retries; a failed start or stop leaves the resource visibly
//! unsynchronized and the dispatcher keeps the control state untouched so
//! the user can try again.

use crate::error::ResourceError;
use crate::models::ManagedProcess;
use crate::system::proxy::{PROXY_ENABLE_VALUE, PROXY_OVERRIDE_VALUE, PROXY_SERVER_VALUE};
use crate::system::{CommandRunner, ProcessLister, ProxySettingsStore};
use std::sync::Arc;

/// Lifecycle controller for the VM, managed processes and the proxy flag.
pub struct ResourceController {
    runner: Arc<dyn CommandRunner>,
    lister: Arc<dyn ProcessLister>,
    proxy: Arc<dyn ProxySettingsStore>,
    vbox_manage: String,
    vm_name: String,
    proxy_server: String,
    proxy_bypass: String,
}

impl ResourceController {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        lister: Arc<dyn ProcessLister>,
        proxy: Arc<dyn ProxySettingsStore>,
        vbox_manage: String,
        vm_name: String,
        proxy_server: String,
        proxy_bypass: String,
    ) -> Self {
        ResourceController {
            runner,
            lister,
            proxy,
            vbox_manage,
            vm_name,
            proxy_server,
            proxy_bypass,
        }
    }

    /// Start the VM headless. Fire-and-forget: returns once VBoxManage has
    /// been spawned, not once the guest is up.
    pub fn start_vm(&self) -> Result<(), ResourceError> {
        let args = vec![
            "startvm".to_string(),
            self.vm_name.clone(),
            "--type".to_string(),
            "headless".to_string(),
        ];
        self.runner.spawn(&self.vbox_manage, &args)
    }

    /// Send the VM a graceful ACPI power signal. Fire-and-forget; guest
    /// shutdown time is covered by the power-down grace period.
    pub fn poweroff_vm(&self) -> Result<(), ResourceError> {
        let args = vec![
            "controlvm".to_string(),
            self.vm_name.clone(),
            "acpipowerbutton".to_string(),
        ];
        self.runner.spawn(&self.vbox_manage, &args)
    }

    /// Launch a managed process. Fire-and-forget.
    pub fn start_process(&self, process: &ManagedProcess) -> Result<(), ResourceError> {
        self.runner.spawn(&process.path, &process.args)
    }

    /// Launch an arbitrary executable, used for the backend restart.
    pub fn start_executable(&self, path: &str, args: &[String]) -> Result<(), ResourceError> {
        self.runner.spawn(path, args)
    }

    /// Forcefully terminate a process by image name and wait for the
    /// terminate command itself, so a subsequent start cannot race the old
    /// instance's exit.
    pub async fn stop_process(&self, name: &str) -> Result<(), ResourceError> {
        let args = vec!["/IM".to_string(), name.to_string(), "/F".to_string()];
        self.runner.spawn_and_wait("taskkill", &args).await
    }

    /// Live running-predicate for a named process, exact image-name match.
    /// A failed query is logged and conservatively reported as not running.
    pub fn is_running(&self, name: &str) -> bool {
        match self.lister.list_process_names() {
            Ok(names) => names.iter().any(|n| n == name),
            Err(e) => {
                log::warn!("Treating '{}' as not running: {}", name, e);
                false
            }
        }
    }

    /// Write the proxy flags, then notify the OS. Both flag writes happen
    /// before the notification; on a write failure the notification is
    /// skipped and the error surfaces to the caller.
    pub fn set_system_proxy(&self, enabled: bool) -> Result<(), ResourceError> {
        if enabled {
            self.proxy
                .set_string(PROXY_OVERRIDE_VALUE, &self.proxy_bypass)?;
            self.proxy
                .set_string(PROXY_SERVER_VALUE, &self.proxy_server)?;
            self.proxy.set_dword(PROXY_ENABLE_VALUE, 1)?;
        } else {
            self.proxy.set_dword(PROXY_ENABLE_VALUE, 0)?;
        }
        self.proxy.broadcast_change()
    }

    /// Reboot the host immediately.
    pub fn reboot_host(&self) -> Result<(), ResourceError> {
        let args = ["/C", "shutdown", "/t", "0", "/r"]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        self.runner.spawn("cmd", &args)
    }

    /// Shut the host down immediately.
    pub fn shutdown_host(&self) -> Result<(), ResourceError> {
        let args = ["/C", "shutdown", "/t", "0", "/s"]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        self.runner.spawn("cmd", &args)
    }
}
