//! Core data structures shared across the panel.
//!
//! Everything in here is plain data: the startup configuration document,
//! the action vocabulary of the controls, and the fixed timing intervals.
//! `AppConfig` is loaded once and passed around immutably; nothing mutates
//! configuration after startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default VBoxManage install location, overridable from config.
pub const DEFAULT_VBOX_MANAGE: &str = r"C:\Program Files\Oracle\VirtualBox\VBoxManage.exe";

/// Default headless VM worker process name, used to confirm the VM is up.
pub const DEFAULT_VM_PROCESS: &str = "VBoxHeadless.exe";

/// Default backend executable launched from the backend directory.
pub const DEFAULT_BACKEND_EXE: &str = "wv2ray.exe";

/// Default system proxy endpoint written to the proxy flags.
pub const DEFAULT_PROXY_SERVER: &str = "127.0.0.1:3128";

/// Default proxy bypass list: loopback plus all private ranges.
pub const DEFAULT_PROXY_BYPASS: &str = "<local>;localhost;127.*;10.*;172.16.*;172.17.*;\
172.18.*;172.19.*;172.20.*;172.21.*;172.22.*;172.23.*;172.24.*;172.25.*;172.26.*;\
172.27.*;172.28.*;172.29.*;172.30.*;172.31.*;192.168.*";

/// One externally-owned process under lifecycle control.
///
/// Instantiated from configuration at startup and immutable thereafter;
/// whether it is *running* is always derived live from the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedProcess {
    /// Image name as it appears in the OS process list (exact match)
    pub name: String,
    /// Launch path
    pub path: String,
    /// Launch arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Start this process during the startup auto-start pass
    #[serde(default)]
    pub auto_start: bool,
}

/// One upstream endpoint the proxy backend can be switched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyProfile {
    pub address: String,
    pub port: u16,
    pub id: String,
}

/// Proxy backend location and profile list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Directory holding the backend executable and its config file
    pub dir: String,
    /// Backend executable name within `dir`
    #[serde(default = "default_backend_exe")]
    pub exe: String,
    /// Backend config file name within `dir`
    pub config_file: String,
    /// Profiles offered as switchable controls, in menu order
    #[serde(default)]
    pub profiles: Vec<ProxyProfile>,
}

fn default_backend_exe() -> String {
    DEFAULT_BACKEND_EXE.to_string()
}

fn default_vbox_manage() -> String {
    DEFAULT_VBOX_MANAGE.to_string()
}

fn default_vm_process() -> String {
    DEFAULT_VM_PROCESS.to_string()
}

fn default_proxy_server() -> String {
    DEFAULT_PROXY_SERVER.to_string()
}

fn default_proxy_bypass() -> String {
    DEFAULT_PROXY_BYPASS.to_string()
}

/// Startup configuration document (`config.json` beside the executable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// VirtualBox VM name passed to VBoxManage
    pub vm_name: String,
    /// Process name used to confirm the VM is actually up
    #[serde(default = "default_vm_process")]
    pub vm_process: String,
    /// VBoxManage path override
    #[serde(default = "default_vbox_manage")]
    pub vbox_manage: String,
    /// System proxy endpoint written when the proxy toggle is enabled
    #[serde(default = "default_proxy_server")]
    pub proxy_server: String,
    /// System proxy bypass list
    #[serde(default = "default_proxy_bypass")]
    pub proxy_bypass: String,
    /// Managed processes, in menu order
    #[serde(default, rename = "proc")]
    pub processes: Vec<ManagedProcess>,
    /// Proxy backend settings
    pub backend: BackendSettings,
}

/// Fixed intervals used by lifecycle sequencing.
///
/// Defaults match production behavior; tests compress them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Pause between VM power-off and the host power action
    pub vm_poweroff_grace: Duration,
    /// Pause between stopping the backend and restarting it with the
    /// patched config, letting the OS release the old instance
    pub backend_restart_pause: Duration,
    /// Delay before the one-shot "ensure VM is running" nudge
    pub vm_watchdog_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            vm_poweroff_grace: Duration::from_secs(10),
            backend_restart_pause: Duration::from_secs(1),
            vm_watchdog_delay: Duration::from_secs(30),
        }
    }
}

/// Host/VM power actions reachable from the fixed power controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerAction {
    /// Poweroff the VM, wait out the grace period, reboot the host
    RebootHost,
    /// Poweroff the VM, wait out the grace period, shut the host down
    ShutdownHost,
    /// Start the VM headless
    StartVm,
    /// Send the VM a graceful power signal
    PoweroffVm,
    /// Poweroff the VM and terminate the panel
    PoweroffVmAndExit,
}

/// The action bound to one control, resolved from its index range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Flip the host's outbound proxy flags
    ToggleSystemProxy,
    /// Switch the backend to profile `i` (index into the profile list)
    SwitchProfile(usize),
    /// Start/stop managed process `i` (index into the process list)
    ToggleProcess(usize),
    /// One of the fixed power controls
    Power(PowerAction),
    /// Terminate the panel without touching any resource
    Exit,
}

/// Tray icon states mirroring the VM lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    VmRunning,
    VmStopped,
}
