//! trayctl: a tray control panel for a VM-hosted proxy setup.
//!
//! The panel keeps four externally-owned resources in a known state from a
//! tray menu: a VirtualBox VM, a set of managed OS processes, a proxy
//! backend process with switchable upstream profiles, and the host's
//! system proxy flags.
//!
//! The system is organized into functional modules:
//! - **error**: error type hierarchy
//! - **models**: core data structures and the control action vocabulary
//! - **config**: startup config loading and validation
//! - **system**: OS collaborator traits and their production impls
//! - **resource**: uniform start/stop/query over external resources
//! - **backend**: backend config document patching and profile switching
//! - **registry**: the ordered control list and its index layout
//! - **dispatcher**: the single event loop serializing all state changes
//! - **lifecycle**: auto-start, VM watchdog, and power-down sequencing
//! - **log_sink**: channel-decoupled file logging
//! - **tray**: tray UI seam and platform hosts

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod log_sink;
pub mod models;
pub mod registry;
pub mod resource;
pub mod system;
pub mod tray;

pub use backend::{BackendDocument, ProfileSwitcher};
pub use config::load_config_from_file;
pub use dispatcher::{DispatcherState, EventDispatcher, PanelEvent, ResourceKey};
pub use error::{ConfigError, PatchError, ResourceError};
pub use lifecycle::HostAction;
pub use log_sink::LogSink;
pub use models::{
    AppConfig, BackendSettings, ControlAction, IconKind, ManagedProcess, PowerAction,
    ProxyProfile, Timing,
};
pub use registry::{Control, ControlLayout, ControlRegistry};
pub use resource::ResourceController;
pub use tray::{HeadlessHost, TrayHost};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(VERSION, "0.1.0");
    }

    #[test]
    fn test_reexports_accessible() {
        let _ = Timing::default();
        let _ = DispatcherState::Running;
        let _ = IconKind::VmStopped;
    }
}
