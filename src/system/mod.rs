//! OS abstraction layer: the collaborator traits the core calls through,
//! plus their production implementations.
//!
//! The core never shells out or touches the registry directly; everything
//! goes through `CommandRunner`, `ProcessLister` and `ProxySettingsStore`
//! so tests can substitute recording fakes.

pub mod command;
pub mod process_list;
pub mod proxy;

pub use command::{CommandRunner, TokioCommandRunner};
pub use process_list::{ProcessLister, SysinfoProcessLister};
pub use proxy::ProxySettingsStore;

#[cfg(windows)]
pub use proxy::WindowsProxyStore;

#[cfg(not(windows))]
pub use proxy::NoopProxyStore;
