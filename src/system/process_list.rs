//! Live OS process list queries.
//!
//! The running-predicate of a managed process is never cached; every check
//! re-reads the process table.

use crate::error::ResourceError;
use std::sync::Mutex;
use sysinfo::{ProcessesToUpdate, System};

/// Seam for asking the OS which processes exist right now.
pub trait ProcessLister: Send + Sync {
    /// Return the current process image names. An empty list is a valid
    /// answer; only an inability to query at all is an error.
    fn list_process_names(&self) -> Result<Vec<String>, ResourceError>;
}

/// Production lister backed by `sysinfo`. The `System` handle is reused
/// between refreshes, as sysinfo recommends.
pub struct SysinfoProcessLister {
    system: Mutex<System>,
}

impl SysinfoProcessLister {
    pub fn new() -> Self {
        SysinfoProcessLister {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProcessLister {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLister for SysinfoProcessLister {
    fn list_process_names(&self) -> Result<Vec<String>, ResourceError> {
        let mut system = self
            .system
            .lock()
            .map_err(|e| ResourceError::QueryFailed(format!("process table lock poisoned: {}", e)))?;

        system.refresh_processes(ProcessesToUpdate::All, true);

        Ok(system
            .processes()
            .values()
            .map(|p| p.name().to_string_lossy().into_owned())
            .collect())
    }
}
