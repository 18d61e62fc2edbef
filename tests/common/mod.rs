//! Shared fakes and a panel harness for integration tests.
//!
//! The harness wires a real dispatcher, registry and profile switcher to
//! recording fakes for every OS seam, with timings compressed to
//! milliseconds so sequences finish quickly.

// Not every test binary uses every fake.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use trayctl::backend::{BackendDocument, ProfileSwitcher};
use trayctl::dispatcher::{EventDispatcher, PanelEvent};
use trayctl::error::ResourceError;
use trayctl::models::{
    AppConfig, BackendSettings, IconKind, ManagedProcess, ProxyProfile, Timing,
};
use trayctl::registry::ControlRegistry;
use trayctl::resource::ResourceController;
use trayctl::system::{CommandRunner, ProcessLister, ProxySettingsStore};
use trayctl::tray::TrayHost;

/// Records every spawned command; configured paths fail.
pub struct RecordingRunner {
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
    pub fail_paths: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        RecordingRunner {
            calls: Mutex::new(Vec::new()),
            fail_paths: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_path(&self, path: &str) {
        self.fail_paths.lock().unwrap().push(path.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, path: &str, args: &[String]) -> Result<(), ResourceError> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_string(), args.to_vec()));
        if self.fail_paths.lock().unwrap().iter().any(|p| p == path) {
            return Err(ResourceError::CommandFailed {
                cmd: path.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    fn spawn(&self, path: &str, args: &[String]) -> Result<(), ResourceError> {
        self.record(path, args)
    }

    async fn spawn_and_wait(&self, path: &str, args: &[String]) -> Result<(), ResourceError> {
        self.record(path, args)
    }
}

/// Process list the test mutates through a shared handle.
pub struct SharedLister {
    pub names: Arc<Mutex<Vec<String>>>,
}

impl ProcessLister for SharedLister {
    fn list_process_names(&self) -> Result<Vec<String>, ResourceError> {
        Ok(self.names.lock().unwrap().clone())
    }
}

/// Records proxy flag writes in order; can be told to reject everything.
pub struct RecordingProxyStore {
    pub writes: Mutex<Vec<String>>,
    pub fail: Mutex<bool>,
}

impl RecordingProxyStore {
    pub fn new() -> Self {
        RecordingProxyStore {
            writes: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
        }
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn write(&self, entry: String) -> Result<(), ResourceError> {
        if *self.fail.lock().unwrap() {
            return Err(ResourceError::ProxyFlagFailed {
                key: entry,
                reason: "injected failure".to_string(),
            });
        }
        self.writes.lock().unwrap().push(entry);
        Ok(())
    }
}

impl ProxySettingsStore for RecordingProxyStore {
    fn set_string(&self, key: &str, value: &str) -> Result<(), ResourceError> {
        self.write(format!("{}={}", key, value))
    }

    fn set_dword(&self, key: &str, value: u32) -> Result<(), ResourceError> {
        self.write(format!("{}={}", key, value))
    }

    fn broadcast_change(&self) -> Result<(), ResourceError> {
        self.write("broadcast".to_string())
    }
}

/// Records every UI mutation the dispatcher issues.
pub struct RecordingHost {
    pub checked: Mutex<Vec<(usize, bool)>>,
    pub icons: Mutex<Vec<IconKind>>,
    pub quit_called: Mutex<bool>,
}

impl RecordingHost {
    pub fn new() -> Self {
        RecordingHost {
            checked: Mutex::new(Vec::new()),
            icons: Mutex::new(Vec::new()),
            quit_called: Mutex::new(false),
        }
    }

    pub fn icons(&self) -> Vec<IconKind> {
        self.icons.lock().unwrap().clone()
    }

    pub fn was_quit(&self) -> bool {
        *self.quit_called.lock().unwrap()
    }
}

impl TrayHost for RecordingHost {
    fn set_checked(&self, index: usize, checked: bool) {
        self.checked.lock().unwrap().push((index, checked));
    }

    fn set_icon(&self, kind: IconKind) {
        self.icons.lock().unwrap().push(kind);
    }

    fn quit(&self) {
        *self.quit_called.lock().unwrap() = true;
    }
}

/// Timing compressed so sequences complete within a test run.
pub fn fast_timing() -> Timing {
    Timing {
        vm_poweroff_grace: Duration::from_millis(5),
        backend_restart_pause: Duration::from_millis(5),
        vm_watchdog_delay: Duration::from_millis(5),
    }
}

/// Two profiles, two managed processes, backend rooted at `dir`.
pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        vm_name: "Arch".to_string(),
        vm_process: "VBoxHeadless.exe".to_string(),
        vbox_manage: "VBoxManage".to_string(),
        proxy_server: "127.0.0.1:3128".to_string(),
        proxy_bypass: "<local>".to_string(),
        processes: vec![
            ManagedProcess {
                name: "agent.exe".to_string(),
                path: "C:\\tools\\agent.exe".to_string(),
                args: vec![],
                auto_start: false,
            },
            ManagedProcess {
                name: "relay.exe".to_string(),
                path: "C:\\tools\\relay.exe".to_string(),
                args: vec![],
                auto_start: false,
            },
        ],
        backend: BackendSettings {
            dir: dir.to_string_lossy().into_owned(),
            exe: "wv2ray.exe".to_string(),
            config_file: "backend.json".to_string(),
            profiles: vec![
                ProxyProfile {
                    address: "10.0.0.1".to_string(),
                    port: 443,
                    id: "id-one".to_string(),
                },
                ProxyProfile {
                    address: "10.0.0.2".to_string(),
                    port: 8443,
                    id: "id-two".to_string(),
                },
            ],
        },
    }
}

/// Backend document with the first profile active plus fields outside the
/// patched path.
pub fn test_backend_doc() -> serde_json::Value {
    json!({
        "log": {"loglevel": "warning"},
        "inbounds": [{"port": 3128, "protocol": "http"}],
        "outbounds": [{
            "protocol": "vmess",
            "settings": {
                "vnext": [{
                    "address": "10.0.0.1",
                    "port": 443,
                    "users": [{"id": "id-one", "alterId": 0}]
                }]
            }
        }]
    })
}

/// A fully wired panel over recording fakes.
pub struct Harness {
    pub dispatcher: EventDispatcher,
    pub tx: mpsc::Sender<PanelEvent>,
    pub rx: mpsc::Receiver<PanelEvent>,
    pub runner: Arc<RecordingRunner>,
    pub proxy: Arc<RecordingProxyStore>,
    pub host: Arc<RecordingHost>,
    pub process_names: Arc<Mutex<Vec<String>>>,
    pub exit_index: usize,
}

pub fn build_harness(dir: &Path) -> Harness {
    let config = test_config(dir);
    let backend_path = dir.join(&config.backend.config_file);
    std::fs::write(
        &backend_path,
        serde_json::to_string_pretty(&test_backend_doc()).unwrap(),
    )
    .unwrap();

    let runner = Arc::new(RecordingRunner::new());
    let proxy = Arc::new(RecordingProxyStore::new());
    let host = Arc::new(RecordingHost::new());
    let process_names = Arc::new(Mutex::new(Vec::new()));

    let controller = Arc::new(ResourceController::new(
        runner.clone(),
        Arc::new(SharedLister {
            names: process_names.clone(),
        }),
        proxy.clone(),
        config.vbox_manage.clone(),
        config.vm_name.clone(),
        config.proxy_server.clone(),
        config.proxy_bypass.clone(),
    ));

    let document = BackendDocument::load(&backend_path).unwrap();
    let active = document.active_address().unwrap();
    let timing = fast_timing();

    let switcher = Arc::new(ProfileSwitcher::new(
        controller.clone(),
        Arc::new(tokio::sync::Mutex::new(document)),
        &config.backend.dir,
        &config.backend.exe,
        &config.backend.config_file,
        timing,
    ));

    let registry = ControlRegistry::build(&config, &active, &[false, false]);
    let exit_index = registry.exit_index();
    let (tx, rx) = mpsc::channel(64);

    let dispatcher = EventDispatcher::new(
        registry,
        controller,
        switcher,
        host.clone(),
        Arc::new(config),
        timing,
        tx.clone(),
    );

    Harness {
        dispatcher,
        tx,
        rx,
        runner,
        proxy,
        host,
        process_names,
        exit_index,
    }
}
