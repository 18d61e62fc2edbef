use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use trayctl::backend::{BackendDocument, ProfileSwitcher};
use trayctl::dispatcher::{EventDispatcher, PanelEvent};
use trayctl::lifecycle;
use trayctl::log_sink::{self, LogSink};
use trayctl::models::Timing;
use trayctl::registry::ControlRegistry;
use trayctl::resource::ResourceController;
use trayctl::system::{SysinfoProcessLister, TokioCommandRunner};
use trayctl::tray::TrayHost;

/// Channel depth for clicks plus completion notices. Clicks are
/// human-paced; this never fills in practice.
const EVENT_CHANNEL_CAPACITY: usize = 64;

fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("config.json")))
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

fn fatal(sink: &LogSink, message: String) -> anyhow::Error {
    log::error!("{}", message);
    sink.flush_and_wait();
    anyhow::anyhow!(message)
}

fn main() -> anyhow::Result<()> {
    // Logging first; everything after this reports through the sink.
    let sink = LogSink::new(log_sink::default_log_path());
    let sink = match sink.install(log::LevelFilter::Info) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("logger installation failed: {}", e);
            return Err(e.into());
        }
    };
    log_sink::write_session_separator(&sink);
    log::info!("trayctl {} starting", trayctl::VERSION);

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = trayctl::config::load_config_from_file(&config_path)
        .map_err(|e| fatal(&sink, format!("Cannot start: {}", e)))?;
    let config = Arc::new(config);
    let timing = Timing::default();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let controller = Arc::new(build_controller(&config));

    let backend_dir = Path::new(&config.backend.dir);
    let backend_config_path = backend_dir.join(&config.backend.config_file);
    let document = BackendDocument::load(&backend_config_path)
        .map_err(|e| fatal(&sink, format!("Cannot start: {}", e)))?;
    let active_address = match document.active_address() {
        Ok(address) => address,
        Err(e) => {
            log::warn!("No active backend address: {}", e);
            String::new()
        }
    };

    // Known state at startup: proxy flags off until the user enables them.
    if let Err(e) = controller.set_system_proxy(false) {
        log::warn!("Startup proxy disable: {}", e);
    }

    let running: Vec<bool> = config
        .processes
        .iter()
        .map(|p| controller.is_running(&p.name))
        .collect();
    let registry = ControlRegistry::build(&config, &active_address, &running);

    let switcher = Arc::new(ProfileSwitcher::new(
        controller.clone(),
        Arc::new(tokio::sync::Mutex::new(document)),
        &config.backend.dir,
        &config.backend.exe,
        &config.backend.config_file,
        timing,
    ));

    let (tx, rx) = mpsc::channel::<PanelEvent>(EVENT_CHANNEL_CAPACITY);

    run_panel(
        runtime, registry, controller, switcher, config, timing, tx, rx, sink,
    )
}

fn build_controller(config: &trayctl::models::AppConfig) -> ResourceController {
    #[cfg(windows)]
    let proxy_store = Arc::new(trayctl::system::WindowsProxyStore);
    #[cfg(not(windows))]
    let proxy_store = Arc::new(trayctl::system::NoopProxyStore);

    ResourceController::new(
        Arc::new(TokioCommandRunner),
        Arc::new(SysinfoProcessLister::new()),
        proxy_store,
        config.vbox_manage.clone(),
        config.vm_name.clone(),
        config.proxy_server.clone(),
        config.proxy_bypass.clone(),
    )
}

#[allow(clippy::too_many_arguments)]
#[cfg(windows)]
fn run_panel(
    runtime: tokio::runtime::Runtime,
    registry: ControlRegistry,
    controller: Arc<ResourceController>,
    switcher: Arc<ProfileSwitcher>,
    config: Arc<trayctl::models::AppConfig>,
    timing: Timing,
    tx: mpsc::Sender<PanelEvent>,
    rx: mpsc::Receiver<PanelEvent>,
    _sink: LogSink,
) -> anyhow::Result<()> {
    // The UI event loop owns the main thread; the dispatcher runs on the
    // runtime and reaches the menu through the marshalling host.
    let (event_loop, host) = trayctl::tray::create_tray();
    let host: Arc<dyn TrayHost> = Arc::new(host);
    let menu_registry = registry.clone();

    let _guard = runtime.enter();
    lifecycle::spawn_auto_start(controller.clone(), config.clone());
    lifecycle::spawn_vm_watchdog(controller.clone(), config.clone(), host.clone(), timing);

    let dispatcher = EventDispatcher::new(
        registry, controller, switcher, host, config, timing, tx.clone(),
    );
    runtime.spawn(dispatcher.run(rx));

    trayctl::tray::run_tray(event_loop, &menu_registry, tx)
}

#[allow(clippy::too_many_arguments)]
#[cfg(not(windows))]
fn run_panel(
    runtime: tokio::runtime::Runtime,
    registry: ControlRegistry,
    controller: Arc<ResourceController>,
    switcher: Arc<ProfileSwitcher>,
    config: Arc<trayctl::models::AppConfig>,
    timing: Timing,
    tx: mpsc::Sender<PanelEvent>,
    rx: mpsc::Receiver<PanelEvent>,
    sink: LogSink,
) -> anyhow::Result<()> {
    // No tray off-Windows; run headless and exit on Ctrl-C.
    let host: Arc<dyn TrayHost> = Arc::new(trayctl::tray::HeadlessHost);
    let exit_index = registry.exit_index();

    let dispatcher = EventDispatcher::new(
        registry,
        controller.clone(),
        switcher,
        host.clone(),
        config.clone(),
        timing,
        tx.clone(),
    );

    runtime.block_on(async move {
        lifecycle::spawn_auto_start(controller.clone(), config.clone());
        lifecycle::spawn_vm_watchdog(controller, config, host, timing);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(PanelEvent::Click(exit_index)).await;
            }
        });
        dispatcher.run(rx).await;
    });

    sink.flush_and_wait();
    Ok(())
}
