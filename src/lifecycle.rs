//! Startup and shutdown sequencing around the VM and managed processes.
//!
//! Three concerns live here: the one-time auto-start pass that brings
//! flagged processes up, the one-shot watchdog that nudges the VM if it is
//! still down after a settling delay, and the ordered power-down sequence
//! shared by the reboot and shutdown controls.

use crate::models::{AppConfig, IconKind, Timing};
use crate::resource::ResourceController;
use crate::tray::TrayHost;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What happens to the host after the VM has been powered down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Reboot,
    Shutdown,
}

/// Ordered power-down: stop the backend and every managed process, send
/// the VM its graceful power signal, wait out the grace period so the
/// guest can flush, then issue the host action.
///
/// Every step degrades to log-and-continue. Once the user has asked for a
/// reboot the worst outcome is a reboot with an unclean guest, which the
/// grace period exists to make unlikely; refusing to proceed would strand
/// the host instead.
pub async fn power_down(
    controller: &ResourceController,
    config: &AppConfig,
    timing: Timing,
    host_action: HostAction,
) {
    log::info!("Power-down sequence started ({:?})", host_action);

    if let Err(e) = controller.stop_process(&config.backend.exe).await {
        log::warn!("Backend stop during power-down: {}", e);
    }
    for process in &config.processes {
        if let Err(e) = controller.stop_process(&process.name).await {
            log::warn!("Stop \"{}\" during power-down: {}", process.name, e);
        }
    }

    if let Err(e) = controller.poweroff_vm() {
        log::warn!("VM poweroff during power-down: {}", e);
    }
    tokio::time::sleep(timing.vm_poweroff_grace).await;

    let result = match host_action {
        HostAction::Reboot => controller.reboot_host(),
        HostAction::Shutdown => controller.shutdown_host(),
    };
    if let Err(e) = result {
        log::error!("Host power action failed: {}", e);
    }
}

/// One-time startup pass: start every process flagged auto-start that is
/// not already running.
pub fn spawn_auto_start(
    controller: Arc<ResourceController>,
    config: Arc<AppConfig>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for process in config.processes.iter().filter(|p| p.auto_start) {
            if controller.is_running(&process.name) {
                log::info!("\"{}\" already running", process.name);
                continue;
            }
            log::info!("Auto-starting \"{}\"", process.name);
            if let Err(e) = controller.start_process(process) {
                log::error!("Auto-start \"{}\" failed: {}", process.name, e);
            }
        }
    })
}

/// One-shot VM nudge: after the settling delay, confirm the VM's worker
/// process exists and start the VM if it does not. Fires once; a VM the
/// user powers off later stays off.
pub fn spawn_vm_watchdog(
    controller: Arc<ResourceController>,
    config: Arc<AppConfig>,
    host: Arc<dyn TrayHost>,
    timing: Timing,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timing.vm_watchdog_delay).await;
        if controller.is_running(&config.vm_process) {
            host.set_icon(IconKind::VmRunning);
            return;
        }
        log::info!("VM \"{}\" not up after settling delay, starting it", config.vm_name);
        match controller.start_vm() {
            Ok(()) => host.set_icon(IconKind::VmRunning),
            Err(e) => log::error!("VM watchdog start failed: {}", e),
        }
    })
}
