//! The panel event loop.
//!
//! A single channel carries both user clicks and completion notices from
//! spawned resource actions, so every control-state mutation happens on one
//! task and the registry needs no locking. A click resolves to an action,
//! the touched resource is marked in flight, the action runs on its own
//! task, and its completion flows back as an event that corrects the
//! control state: flipped on success, left untouched on failure so the
//! user can retry. Power-down sequences run inline and block the loop on
//! purpose; once the host is going down there is nothing left to serve.

use crate::backend::ProfileSwitcher;
use crate::lifecycle::{self, HostAction};
use crate::models::{AppConfig, ControlAction, IconKind, PowerAction, Timing};
use crate::registry::ControlRegistry;
use crate::resource::ResourceController;
use crate::tray::TrayHost;
use crate::error::ResourceError;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything the event loop reacts to, clicks and completions alike.
#[derive(Debug)]
pub enum PanelEvent {
    /// User clicked the control at this index
    Click(usize),
    /// A spawned resource action finished
    ActionDone {
        key: ResourceKey,
        index: usize,
        /// Checked state the control should take if the action succeeded
        intended_checked: bool,
        result: Result<(), ResourceError>,
    },
}

/// Identity of an external resource for in-flight tracking. One action per
/// resource at a time; the backend is a single resource no matter which
/// profile is the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    SystemProxy,
    Backend,
    Vm,
    Process(usize),
}

/// Loop lifecycle. `ShuttingDown` covers the blocking power-down
/// sequence; once the host power action has been issued the loop moves to
/// `Terminated` and stops. There is no way back from either state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Running,
    ShuttingDown,
    Terminated,
}

/// Owns the control registry and serializes all mutations to it.
pub struct EventDispatcher {
    registry: ControlRegistry,
    controller: Arc<ResourceController>,
    switcher: Arc<ProfileSwitcher>,
    host: Arc<dyn TrayHost>,
    config: Arc<AppConfig>,
    timing: Timing,
    tx: mpsc::Sender<PanelEvent>,
    in_flight: HashSet<ResourceKey>,
    state: DispatcherState,
}

impl EventDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: ControlRegistry,
        controller: Arc<ResourceController>,
        switcher: Arc<ProfileSwitcher>,
        host: Arc<dyn TrayHost>,
        config: Arc<AppConfig>,
        timing: Timing,
        tx: mpsc::Sender<PanelEvent>,
    ) -> Self {
        EventDispatcher {
            registry,
            controller,
            switcher,
            host,
            config,
            timing,
            tx,
            in_flight: HashSet::new(),
            state: DispatcherState::Running,
        }
    }

    pub fn registry(&self) -> &ControlRegistry {
        &self.registry
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn in_flight(&self, key: ResourceKey) -> bool {
        self.in_flight.contains(&key)
    }

    /// Drain events until terminated. Returns the dispatcher so callers
    /// (and tests) can inspect the final control state.
    pub async fn run(mut self, mut rx: mpsc::Receiver<PanelEvent>) -> Self {
        while let Some(event) = rx.recv().await {
            match event {
                PanelEvent::Click(index) => self.on_click(index).await,
                PanelEvent::ActionDone {
                    key,
                    index,
                    intended_checked,
                    result,
                } => self.on_action_done(key, index, intended_checked, result),
            }
            if self.state == DispatcherState::Terminated {
                break;
            }
        }
        self
    }

    async fn on_click(&mut self, index: usize) {
        let action = match self.registry.classify(index) {
            Some(action) => action,
            None => {
                log::warn!("Click on unknown control index {}", index);
                return;
            }
        };

        if self.state == DispatcherState::ShuttingDown && action != ControlAction::Exit {
            log::warn!("Shutting down; ignoring click on control {}", index);
            return;
        }

        match action {
            ControlAction::Exit => {
                log::info!("Exit requested");
                // The UI event loop may take the process down with it, so
                // the log file must be synced before quit is signalled.
                log::logger().flush();
                self.host.quit();
                self.state = DispatcherState::Terminated;
            }
            ControlAction::ToggleSystemProxy => self.toggle_system_proxy(index),
            ControlAction::SwitchProfile(i) => self.switch_profile(index, i),
            ControlAction::ToggleProcess(i) => self.toggle_process(index, i),
            ControlAction::Power(power) => self.power(power).await,
        }
    }

    fn begin(&mut self, key: ResourceKey) -> bool {
        if self.in_flight.contains(&key) {
            log::warn!("{:?} already has an action in flight; click dropped", key);
            return false;
        }
        self.in_flight.insert(key);
        true
    }

    fn toggle_system_proxy(&mut self, index: usize) {
        if !self.begin(ResourceKey::SystemProxy) {
            return;
        }
        let intended = !self.registry.is_checked(index);
        let controller = self.controller.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = controller.set_system_proxy(intended);
            let _ = tx
                .send(PanelEvent::ActionDone {
                    key: ResourceKey::SystemProxy,
                    index,
                    intended_checked: intended,
                    result,
                })
                .await;
        });
    }

    fn switch_profile(&mut self, index: usize, profile_index: usize) {
        // Re-selecting the active profile is a no-op; the backend keeps
        // running untouched.
        if self.registry.is_checked(index) {
            log::debug!("Profile {} already active", profile_index);
            return;
        }
        let profile = match self.config.backend.profiles.get(profile_index) {
            Some(p) => p.clone(),
            None => {
                log::warn!("Click resolved to unknown profile {}", profile_index);
                return;
            }
        };
        if !self.begin(ResourceKey::Backend) {
            return;
        }

        // The selection is reflected immediately; a failed switch is
        // logged but the display keeps the user's chosen target.
        self.registry.select_only(index);
        let layout = self.registry.layout();
        for i in layout.profile_start..layout.process_start {
            self.host.set_checked(i, i == index);
        }

        let switcher = self.switcher.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = switcher.switch_to(&profile).await;
            let _ = tx
                .send(PanelEvent::ActionDone {
                    key: ResourceKey::Backend,
                    index,
                    intended_checked: true,
                    result,
                })
                .await;
        });
    }

    fn toggle_process(&mut self, index: usize, process_index: usize) {
        let process = match self.config.processes.get(process_index) {
            Some(p) => p.clone(),
            None => {
                log::warn!("Click resolved to unknown process {}", process_index);
                return;
            }
        };
        if !self.begin(ResourceKey::Process(process_index)) {
            return;
        }
        let intended = !self.registry.is_checked(index);
        let controller = self.controller.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = if intended {
                log::info!("Starting \"{}\"", process.name);
                controller.start_process(&process)
            } else {
                log::info!("Stopping \"{}\"", process.name);
                controller.stop_process(&process.name).await
            };
            let _ = tx
                .send(PanelEvent::ActionDone {
                    key: ResourceKey::Process(process_index),
                    index,
                    intended_checked: intended,
                    result,
                })
                .await;
        });
    }

    async fn power(&mut self, action: PowerAction) {
        match action {
            PowerAction::StartVm => {
                if !self.begin(ResourceKey::Vm) {
                    return;
                }
                let controller = self.controller.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    log::info!("Starting VM");
                    let result = controller.start_vm();
                    let _ = tx
                        .send(PanelEvent::ActionDone {
                            key: ResourceKey::Vm,
                            index: 0,
                            intended_checked: true,
                            result,
                        })
                        .await;
                });
            }
            PowerAction::PoweroffVm => {
                if !self.begin(ResourceKey::Vm) {
                    return;
                }
                let controller = self.controller.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    log::info!("Powering off VM");
                    let result = controller.poweroff_vm();
                    let _ = tx
                        .send(PanelEvent::ActionDone {
                            key: ResourceKey::Vm,
                            index: 0,
                            intended_checked: false,
                            result,
                        })
                        .await;
                });
            }
            PowerAction::PoweroffVmAndExit => {
                // The VM gets its power signal and the panel leaves;
                // managed processes and the backend keep running.
                log::info!("Powering off VM and exiting");
                if let Err(e) = self.controller.poweroff_vm() {
                    log::warn!("VM poweroff: {}", e);
                }
                self.host.set_icon(IconKind::VmStopped);
                log::logger().flush();
                self.host.quit();
                self.state = DispatcherState::Terminated;
            }
            PowerAction::RebootHost | PowerAction::ShutdownHost => {
                let host_action = if action == PowerAction::RebootHost {
                    HostAction::Reboot
                } else {
                    HostAction::Shutdown
                };
                self.state = DispatcherState::ShuttingDown;
                lifecycle::power_down(&self.controller, &self.config, self.timing, host_action)
                    .await;
                // The host is going down; nothing left to serve.
                log::logger().flush();
                self.host.quit();
                self.state = DispatcherState::Terminated;
            }
        }
    }

    fn on_action_done(
        &mut self,
        key: ResourceKey,
        index: usize,
        intended_checked: bool,
        result: Result<(), ResourceError>,
    ) {
        self.in_flight.remove(&key);

        match (key, result) {
            (ResourceKey::SystemProxy, Ok(())) => {
                log::info!(
                    "System proxy {}",
                    if intended_checked { "enabled" } else { "disabled" }
                );
                self.registry.set_checked(index, intended_checked);
                self.host.set_checked(index, intended_checked);
            }
            (ResourceKey::SystemProxy, Err(e)) => {
                log::error!("System proxy toggle failed: {}", e);
            }
            (ResourceKey::Backend, Ok(())) => {
                log::info!("Backend switch complete");
            }
            (ResourceKey::Backend, Err(e)) => {
                log::error!("Backend switch failed: {}", e);
            }
            (ResourceKey::Process(_), Ok(())) => {
                self.registry.set_checked(index, intended_checked);
                self.host.set_checked(index, intended_checked);
            }
            (ResourceKey::Process(i), Err(e)) => {
                log::error!("Process {} action failed: {}", i, e);
            }
            (ResourceKey::Vm, Ok(())) => {
                self.host.set_icon(if intended_checked {
                    IconKind::VmRunning
                } else {
                    IconKind::VmStopped
                });
            }
            (ResourceKey::Vm, Err(e)) => {
                log::error!("VM power action failed: {}", e);
            }
        }
    }
}
