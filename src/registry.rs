//! Ordered control list and its index layout.
//!
//! Controls are built exactly once at startup, in a fixed group order:
//! the proxy toggle, one control per backend profile, one per managed
//! process, then the fixed power/exit tail. Index ranges are contiguous
//! per group and never change for the life of the process, which is what
//! lets the dispatcher classify a click by integer range instead of
//! identity. The checked flags held here are the single source of truth
//! for what the UI displays; the dispatcher corrects them explicitly after
//! every action.

use crate::models::{AppConfig, ControlAction, PowerAction};

/// Fixed power/exit tail, in menu order.
const POWER_TAIL: [(PowerAction, &str, &str); 5] = [
    (PowerAction::RebootHost, "Reboot PC", "Reboot the PC"),
    (PowerAction::ShutdownHost, "Shutdown PC", "Shutdown the PC"),
    (PowerAction::StartVm, "Start VM", "Start the VM"),
    (PowerAction::PoweroffVm, "Poweroff VM", "Poweroff the VM"),
    (
        PowerAction::PoweroffVmAndExit,
        "Poweroff VM and Exit",
        "Poweroff the VM and exit",
    ),
];

/// One interactive, checkable menu entry with a stable index.
#[derive(Debug, Clone)]
pub struct Control {
    pub index: usize,
    pub label: String,
    pub tooltip: String,
    pub checked: bool,
    /// The proxy toggle, profile and process entries carry a check mark;
    /// the power/exit tail renders plain.
    pub checkable: bool,
    pub action: ControlAction,
}

/// Group boundaries, computed once at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLayout {
    /// Index of the system proxy toggle (always 0)
    pub proxy_toggle: usize,
    /// First profile control
    pub profile_start: usize,
    /// First managed-process control
    pub process_start: usize,
    /// First control of the fixed power/exit tail
    pub power_start: usize,
    /// Total number of controls
    pub len: usize,
}

/// The ordered control list. Built once; mutated only through the checked
/// state accessors.
#[derive(Debug, Clone)]
pub struct ControlRegistry {
    controls: Vec<Control>,
    layout: ControlLayout,
}

impl ControlRegistry {
    /// Deterministic one-pass construction from configuration.
    ///
    /// `active_address` decides which profile control starts checked;
    /// `running` carries the live running state per managed process, in
    /// config order (a process control starts checked when it is flagged
    /// auto-start or already running).
    pub fn build(config: &AppConfig, active_address: &str, running: &[bool]) -> Self {
        let mut controls = Vec::new();

        controls.push(Control {
            index: 0,
            label: "System Proxy".to_string(),
            tooltip: "Enable the system proxy".to_string(),
            checked: false,
            checkable: true,
            action: ControlAction::ToggleSystemProxy,
        });

        let profile_start = controls.len();
        for (i, profile) in config.backend.profiles.iter().enumerate() {
            controls.push(Control {
                index: profile_start + i,
                label: format!("Profile: {}", profile.address),
                tooltip: format!("Switch backend to {}", profile.address),
                checked: profile.address == active_address,
                checkable: true,
                action: ControlAction::SwitchProfile(i),
            });
        }

        let process_start = controls.len();
        for (i, process) in config.processes.iter().enumerate() {
            let is_running = running.get(i).copied().unwrap_or(false);
            controls.push(Control {
                index: process_start + i,
                label: format!("Proc: {}", process.name),
                tooltip: format!("Start or stop {}", process.name),
                checked: process.auto_start || is_running,
                checkable: true,
                action: ControlAction::ToggleProcess(i),
            });
        }

        let power_start = controls.len();
        for (offset, (action, label, tooltip)) in POWER_TAIL.iter().enumerate() {
            controls.push(Control {
                index: power_start + offset,
                label: label.to_string(),
                tooltip: tooltip.to_string(),
                checked: false,
                checkable: false,
                action: ControlAction::Power(*action),
            });
        }

        controls.push(Control {
            index: controls.len(),
            label: "Exit".to_string(),
            tooltip: "Exit the whole app".to_string(),
            checked: false,
            checkable: false,
            action: ControlAction::Exit,
        });

        let layout = ControlLayout {
            proxy_toggle: 0,
            profile_start,
            process_start,
            power_start,
            len: controls.len(),
        };

        ControlRegistry { controls, layout }
    }

    pub fn layout(&self) -> ControlLayout {
        self.layout
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Index of the Exit control, the last entry by construction.
    pub fn exit_index(&self) -> usize {
        self.layout.len - 1
    }

    /// Resolve a control index to its bound action by group range.
    pub fn classify(&self, index: usize) -> Option<ControlAction> {
        let l = self.layout;
        if index >= l.len {
            return None;
        }
        if index == l.proxy_toggle {
            return Some(ControlAction::ToggleSystemProxy);
        }
        if index < l.process_start {
            return Some(ControlAction::SwitchProfile(index - l.profile_start));
        }
        if index < l.power_start {
            return Some(ControlAction::ToggleProcess(index - l.process_start));
        }
        if index < l.len - 1 {
            return Some(ControlAction::Power(POWER_TAIL[index - l.power_start].0));
        }
        Some(ControlAction::Exit)
    }

    pub fn is_checked(&self, index: usize) -> bool {
        self.controls.get(index).map(|c| c.checked).unwrap_or(false)
    }

    pub fn set_checked(&mut self, index: usize, checked: bool) {
        if let Some(control) = self.controls.get_mut(index) {
            control.checked = checked;
        }
    }

    /// Check `index` and uncheck every other control in the profile group.
    /// Upholds the exactly-one-active invariant for profile controls.
    pub fn select_only(&mut self, index: usize) {
        let l = self.layout;
        for i in l.profile_start..l.process_start {
            self.controls[i].checked = i == index;
        }
    }

    /// Index of the sole checked profile control, if any.
    pub fn checked_profile(&self) -> Option<usize> {
        let l = self.layout;
        (l.profile_start..l.process_start).find(|&i| self.controls[i].checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BackendSettings, ManagedProcess, ProxyProfile};

    fn config_with(n_processes: usize, n_profiles: usize) -> AppConfig {
        AppConfig {
            vm_name: "Arch".to_string(),
            vm_process: "VBoxHeadless.exe".to_string(),
            vbox_manage: "VBoxManage".to_string(),
            proxy_server: "127.0.0.1:3128".to_string(),
            proxy_bypass: "<local>".to_string(),
            processes: (0..n_processes)
                .map(|i| ManagedProcess {
                    name: format!("proc{}.exe", i),
                    path: format!("C:\\tools\\proc{}.exe", i),
                    args: vec![],
                    auto_start: false,
                })
                .collect(),
            backend: BackendSettings {
                dir: "C:\\backend".to_string(),
                exe: "wv2ray.exe".to_string(),
                config_file: "config.json".to_string(),
                profiles: (0..n_profiles)
                    .map(|i| ProxyProfile {
                        address: format!("10.0.0.{}", i + 1),
                        port: 443,
                        id: format!("id-{}", i),
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn test_build_layout_counts() {
        let cfg = config_with(2, 3);
        let reg = ControlRegistry::build(&cfg, "", &[false, false]);

        // 1 toggle + 3 profiles + 2 processes + 5 power + exit
        assert_eq!(reg.len(), 12);
        let l = reg.layout();
        assert_eq!(l.proxy_toggle, 0);
        assert_eq!(l.profile_start, 1);
        assert_eq!(l.process_start, 4);
        assert_eq!(l.power_start, 6);
        assert_eq!(reg.exit_index(), 11);
    }

    #[test]
    fn test_classify_covers_every_index() {
        let cfg = config_with(2, 2);
        let reg = ControlRegistry::build(&cfg, "", &[false, false]);

        assert_eq!(reg.classify(0), Some(ControlAction::ToggleSystemProxy));
        assert_eq!(reg.classify(1), Some(ControlAction::SwitchProfile(0)));
        assert_eq!(reg.classify(2), Some(ControlAction::SwitchProfile(1)));
        assert_eq!(reg.classify(3), Some(ControlAction::ToggleProcess(0)));
        assert_eq!(reg.classify(4), Some(ControlAction::ToggleProcess(1)));
        assert_eq!(
            reg.classify(5),
            Some(ControlAction::Power(PowerAction::RebootHost))
        );
        assert_eq!(
            reg.classify(9),
            Some(ControlAction::Power(PowerAction::PoweroffVmAndExit))
        );
        assert_eq!(reg.classify(10), Some(ControlAction::Exit));
        assert_eq!(reg.classify(11), None);
    }

    #[test]
    fn test_active_profile_starts_checked() {
        let cfg = config_with(0, 3);
        let reg = ControlRegistry::build(&cfg, "10.0.0.2", &[]);

        assert!(!reg.is_checked(1));
        assert!(reg.is_checked(2));
        assert!(!reg.is_checked(3));
        assert_eq!(reg.checked_profile(), Some(2));
    }

    #[test]
    fn test_no_profile_checked_when_address_unknown() {
        let cfg = config_with(0, 2);
        let reg = ControlRegistry::build(&cfg, "203.0.113.9", &[]);
        assert_eq!(reg.checked_profile(), None);
    }

    #[test]
    fn test_process_checked_state_from_autostart_or_running() {
        let mut cfg = config_with(3, 0);
        cfg.processes[1].auto_start = true;
        let reg = ControlRegistry::build(&cfg, "", &[false, false, true]);

        let l = reg.layout();
        assert!(!reg.is_checked(l.process_start));
        assert!(reg.is_checked(l.process_start + 1));
        assert!(reg.is_checked(l.process_start + 2));
    }

    #[test]
    fn test_select_only_enforces_single_checked() {
        let cfg = config_with(0, 3);
        let mut reg = ControlRegistry::build(&cfg, "10.0.0.1", &[]);

        reg.select_only(3);
        assert_eq!(reg.checked_profile(), Some(3));
        assert!(!reg.is_checked(1));
        assert!(!reg.is_checked(2));

        reg.select_only(1);
        assert_eq!(reg.checked_profile(), Some(1));
    }

    #[test]
    fn test_empty_config_still_has_fixed_controls() {
        let cfg = config_with(0, 0);
        let reg = ControlRegistry::build(&cfg, "", &[]);

        // toggle + 5 power + exit
        assert_eq!(reg.len(), 7);
        let l = reg.layout();
        assert_eq!(l.profile_start, 1);
        assert_eq!(l.process_start, 1);
        assert_eq!(l.power_start, 1);
        assert_eq!(reg.classify(6), Some(ControlAction::Exit));
    }

    #[test]
    fn test_set_checked_out_of_range_is_ignored() {
        let cfg = config_with(0, 0);
        let mut reg = ControlRegistry::build(&cfg, "", &[]);
        reg.set_checked(99, true);
        assert!(!reg.is_checked(99));
    }
}
