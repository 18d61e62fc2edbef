//! Tray UI seam.
//!
//! The dispatcher never talks to a tray library directly; it drives a
//! `TrayHost` and receives clicks as plain control indexes. On Windows the
//! host is a real tray icon whose menu mirrors the control registry; the
//! menu machinery is not `Send`, so the production impl marshals every
//! mutation onto the UI event loop through a command channel. Elsewhere a
//! headless host logs the mutations, which keeps the panel runnable and
//! testable off-platform.

use crate::models::IconKind;

/// What the dispatcher is allowed to do to the tray UI.
pub trait TrayHost: Send + Sync {
    /// Reflect a control's checked state in its menu entry.
    fn set_checked(&self, index: usize, checked: bool);

    /// Swap the tray icon to mirror the VM lifecycle.
    fn set_icon(&self, kind: IconKind);

    /// Tear the tray down and end the UI event loop.
    fn quit(&self);
}

/// Host that renders nothing. Used on platforms without a tray and in
/// dispatcher tests that only care about the state machine.
pub struct HeadlessHost;

impl TrayHost for HeadlessHost {
    fn set_checked(&self, index: usize, checked: bool) {
        log::debug!("control {} checked={}", index, checked);
    }

    fn set_icon(&self, kind: IconKind) {
        log::debug!("icon -> {:?}", kind);
    }

    fn quit(&self) {}
}

#[cfg(windows)]
pub use windows_impl::{create_tray, run_tray, TrayCommand, WindowsTrayHost};

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use crate::dispatcher::PanelEvent;
    use crate::registry::ControlRegistry;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy};
    use tokio::sync::mpsc;
    use tray_icon::menu::{CheckMenuItem, Menu, MenuEvent, MenuItem};
    use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

    /// Mutations marshalled onto the UI thread, plus menu clicks routed
    /// back through the loop so they wake it immediately.
    #[derive(Debug, Clone)]
    pub enum TrayCommand {
        SetChecked { index: usize, checked: bool },
        SetIcon(IconKind),
        MenuClick(tray_icon::menu::MenuId),
        Quit,
    }

    /// Dispatcher-side handle. Forwards every mutation to the UI event
    /// loop; the loop owns the actual menu items.
    pub struct WindowsTrayHost {
        proxy: EventLoopProxy<TrayCommand>,
    }

    /// Create the UI event loop and its dispatcher-side handle. Must run
    /// on the main thread; `run_tray` consumes the returned loop there.
    pub fn create_tray() -> (EventLoop<TrayCommand>, WindowsTrayHost) {
        let event_loop: EventLoop<TrayCommand> = EventLoopBuilder::with_user_event().build();
        let host = WindowsTrayHost {
            proxy: event_loop.create_proxy(),
        };
        (event_loop, host)
    }

    impl TrayHost for WindowsTrayHost {
        fn set_checked(&self, index: usize, checked: bool) {
            let _ = self.proxy.send_event(TrayCommand::SetChecked { index, checked });
        }

        fn set_icon(&self, kind: IconKind) {
            let _ = self.proxy.send_event(TrayCommand::SetIcon(kind));
        }

        fn quit(&self) {
            let _ = self.proxy.send_event(TrayCommand::Quit);
        }
    }

    enum Entry {
        Check(CheckMenuItem),
        Plain(MenuItem),
    }

    fn icon_path(kind: IconKind) -> PathBuf {
        let name = match kind {
            IconKind::VmRunning => "start.ico",
            IconKind::VmStopped => "stop.ico",
        };
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join(name)))
            .unwrap_or_else(|| PathBuf::from(name))
    }

    fn load_icon(kind: IconKind) -> Option<Icon> {
        let path = icon_path(kind);
        match Icon::from_path(&path, None) {
            Ok(icon) => Some(icon),
            Err(e) => {
                // Missing icon files degrade to the default tray glyph.
                log::warn!("Icon '{}' not loaded: {}", path.display(), e);
                None
            }
        }
    }

    /// Build the tray menu from the registry and run the UI event loop on
    /// the current thread. Menu clicks are forwarded to `events` as
    /// control indexes; `TrayCommand::Quit` ends the process.
    pub fn run_tray(
        event_loop: EventLoop<TrayCommand>,
        registry: &ControlRegistry,
        events: mpsc::Sender<PanelEvent>,
    ) -> ! {
        let menu = Menu::new();
        let mut entries: Vec<Entry> = Vec::with_capacity(registry.len());
        let mut id_to_index: HashMap<tray_icon::menu::MenuId, usize> = HashMap::new();

        for control in registry.controls() {
            if control.checkable {
                let item =
                    CheckMenuItem::new(&control.label, true, control.checked, None);
                id_to_index.insert(item.id().clone(), control.index);
                if let Err(e) = menu.append(&item) {
                    log::error!("Menu append failed: {}", e);
                }
                entries.push(Entry::Check(item));
            } else {
                let item = MenuItem::new(&control.label, true, None);
                id_to_index.insert(item.id().clone(), control.index);
                if let Err(e) = menu.append(&item) {
                    log::error!("Menu append failed: {}", e);
                }
                entries.push(Entry::Plain(item));
            }
        }

        let mut builder = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip("trayctl");
        if let Some(icon) = load_icon(IconKind::VmStopped) {
            builder = builder.with_icon(icon);
        }
        let mut tray: Option<TrayIcon> = match builder.build() {
            Ok(t) => Some(t),
            Err(e) => {
                log::error!("Tray icon creation failed: {}", e);
                std::process::exit(1);
            }
        };

        // Menu events go through the loop proxy so a click wakes the
        // waiting loop instead of sitting in the receiver until some
        // other event arrives.
        let click_proxy = event_loop.create_proxy();
        MenuEvent::set_event_handler(Some(move |menu_event: MenuEvent| {
            let _ = click_proxy.send_event(TrayCommand::MenuClick(menu_event.id));
        }));

        event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Wait;

            if let tao::event::Event::UserEvent(cmd) = event {
                match cmd {
                    TrayCommand::MenuClick(id) => {
                        if let Some(&index) = id_to_index.get(&id) {
                            let _ = events.blocking_send(PanelEvent::Click(index));
                        }
                    }
                    TrayCommand::SetChecked { index, checked } => {
                        if let Some(Entry::Check(item)) = entries.get(index) {
                            item.set_checked(checked);
                        }
                    }
                    TrayCommand::SetIcon(kind) => {
                        if let (Some(tray), Some(icon)) = (tray.as_ref(), load_icon(kind)) {
                            if let Err(e) = tray.set_icon(Some(icon)) {
                                log::warn!("Icon swap failed: {}", e);
                            }
                        }
                    }
                    TrayCommand::Quit => {
                        tray.take();
                        *control_flow = ControlFlow::Exit;
                    }
                }
            }
        })
    }
}
