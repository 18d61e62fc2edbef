//! System proxy flag store.
//!
//! The host's outbound proxy behavior is two persisted values plus an
//! enable flag under the Internet Settings key. Both value writes must land
//! before the settings-changed broadcast; a failed write skips the
//! broadcast entirely.

use crate::error::ResourceError;

/// Registry value holding the proxy endpoint.
pub const PROXY_SERVER_VALUE: &str = "ProxyServer";

/// Registry value holding the bypass list.
pub const PROXY_OVERRIDE_VALUE: &str = "ProxyOverride";

/// Registry value enabling/disabling the proxy.
pub const PROXY_ENABLE_VALUE: &str = "ProxyEnable";

/// Seam over the persisted proxy settings store.
pub trait ProxySettingsStore: Send + Sync {
    fn set_string(&self, key: &str, value: &str) -> Result<(), ResourceError>;

    fn set_dword(&self, key: &str, value: u32) -> Result<(), ResourceError>;

    /// Tell the OS that proxy settings changed so live connections pick
    /// the new flags up.
    fn broadcast_change(&self) -> Result<(), ResourceError>;
}

#[cfg(windows)]
pub use windows_impl::WindowsProxyStore;

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use winreg::enums::{HKEY_CURRENT_USER, KEY_SET_VALUE};
    use winreg::RegKey;

    const INTERNET_SETTINGS_KEY: &str =
        r"Software\Microsoft\Windows\CurrentVersion\Internet Settings";

    /// Production store writing HKCU Internet Settings values and
    /// refreshing WinInet afterwards.
    pub struct WindowsProxyStore;

    impl WindowsProxyStore {
        fn open_key(&self) -> Result<RegKey, ResourceError> {
            RegKey::predef(HKEY_CURRENT_USER)
                .open_subkey_with_flags(INTERNET_SETTINGS_KEY, KEY_SET_VALUE)
                .map_err(|e| ResourceError::ProxyFlagFailed {
                    key: INTERNET_SETTINGS_KEY.to_string(),
                    reason: e.to_string(),
                })
        }
    }

    impl ProxySettingsStore for WindowsProxyStore {
        fn set_string(&self, key: &str, value: &str) -> Result<(), ResourceError> {
            self.open_key()?
                .set_value(key, &value)
                .map_err(|e| ResourceError::ProxyFlagFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
        }

        fn set_dword(&self, key: &str, value: u32) -> Result<(), ResourceError> {
            self.open_key()?
                .set_value(key, &value)
                .map_err(|e| ResourceError::ProxyFlagFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
        }

        fn broadcast_change(&self) -> Result<(), ResourceError> {
            use windows_sys::Win32::Networking::WinInet::{
                InternetSetOptionW, INTERNET_OPTION_REFRESH, INTERNET_OPTION_SETTINGS_CHANGED,
            };

            // Settings-changed first, then refresh, both against the
            // global (null) internet handle.
            for option in [INTERNET_OPTION_SETTINGS_CHANGED, INTERNET_OPTION_REFRESH] {
                let ok = unsafe {
                    InternetSetOptionW(std::ptr::null_mut(), option, std::ptr::null_mut(), 0)
                };
                if ok == 0 {
                    return Err(ResourceError::ProxyFlagFailed {
                        key: "InternetSetOptionW".to_string(),
                        reason: format!("option {} refused", option),
                    });
                }
            }
            Ok(())
        }
    }
}

#[cfg(not(windows))]
pub use portable_impl::NoopProxyStore;

#[cfg(not(windows))]
mod portable_impl {
    use super::*;

    /// Headless stand-in for platforms without a system proxy flag store.
    /// Writes are accepted and dropped so the panel stays runnable.
    pub struct NoopProxyStore;

    impl ProxySettingsStore for NoopProxyStore {
        fn set_string(&self, key: &str, _value: &str) -> Result<(), ResourceError> {
            log::debug!("Proxy store unavailable on this platform; dropping '{}'", key);
            Ok(())
        }

        fn set_dword(&self, key: &str, _value: u32) -> Result<(), ResourceError> {
            log::debug!("Proxy store unavailable on this platform; dropping '{}'", key);
            Ok(())
        }

        fn broadcast_change(&self) -> Result<(), ResourceError> {
            Ok(())
        }
    }
}
