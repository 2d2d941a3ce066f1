//! WiFi station adapter.
//!
//! The device build drives `esp_idf_svc::wifi`; the host build swaps in a
//! scriptable `Link` for tests.
//!
//! Zones keep running while the link is down; only telemetry and remote
//! commands depend on it.  On failure the adapter waits an exponential
//! backoff (2 s → 4 s → 8 s … capped at 60 s) before the next attempt.

use core::fmt;
use log::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no network configured"),
            Self::InvalidSsid => write!(f, "SSID must be 1 to 32 printable ASCII bytes"),
            Self::InvalidPassword => write!(f, "passphrase must be empty or 8 to 64 bytes"),
            Self::ConnectionFailed => write!(f, "could not join the network"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connected,
    Backoff { attempt: u32, retry_at_ms: u64 },
}

const INITIAL_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;

/// SSID: 1..=32 printable ASCII bytes.  Password: empty (open network)
/// or a WPA2 passphrase of 8..=64 bytes.
fn check_credentials(ssid: &str, password: &str) -> Result<(), ConnectivityError> {
    let printable = ssid.bytes().all(|b| b.is_ascii_graphic() || b == b' ');
    if !(1..=32).contains(&ssid.len()) || !printable {
        return Err(ConnectivityError::InvalidSsid);
    }
    if !password.is_empty() && !(8..=64).contains(&password.len()) {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Platform link
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod link {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
    use log::error;

    use super::ConnectivityError;

    pub struct Link {
        wifi: BlockingWifi<EspWifi<'static>>,
    }

    impl Link {
        pub fn new(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: Option<EspDefaultNvsPartition>,
        ) -> Result<Self, ConnectivityError> {
            let esp = EspWifi::new(modem, sysloop.clone(), nvs).map_err(|e| {
                error!("WiFi: driver init failed: {}", e);
                ConnectivityError::ConnectionFailed
            })?;
            let wifi = BlockingWifi::wrap(esp, sysloop).map_err(|_| ConnectivityError::ConnectionFailed)?;
            Ok(Self { wifi })
        }

        pub fn connect(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
            let auth_method = if password.is_empty() { AuthMethod::None } else { AuthMethod::WPA2Personal };
            let config = Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
                password: password.try_into().map_err(|_| ConnectivityError::InvalidPassword)?,
                auth_method,
                ..Default::default()
            });
            let fail = |e: esp_idf_svc::sys::EspError| {
                error!("WiFi: {}", e);
                ConnectivityError::ConnectionFailed
            };
            self.wifi.set_configuration(&config).map_err(fail)?;
            if !self.wifi.is_started().map_err(fail)? {
                self.wifi.start().map_err(fail)?;
            }
            self.wifi.connect().map_err(fail)?;
            self.wifi.wait_netif_up().map_err(fail)?;
            Ok(())
        }

        pub fn is_connected(&self) -> bool {
            self.wifi.is_connected().unwrap_or(false)
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod link {
    use super::ConnectivityError;

    /// Simulated link; `fail_next` makes the next connect fail.
    #[derive(Default)]
    pub struct Link {
        pub connected: bool,
        pub fail_next: bool,
    }

    impl Link {
        pub fn connect(&mut self, _ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
            if core::mem::take(&mut self.fail_next) {
                return Err(ConnectivityError::ConnectionFailed);
            }
            self.connected = true;
            Ok(())
        }

        pub fn is_connected(&self) -> bool {
            self.connected
        }
    }
}

pub use link::Link;

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    link: Link,
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_secs: u32,
}

impl WifiAdapter {
    pub fn new(link: Link) -> Self {
        Self {
            link,
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        check_credentials(ssid, password)?;
        self.ssid.clear();
        self.password.clear();
        self.ssid.push_str(ssid).map_err(|()| ConnectivityError::InvalidSsid)?;
        self.password
            .push_str(password)
            .map_err(|()| ConnectivityError::InvalidPassword)?;
        Ok(())
    }

    /// Connect now.  On failure the adapter enters backoff; see
    /// [`poll`](Self::poll).
    pub fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        match self.link.connect(&self.ssid, &self.password) {
            Ok(()) => {
                self.state = WifiState::Connected;
                self.backoff_secs = INITIAL_BACKOFF_SECS;
                info!("WiFi: connected");
                Ok(())
            }
            Err(e) => {
                let attempt = match self.state {
                    WifiState::Backoff { attempt, .. } => attempt + 1,
                    _ => 1,
                };
                let retry_at_ms = now_ms + u64::from(self.backoff_secs) * 1_000;
                warn!("WiFi: {} (attempt {}), retry in {} s", e, attempt, self.backoff_secs);
                self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                self.state = WifiState::Backoff { attempt, retry_at_ms };
                Err(e)
            }
        }
    }

    /// Detect link loss and retry once the backoff has elapsed.  Returns
    /// `true` when a new connection came up during this call.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.state {
            WifiState::Connected if !self.link.is_connected() => {
                warn!("WiFi: link lost");
                self.state = WifiState::Backoff { attempt: 0, retry_at_ms: now_ms };
                false
            }
            WifiState::Backoff { retry_at_ms, .. } if now_ms >= retry_at_ms => self.connect(now_ms).is_ok(),
            _ => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.link.is_connected()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}
