//! WiFi adapter: provisioning access point plus station mode.
//!
//! Implements [`ConnectivityPort`].  The access point stays up at all
//! times so the companion app can always reach the gateway; the station
//! joins the home network for SNTP.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver in mixed
//!   (AP + STA) mode via `esp_idf_svc::wifi::BlockingWifi`.
//! - **all other targets**: simulation for host-side tests.

use core::net::Ipv4Addr;

use log::{info, warn};

use crate::app::ports::{ConnectivityError, ConnectivityPort};

/// Provisioning access point name.
pub const AP_SSID: &str = "MedicineDispenser";
/// Provisioning access point passphrase.
pub const AP_PASSWORD: &str = "12345678";

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

/// Empty means an open network; otherwise WPA2 length rules apply.
pub fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct WifiAdapter {
    wifi: esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    /// Bring up the provisioning access point.
    pub fn new(
        modem: esp_idf_svc::hal::modem::Modem,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: esp_idf_svc::nvs::EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        use esp_idf_svc::wifi::{BlockingWifi, Configuration, EspWifi};

        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
        wifi.set_configuration(&Configuration::AccessPoint(Self::ap_config()?))?;
        wifi.start()?;
        info!("WiFi: access point '{}' up", AP_SSID);
        Ok(Self { wifi })
    }

    fn ap_config() -> anyhow::Result<esp_idf_svc::wifi::AccessPointConfiguration> {
        use esp_idf_svc::wifi::{AccessPointConfiguration, AuthMethod};

        Ok(AccessPointConfiguration {
            ssid: AP_SSID
                .try_into()
                .map_err(|_| anyhow::anyhow!("AP SSID too long"))?,
            password: AP_PASSWORD
                .try_into()
                .map_err(|_| anyhow::anyhow!("AP password too long"))?,
            auth_method: AuthMethod::WPA2Personal,
            channel: 1,
            ..Default::default()
        })
    }

    fn join(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: password
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        };
        let ap = Self::ap_config().map_err(|_| ConnectivityError::ConnectionFailed)?;

        let _ = self.wifi.disconnect();
        self.wifi
            .set_configuration(&Configuration::Mixed(client, ap))
            .and_then(|()| self.wifi.connect())
            .and_then(|()| self.wifi.wait_netif_up())
            .map_err(|e| {
                warn!("WiFi: join '{}' failed: {}", ssid, e);
                ConnectivityError::ConnectionFailed
            })
    }
}

#[cfg(target_os = "espidf")]
impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        info!("WiFi: joining '{}'", ssid);
        self.join(ssid, password)?;
        info!("WiFi: connected (ip={:?})", self.station_ip());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn access_point_ip(&self) -> Option<Ipv4Addr> {
        self.wifi.wifi().ap_netif().get_ip_info().ok().map(|i| i.ip)
    }

    fn station_ip(&self) -> Option<Ipv4Addr> {
        if !self.is_connected() {
            return None;
        }
        self.wifi.wifi().sta_netif().get_ip_info().ok().map(|i| i.ip)
    }
}

/// Host simulation: any valid credentials join, except the SSID
/// configured through [`WifiAdapter::reject_ssid`].
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct WifiAdapter {
    joined: Option<heapless::String<32>>,
    rejected: Option<heapless::String<32>>,
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        info!("WiFi(sim): access point '{}' up", AP_SSID);
        Self::default()
    }

    /// Make joins to `ssid` fail, as if the network were out of range.
    pub fn reject_ssid(&mut self, ssid: &str) {
        self.rejected = heapless::String::try_from(ssid).ok();
    }

    pub fn joined_ssid(&self) -> Option<&str> {
        self.joined.as_deref()
    }
}

#[cfg(not(target_os = "espidf"))]
impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.joined = None;
        if self.rejected.as_deref() == Some(ssid) {
            warn!("WiFi(sim): '{}' unreachable", ssid);
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.joined = heapless::String::try_from(ssid).ok();
        info!("WiFi(sim): connected to '{}'", ssid);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.joined.is_some()
    }

    fn access_point_ip(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::new(192, 168, 4, 1))
    }

    fn station_ip(&self) -> Option<Ipv4Addr> {
        self.joined.as_ref().map(|_| Ipv4Addr::new(192, 168, 1, 50))
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
