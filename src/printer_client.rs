use crate::error::{ConsoleError, classify_request_error};
use anyhow::{Context, Result};
use log::info;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    str::FromStr,
    time::Duration,
};
use trait_variant::make;

/// Port the embedded web console listens on unless overridden.
pub const DEFAULT_CONSOLE_PORT: u16 = 80;

/// Port of the raw printing channel. Never used for configuration, but probed
/// for reachability since many firmware builds keep it open even when the web
/// console hangs.
pub const RAW_PRINT_PORT: u16 = 9100;

/// Console page submitted by a configuration step.
///
/// The relative paths are a firmware contract and never change between runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsolePage {
    /// Login form and "save configuration" form share this page.
    Settings,
    MediaSetup,
    GeneralSetup,
    FeedControl,
    TestPrint,
}

impl ConsolePage {
    const SETTINGS_PATH: &str = "settings";
    const MEDIA_SETUP_PATH: &str = "setmed";
    const GENERAL_SETUP_PATH: &str = "setgen";
    const FEED_CONTROL_PATH: &str = "control";
    const TEST_PRINT_PATH: &str = "setlst";

    pub fn path(&self) -> &'static str {
        match self {
            ConsolePage::Settings => Self::SETTINGS_PATH,
            ConsolePage::MediaSetup => Self::MEDIA_SETUP_PATH,
            ConsolePage::GeneralSetup => Self::GENERAL_SETUP_PATH,
            ConsolePage::FeedControl => Self::FEED_CONTROL_PATH,
            ConsolePage::TestPrint => Self::TEST_PRINT_PATH,
        }
    }
}

/// Validated address of one printer console.
///
/// Only literal IPv4/IPv6 addresses are accepted, optionally with a port.
/// Hostnames are rejected on purpose: the deployments this service runs in
/// have no name resolution for the printer VLAN, and a typo'd hostname would
/// otherwise surface as a confusing timeout instead of a validation error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceEndpoint {
    ip: IpAddr,
    port: u16,
}

impl DeviceEndpoint {
    pub fn parse(address: &str) -> Result<Self, ConsoleError> {
        let trimmed = address.trim();

        if trimmed.is_empty() {
            return Err(ConsoleError::invalid_address(address, "address is empty"));
        }

        if let Ok(ip) = IpAddr::from_str(trimmed) {
            return Ok(DeviceEndpoint {
                ip,
                port: DEFAULT_CONSOLE_PORT,
            });
        }

        let Ok(socket_addr) = SocketAddr::from_str(trimmed) else {
            return Err(ConsoleError::invalid_address(
                address,
                "expected a literal IPv4/IPv6 address with optional port",
            ));
        };

        if socket_addr.port() == 0 {
            return Err(ConsoleError::invalid_address(address, "port must not be 0"));
        }

        Ok(DeviceEndpoint {
            ip: socket_addr.ip(),
            port: socket_addr.port(),
        })
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Absolute URL of a console page on this printer.
    pub fn url_for(&self, page: ConsolePage) -> String {
        format!("http://{self}/{}", page.path())
    }

    pub fn root_url(&self) -> String {
        format!("http://{self}/")
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.ip, self.port) {
            (IpAddr::V6(ip), DEFAULT_CONSOLE_PORT) => write!(f, "[{ip}]"),
            (IpAddr::V6(ip), port) => write!(f, "[{ip}]:{port}"),
            (ip, DEFAULT_CONSOLE_PORT) => write!(f, "{ip}"),
            (ip, port) => write!(f, "{ip}:{port}"),
        }
    }
}

/// Raw HTTP exchange with the console. Any response the device produced is an
/// `Ok`, whatever its status; `Err` means the request never completed.
#[derive(Debug)]
pub struct ConsoleResponse {
    pub status: u16,
    pub body: String,
}

impl ConsoleResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[make(Send)]
#[cfg_attr(test, automock)]
pub trait ConsoleTransport {
    /// POST a form to the console, preserving field order exactly as given.
    /// The firmware parses fields positionally, so reordering breaks it.
    async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
    ) -> Result<ConsoleResponse, ConsoleError>;

    async fn get(&self, url: &str) -> Result<ConsoleResponse, ConsoleError>;
}

/// reqwest-backed transport with a cookie jar scoped to one configuration run.
///
/// The console issues a session cookie on login; creating a fresh transport
/// per run guarantees no credentials or session state leak between runs.
pub struct HttpConsoleTransport {
    client: Client,
    timeout: Duration,
}

impl HttpConsoleTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .context("failed to create printer console HTTP client")?;

        Ok(HttpConsoleTransport { client, timeout })
    }

    async fn read_response(
        &self,
        url: &str,
        res: reqwest::Response,
    ) -> Result<ConsoleResponse, ConsoleError> {
        let status = res.status().as_u16();
        let body = res
            .text()
            .await
            .map_err(|e| classify_request_error(url, self.timeout, &e))?;

        Ok(ConsoleResponse { status, body })
    }
}

impl ConsoleTransport for HttpConsoleTransport {
    async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
    ) -> Result<ConsoleResponse, ConsoleError> {
        info!("POST {url}");

        let res = self
            .client
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| classify_request_error(url, self.timeout, &e))?;

        self.read_response(url, res).await
    }

    async fn get(&self, url: &str) -> Result<ConsoleResponse, ConsoleError> {
        info!("GET {url}");

        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_request_error(url, self.timeout, &e))?;

        self.read_response(url, res).await
    }
}
