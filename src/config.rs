use crate::{
    probe::{PingPolicy, ProbeOptions},
    session::Credentials,
};
use anyhow::{Context, Result};
use std::{env, sync::OnceLock, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP API server configuration
    pub api: ApiConfig,

    /// Printer console access configuration
    pub printer: PrinterConfig,

    /// Reachability probe configuration
    pub probe: ProbeConfig,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct PrinterConfig {
    /// Default console credentials, used when a request does not carry its own.
    pub username: String,
    pub password: String,

    /// Per-request timeout for console submissions. Applied to every call
    /// individually, never to a whole run.
    pub request_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ProbeConfig {
    pub ports: Vec<u16>,
    pub timeout: Duration,
    pub ping_policy: PingPolicy,
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// Returns a reference to the cached configuration. On first call, it
    /// loads and validates all configuration from environment variables.
    /// Subsequent calls return the cached instance.
    ///
    /// # Panics
    /// Panics if configuration loading fails. This is intentional as the
    /// application cannot function without valid configuration.
    pub fn get() -> &'static Self {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        APP_CONFIG.get_or_init(|| {
            Self::load_internal().expect("failed to load application configuration")
        })
    }

    /// Internal function to load and validate all configuration from environment variables
    ///
    /// This should only be called once via get().
    fn load_internal() -> Result<Self> {
        let api = ApiConfig::load()?;
        let printer = PrinterConfig::load()?;
        let probe = ProbeConfig::load()?;

        Ok(Self {
            api,
            printer,
            probe,
        })
    }
}

impl ApiConfig {
    fn load() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .context("failed to parse PORT: invalid format")?;

        Ok(Self { port })
    }
}

impl PrinterConfig {
    fn load() -> Result<Self> {
        let username = env::var("PRINTER_USER").unwrap_or_else(|_| "admin".to_string());
        let password = env::var("PRINTER_PASSWORD").unwrap_or_else(|_| "1234".to_string());

        let request_timeout = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map(Duration::from_secs)
            .context("failed to parse REQUEST_TIMEOUT_SECS: invalid format")?;

        Ok(Self {
            username,
            password,
            request_timeout,
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }
}

impl ProbeConfig {
    fn load() -> Result<Self> {
        let ports = env::var("PROBE_PORTS").unwrap_or_else(|_| "80,9100".to_string());
        let ports = parse_port_list(&ports)?;

        let timeout = env::var("PROBE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .map(Duration::from_secs)
            .context("failed to parse PROBE_TIMEOUT_SECS: invalid format")?;

        let ping_policy = env::var("PING_POLICY")
            .unwrap_or_else(|_| "diagnostic".to_string())
            .parse::<PingPolicy>()
            .context("failed to parse PING_POLICY")?;

        Ok(Self {
            ports,
            timeout,
            ping_policy,
        })
    }

    pub fn options(&self) -> ProbeOptions {
        ProbeOptions {
            ports: self.ports.clone(),
            connect_timeout: self.timeout,
            http_timeout: self.timeout,
            ping_policy: self.ping_policy,
        }
    }
}

fn parse_port_list(value: &str) -> Result<Vec<u16>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<u16>()
                .context(format!("failed to parse port {entry:?} in port list"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_lists_accept_whitespace_and_trailing_commas() {
        assert_eq!(parse_port_list("80,9100").unwrap(), vec![80, 9100]);
        assert_eq!(parse_port_list(" 80 , 9100 ,").unwrap(), vec![80, 9100]);
        assert_eq!(parse_port_list("631").unwrap(), vec![631]);
    }

    #[test]
    fn invalid_port_entries_are_rejected() {
        assert!(parse_port_list("80,console").is_err());
        assert!(parse_port_list("80,99999").is_err());
    }

    #[test]
    fn default_configuration_loads_without_environment() {
        let config = AppConfig::get();
        assert_eq!(config.printer.request_timeout, Duration::from_secs(10));
        assert_eq!(config.probe.ping_policy, PingPolicy::Diagnostic);
        assert_eq!(config.printer.credentials().username, "admin");
    }
}
