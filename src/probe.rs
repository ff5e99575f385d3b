use crate::{
    error::{ConsoleError, classify_connect_failure, classify_request_error},
    printer_client::{DEFAULT_CONSOLE_PORT, DeviceEndpoint, RAW_PRINT_PORT},
};
use anyhow::bail;
use futures_util::future::join_all;
use log::{debug, info, warn};
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    time::Duration,
};
use tokio::{net::TcpStream, process::Command, time::timeout};
use trait_variant::make;

/// Role of the ICMP ping within a probe.
///
/// Field deployments disagree on whether a dead ping means a dead printer:
/// some sites firewall ICMP entirely, others rely on it as the first triage
/// signal. The policy makes that choice explicit instead of hard-coding one.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PingPolicy {
    /// Never ping.
    Disabled,
    /// Ping and report the result, but always run the port and HTTP tests.
    #[default]
    Diagnostic,
    /// Skip the port and HTTP tests when the ping got no reply.
    Gate,
}

impl FromStr for PingPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "disabled" => Ok(PingPolicy::Disabled),
            "diagnostic" => Ok(PingPolicy::Diagnostic),
            "gate" => Ok(PingPolicy::Gate),
            other => bail!("unknown ping policy {other:?}, expected disabled, diagnostic or gate"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProbeOptions {
    /// TCP ports to test. The defaults cover the web console and the raw
    /// printing channel.
    pub ports: Vec<u16>,
    pub connect_timeout: Duration,
    pub http_timeout: Duration,
    pub ping_policy: PingPolicy,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions {
            ports: vec![DEFAULT_CONSOLE_PORT, RAW_PRINT_PORT],
            connect_timeout: Duration::from_secs(5),
            http_timeout: Duration::from_secs(5),
            ping_policy: PingPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortProbe {
    pub port: u16,
    pub open: bool,
    pub detail: String,
}

/// Aggregated reachability picture of one printer.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub printer: String,
    pub ports: Vec<PortProbe>,
    /// True only for a 2xx answer on the console root page.
    pub http_reachable: bool,
    /// `None` when pinging is disabled or no usable ping binary exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_reachable: Option<bool>,
    /// Logical OR over every signal that was actually tested.
    pub reachable: bool,
    pub details: Vec<String>,
}

/// Source of the ICMP reachability signal.
///
/// `None` means no ping data could be gathered, which callers must treat as
/// "unknown", never as unreachable.
#[make(Send)]
#[cfg_attr(test, automock)]
pub trait Pinger {
    async fn ping(&self, ip: IpAddr, deadline: Duration) -> Option<bool>;
}

/// Pings by shelling out to the system `ping` binary, one bounded packet.
#[derive(Clone, Default)]
pub struct SystemPinger;

impl Pinger for SystemPinger {
    async fn ping(&self, ip: IpAddr, deadline: Duration) -> Option<bool> {
        let mut command = Command::new("ping");

        #[cfg(target_os = "windows")]
        command.args(["-n", "1", "-w", "1000"]);
        #[cfg(not(target_os = "windows"))]
        command.args(["-c", "1", "-W", "1"]);

        command.arg(ip.to_string()).kill_on_drop(true);

        match timeout(deadline, command.output()).await {
            Ok(Ok(output)) => Some(output.status.success()),
            Ok(Err(e)) => {
                warn!("ping could not be executed: {e}");
                None
            }
            Err(_) => Some(false),
        }
    }
}

/// Probe with the system ping binary as the ICMP source.
pub async fn probe(address: &str, options: &ProbeOptions) -> Result<ProbeReport, ConsoleError> {
    probe_with_pinger(&SystemPinger, address, options).await
}

/// Test reachability of a printer without touching its configuration.
///
/// Individual test failures are recorded in the report, never returned as
/// errors; the only error case is a malformed address, rejected before any
/// network I/O.
pub async fn probe_with_pinger<P: Pinger>(
    pinger: &P,
    address: &str,
    options: &ProbeOptions,
) -> Result<ProbeReport, ConsoleError> {
    let endpoint = DeviceEndpoint::parse(address)?;
    let printer = endpoint.to_string();
    let mut details = Vec::new();

    info!("probing {printer} on ports {:?}", options.ports);

    let ping_reachable = match options.ping_policy {
        PingPolicy::Disabled => None,
        PingPolicy::Diagnostic | PingPolicy::Gate => {
            let reply = pinger.ping(endpoint.ip(), options.connect_timeout).await;
            match reply {
                Some(true) => details.push(format!("ping: reply from {}", endpoint.ip())),
                Some(false) => details.push(format!("ping: no reply from {}", endpoint.ip())),
                None => details.push("ping: not available on this host".to_string()),
            }
            reply
        }
    };

    if options.ping_policy == PingPolicy::Gate && ping_reachable == Some(false) {
        info!("{printer} failed the ping gate, skipping port and HTTP tests");
        return Ok(ProbeReport {
            printer,
            ports: Vec::new(),
            http_reachable: false,
            ping_reachable,
            reachable: false,
            details,
        });
    }

    let ports = join_all(
        options
            .ports
            .iter()
            .map(|&port| check_port(&endpoint, port, options.connect_timeout)),
    )
    .await;
    for port in &ports {
        details.push(port.detail.clone());
    }

    let http_reachable = check_http_root(&endpoint, options.http_timeout, &mut details).await;

    let reachable =
        ports.iter().any(|port| port.open) || http_reachable || ping_reachable.unwrap_or(false);

    debug!("probe of {printer} finished, reachable: {reachable}");

    Ok(ProbeReport {
        printer,
        ports,
        http_reachable,
        ping_reachable,
        reachable,
        details,
    })
}

async fn check_port(endpoint: &DeviceEndpoint, port: u16, connect_timeout: Duration) -> PortProbe {
    let target = SocketAddr::new(endpoint.ip(), port);

    match timeout(connect_timeout, TcpStream::connect(target)).await {
        Ok(Ok(_stream)) => PortProbe {
            port,
            open: true,
            detail: format!("tcp/{port}: open"),
        },
        Ok(Err(e)) => PortProbe {
            port,
            open: false,
            detail: format!("tcp/{port}: {} ({e})", classify_connect_failure(&e)),
        },
        Err(_) => PortProbe {
            port,
            open: false,
            detail: format!("tcp/{port}: timeout after {connect_timeout:?}"),
        },
    }
}

async fn check_http_root(
    endpoint: &DeviceEndpoint,
    http_timeout: Duration,
    details: &mut Vec<String>,
) -> bool {
    let url = endpoint.root_url();

    let client = match reqwest::Client::builder().timeout(http_timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("failed to create probe HTTP client: {e:#}");
            details.push(format!("http: client setup failed ({e})"));
            return false;
        }
    };

    match client.get(&url).send().await {
        Ok(response) => {
            let status = response.status();
            details.push(format!("http: GET {url} answered {status}"));
            status.is_success()
        }
        Err(e) => {
            let kind = classify_request_error(&url, http_timeout, &e).kind();
            details.push(format!("http: GET {url} failed ({kind})"));
            false
        }
    }
}
