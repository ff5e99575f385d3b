use crate::{
    config::AppConfig, error::ErrorKind, orchestrator, printer_client::DeviceEndpoint, probe,
    session::Credentials,
};
use actix_web::{HttpResponse, Responder, web};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    net::IpAddr,
    sync::{Arc, Mutex},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureRequest {
    printer_ip: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRequest {
    printer_ip: String,
    ports: Option<Vec<u16>>,
}

#[derive(Serialize)]
struct Banner {
    status: &'static str,
    message: &'static str,
}

#[derive(Serialize)]
struct HealthcheckInfo {
    status: &'static str,
    version: &'static str,
}

/// HTTP surface of the service.
///
/// A printer holds a single configuration state, so two simultaneous runs
/// against the same device would interleave their form submissions. The
/// in-flight set serializes runs per printer; different printers configure
/// concurrently without restriction.
#[derive(Clone, Default)]
pub struct Api {
    in_flight: Arc<Mutex<HashSet<IpAddr>>>,
}

impl Api {
    pub fn new() -> Self {
        Api::default()
    }

    pub async fn index() -> impl Responder {
        debug!("index() called");

        HttpResponse::Ok().json(Banner {
            status: "running",
            message: "zebra printer configuration service",
        })
    }

    pub async fn healthcheck() -> impl Responder {
        debug!("healthcheck() called");

        HttpResponse::Ok().json(HealthcheckInfo {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        })
    }

    pub async fn version() -> impl Responder {
        HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
    }

    pub async fn probe(body: web::Json<ProbeRequest>) -> impl Responder {
        debug!("probe() called for {}", body.printer_ip);

        let mut options = AppConfig::get().probe.options();
        if let Some(ports) = &body.ports {
            options.ports = ports.clone();
        }

        match probe::probe(&body.printer_ip, &options).await {
            Ok(report) => HttpResponse::Ok().json(report),
            Err(e) if e.kind() == ErrorKind::InvalidAddress => {
                warn!("probe rejected: {e}");
                HttpResponse::BadRequest().body(e.to_string())
            }
            Err(e) => {
                error!("probe failed: {e}");
                HttpResponse::InternalServerError().body(e.to_string())
            }
        }
    }

    pub async fn configure(
        body: web::Json<ConfigureRequest>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("configure() called for {}", body.printer_ip);

        let endpoint = match DeviceEndpoint::parse(&body.printer_ip) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!("configure rejected: {e}");
                return HttpResponse::BadRequest().body(e.to_string());
            }
        };

        let Some(_guard) = api.claim(endpoint.ip()) else {
            warn!("configure refused, run already in flight for {endpoint}");
            return HttpResponse::Conflict().body(format!(
                "a configuration run for {} is already in flight",
                endpoint.ip()
            ));
        };

        let defaults = &AppConfig::get().printer;
        let credentials = Credentials::new(
            body.username.as_deref().unwrap_or(&defaults.username),
            body.password.as_deref().unwrap_or(&defaults.password),
        );

        match orchestrator::configure(&endpoint, &credentials, None).await {
            Ok(run) => HttpResponse::Ok().json(run),
            Err(e) => {
                error!("configure failed: {e:#}");
                HttpResponse::InternalServerError().body(e.to_string())
            }
        }
    }

    /// Reserve a printer for one run. `None` while another run holds it; the
    /// reservation is released when the returned guard drops.
    fn claim(&self, ip: IpAddr) -> Option<InFlightGuard> {
        let mut in_flight = self.in_flight.lock().unwrap();

        if !in_flight.insert(ip) {
            return None;
        }

        Some(InFlightGuard {
            in_flight: self.in_flight.clone(),
            ip,
        })
    }
}

struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<IpAddr>>>,
    ip: IpAddr,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap().remove(&self.ip);
    }
}
