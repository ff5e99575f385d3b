use actix_server::ServerHandle;
use actix_web::{
    App, HttpServer,
    web::{self, Data},
};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{debug, error, info};
use std::io::Write;
use tokio::signal::unix::{SignalKind, signal};
use zebra_console::{api::Api, config::AppConfig};

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let (server_handle, server_task) = run_server().await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c received");
        },
        _ = sigterm.recv() => {
            debug!("SIGTERM received");
        },
        result = server_task => {
            match result {
                Ok(Ok(())) => debug!("server stopped normally"),
                Ok(Err(e)) => error!("server stopped with error: {e}"),
                Err(e) => error!("server task panicked: {e}"),
            }
            return Ok(());
        },
    }

    server_handle.stop(true).await;
    info!("shutdown complete");

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

async fn run_server() -> Result<(
    ServerHandle,
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
)> {
    let port = AppConfig::get().api.port;
    let api = Api::new();

    info!("starting server on 0.0.0.0:{port}");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(api.clone()))
            .route("/", web::get().to(Api::index))
            .route("/healthcheck", web::get().to(Api::healthcheck))
            .route("/version", web::get().to(Api::version))
            .route("/probe", web::post().to(Api::probe))
            .route("/configure", web::post().to(Api::configure))
    })
    .bind(format!("0.0.0.0:{port}"))
    .context("failed to bind server")?
    .disable_signals()
    .run();

    Ok((server.handle(), tokio::spawn(server)))
}
