//! Remote configuration of Zebra label printers through their embedded web
//! console: a reachability probe, a scripted form-replay pipeline and the HTTP
//! API that exposes both.

pub mod api;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod printer_client;
pub mod probe;
pub mod session;
pub mod steps;
