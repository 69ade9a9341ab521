//! One-shot CEP lookup from the command line.
//!
//! Runs the same provider chains and caches as the HTTP service, so with
//! `REDIS_URL` set it shares their cache entries and rate-limit budgets.
//!
//! # Usage
//!
//! ```bash
//! # Look up a CEP
//! cargo run --bin lookup -- 01310-100
//!
//! # Prompt for the CEP
//! cargo run --bin lookup
//!
//! # Machine-readable output
//! cargo run --bin lookup -- 01310100 --json
//!
//! # Drop the cached coordinate first
//! cargo run --bin lookup -- 01310100 --refresh
//! ```
//!
//! # Exit status
//!
//! Non-zero when the lookup fails; the error code matches the HTTP API's.

use cep_locator::api::dto::coordinates::CoordinatesResponse;
use cep_locator::config;
use cep_locator::domain::entities::Precision;
use cep_locator::domain::errors::LookupError;
use cep_locator::server::{build_lookup_service, connect_store};
use cep_locator::utils::cep::normalize_cep;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dialoguer::Input;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Resolve a Brazilian CEP to coordinates.
#[derive(Parser)]
#[command(name = "lookup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CEP to resolve (e.g. "01310-100"); prompted for when omitted
    cep: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Invalidate the cached coordinate before looking up
    #[arg(long)]
    refresh: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_from_env().context("Invalid configuration")?;

    let raw_cep = match cli.cep {
        Some(cep) => cep,
        None => Input::<String>::new()
            .with_prompt("CEP")
            .validate_with(|input: &String| -> Result<(), String> {
                normalize_cep(input).map(|_| ()).map_err(|e| e.to_string())
            })
            .interact_text()?,
    };

    let (store, _) = connect_store(&config).await;
    let service = build_lookup_service(&config, Arc::clone(&store))?;

    if cli.refresh {
        service
            .invalidate(&raw_cep)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to invalidate cache entry: {}", e))?;
        if !cli.json {
            println!("{}", "Cached coordinate dropped".bright_black());
        }
    }

    match service.execute(&raw_cep).await {
        Ok(coordinate) => {
            let cep = normalize_cep(&raw_cep).unwrap_or(raw_cep);
            let response = CoordinatesResponse::new(cep, coordinate);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_coordinate(&response);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            if cli.json {
                let body = serde_json::json!({ "error": { "code": error_code(&e), "message": e.to_string() } });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                eprintln!("{} {}", "Lookup failed:".red().bold(), e);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Prints a coordinate with its precision highlighted by tier.
fn print_coordinate(response: &CoordinatesResponse) {
    let precision = response.precision.as_str();
    let precision = match response.precision {
        Precision::Rooftop => precision.green(),
        Precision::Neighborhood => precision.yellow(),
        Precision::City => precision.red(),
    };

    println!("{}", format!("CEP {}", response.cep).bright_blue().bold());
    println!("  Latitude:  {}", response.latitude.to_string().cyan());
    println!("  Longitude: {}", response.longitude.to_string().cyan());
    println!("  Precision: {}", precision.bold());
}

fn error_code(e: &LookupError) -> &'static str {
    match e {
        LookupError::InvalidInput(_)
        | LookupError::InvalidCep
        | LookupError::CoordinatesNotFound => "validation_error",
        LookupError::ServiceBusy { .. } => "too_many_requests",
        LookupError::ServiceOverload | LookupError::AllProvidersFailed { .. } => {
            "service_unavailable"
        }
        LookupError::TimeoutExceeded => "timeout",
        LookupError::Internal(_) => "internal_error",
    }
}
