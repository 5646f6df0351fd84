//! Offline license inspection for Flowgate deployments.
//!
//! Reads the installed license from the Flowgate database, re-validates
//! it against the configured verification key, and prints the derived
//! grants. Strictly read-only: the stored record is not touched.
//!
//! Usage:
//!   flowgate-inspect --database flowgate.db --key license_pub.pem
//!   flowgate-inspect --json

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use flowgate_enforce::Enforcer;
use flowgate_license::{LicenseGrants, PemFileKeyProvider};
use flowgate_store::{InstalledLicenseRecord, SqliteStore};
use serde_json::json;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "flowgate-inspect")]
#[command(about = "Inspect the currently installed license and print its status/grants")]
struct Args {
    /// Path to the Flowgate database
    #[arg(short, long, default_value = "flowgate.db")]
    database: PathBuf,

    /// Path to the Ed25519 verification key (PEM)
    #[arg(short, long, default_value = "license_pub.pem")]
    key: PathBuf,

    /// Output license status as JSON instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let store = SqliteStore::open(&args.database)
        .with_context(|| format!("failed to open database {}", args.database.display()))?;
    tracing::debug!(database = %args.database.display(), key = %args.key.display(), "opened stores");
    let keys = PemFileKeyProvider::new(&args.key);
    let enforcer = Enforcer::new(store, keys);

    let (record, grants) = enforcer
        .describe()
        .context("failed to evaluate the installed license")?;

    if args.json {
        print_json(record.as_ref(), &grants);
    } else {
        print_human(record.as_ref(), &grants);
    }
    Ok(())
}

fn print_json(record: Option<&InstalledLicenseRecord>, grants: &LicenseGrants) {
    let payload = json!({
        "status": grants.status,
        "status_message": grants.status_message,
        "license_id": grants.license_id,
        "license_type": grants.license_type,
        "customer_name": grants.customer_name,
        "product_code": grants.product_code,
        "product_name": grants.product_name,
        "edition_code": grants.edition_code,
        "edition_name": grants.edition_name,
        "valid_from": grants.valid_from.map(|t| t.to_rfc3339()),
        "valid_until": grants.valid_until.map(|t| t.to_rfc3339()),
        "features": grants.features,
        "usage_limits": grants.usage_limits,
        "deployment": grants.deployment,
        "warnings": grants.warnings,
        "installed_at": record.map(|r| r.installed_at.to_rfc3339()),
        "last_validated_at": record.and_then(|r| r.last_validated_at).map(|t| t.to_rfc3339()),
        "checked_at": Utc::now().to_rfc3339(),
    });
    // Sorted keys for stable diffable output.
    println!(
        "{}",
        serde_json::to_string_pretty(&sorted(&payload)).unwrap_or_default()
    );
}

fn sorted(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let entries: std::collections::BTreeMap<_, _> = map.iter().collect();
            serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        other => other.clone(),
    }
}

fn print_human(record: Option<&InstalledLicenseRecord>, grants: &LicenseGrants) {
    println!();
    println!("=== License Check ===");
    println!("Checked at:    {}", Utc::now().to_rfc3339());
    println!();
    println!("Status:        {}", grants.status);
    println!("Message:       {}", grants.status_message);

    if let Some(record) = record {
        println!("Installed at:  {}", record.installed_at.to_rfc3339());
        if let Some(validated) = record.last_validated_at {
            println!("Validated at:  {}", validated.to_rfc3339());
        }
    }

    if let Some(customer) = &grants.customer_name {
        println!("Customer:      {customer}");
    }
    if let Some(product) = &grants.product_name {
        println!("Product:       {product}");
    }
    if let Some(edition) = &grants.edition_name {
        println!("Edition:       {edition}");
    }
    if let (Some(from), Some(until)) = (grants.valid_from, grants.valid_until) {
        println!("Window:        {} .. {}", from.to_rfc3339(), until.to_rfc3339());
    }

    if !grants.features.is_empty() {
        println!();
        println!("Features:");
        for (key, grant) in &grants.features {
            let state = if grant.enabled { "enabled" } else { "disabled" };
            if grant.config.is_empty() {
                println!("  {key:<24} {state}");
            } else {
                let config = serde_json::to_string(&grant.config).unwrap_or_default();
                println!("  {key:<24} {state}  {config}");
            }
        }
    }

    if !grants.usage_limits.is_empty() {
        println!();
        println!("Usage limits:");
        for (action, limits) in &grants.usage_limits {
            println!("  {action:<24} {limits}");
        }
    }

    for warning in &grants.warnings {
        println!();
        println!("WARNING: {warning}");
    }
    println!();
}
