//! schoolref - inspect the school reference data cache from the terminal.
//!
//! Usage:
//!   schoolref stats
//!   schoolref schools
//!   schoolref classes [SCHOOL_ID]
//!   schoolref divisions [CLASS_ID]
//!
//! The account and token come from `SCHOOLREF_ACCOUNT_ID` and
//! `SCHOOLREF_TOKEN` (a `.env` file is honoured).

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use schoolref_core::{
    Allocation, ApiClient, CollectionKind, Config, ItemId, ReferenceCache, ReferenceItem, Role,
    UserProfile,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn parse_id(raw: &str) -> ItemId {
    match raw.parse::<i64>() {
        Ok(id) => ItemId::Int(id),
        Err(_) => ItemId::from(raw),
    }
}

fn profile_from_env() -> Result<UserProfile> {
    let account_id = std::env::var("SCHOOLREF_ACCOUNT_ID")
        .context("SCHOOLREF_ACCOUNT_ID must be set")?;
    let role = std::env::var("SCHOOLREF_ROLE")
        .map(|r| Role::parse(&r))
        .unwrap_or(Role::Admin);

    let mut profile = UserProfile::new(account_id, role);
    profile.token = std::env::var("SCHOOLREF_TOKEN").ok();
    profile.school_id = std::env::var("SCHOOLREF_SCHOOL_ID").ok().map(|s| parse_id(&s));
    if let Ok(raw) = std::env::var("SCHOOLREF_ALLOCATIONS") {
        let allocations: Vec<Allocation> = serde_json::from_str(&raw)
            .context("SCHOOLREF_ALLOCATIONS must be a JSON array of {classId, divisionId}")?;
        profile.allocated_classes = allocations;
    }
    Ok(profile)
}

fn print_items(items: &[ReferenceItem]) {
    for item in items {
        println!("{:>8}  {}", item.id.to_string(), item.name);
    }
    println!("({} items)", items.len());
}

fn usage() -> Result<()> {
    eprintln!("Usage: schoolref <stats|schools|classes [SCHOOL_ID]|divisions [CLASS_ID]>");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1).map(String::as_str) else {
        return usage();
    };
    let arg = args.get(2).map(|s| parse_id(s));

    let config = Config::load()?;
    let profile = profile_from_env()?;

    let mut client = ApiClient::with_timeout(config.api_base_url.clone(), config.request_timeout())
        .context("Failed to create API client")?;
    if let Some(ref token) = profile.token {
        client.set_token(token.clone());
    }

    let cache = ReferenceCache::builder(Arc::new(client), profile)
        .options(config.cache_options())
        .build();
    info!(command, "schoolref starting");

    match command {
        "stats" => {
            // Errors are already reported per collection by the notifier
            let _ = cache.refresh_all().await;
            println!("{}", serde_json::to_string_pretty(&cache.get_stats())?);
            for kind in CollectionKind::ALL {
                let snapshot = cache.snapshot(kind);
                match snapshot.last_error {
                    Some(ref error) => println!("{:<10} failed: {}", kind, error),
                    None => println!("{:<10} {} items, fetched {}", kind, snapshot.count, snapshot.age_display()),
                }
            }
        }
        "schools" => print_items(&cache.get_schools(false).await?),
        "classes" => print_items(&cache.get_classes(arg.as_ref(), false).await?),
        "divisions" => {
            cache.get_divisions(arg.as_ref(), false).await?;
            print_items(&cache.divisions_for(None, arg.as_ref()));
        }
        _ => return usage(),
    }

    Ok(())
}
