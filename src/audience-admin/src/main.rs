//! Audience Admin CLI: seed a demo dataset, build segments from rule
//! payloads, and inspect the resulting audiences.
//!
//! The record store is in-memory, so every invocation seeds first and then
//! runs one command against the fresh dataset.

mod seeder;

use std::sync::Arc;

use audience_core::config::AppConfig;
use audience_core::types::PageRequest;
use audience_segmentation::SegmentService;
use audience_store::{MemoryRecordStore, MemorySegmentStore};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "audience-admin")]
#[command(about = "Audience segmentation administration tool")]
#[command(version)]
struct Cli {
    /// Number of synthetic users to seed (overrides config)
    #[arg(long, env = "AUDIENCE__SEED__COUNT")]
    seed_count: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the dataset and print a small sample
    Sample,

    /// Create a segment from a JSON rules payload and print it
    CreateSegment {
        /// Segment name
        #[arg(short, long)]
        name: String,

        /// Rules as JSON: a flat rule array or a tagged logic tree
        #[arg(short, long)]
        rules: String,
    },

    /// Create a segment and list one page of its members
    Members {
        /// Rules as JSON
        #[arg(short, long)]
        rules: String,

        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size (capped at 200)
        #[arg(long)]
        limit: Option<u32>,
    },

    /// List seeded users, optionally filtered by a name/email search
    Users {
        /// Case-insensitive search over name and email
        #[arg(short, long)]
        query: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        limit: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audience=info,audience_admin=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config =
        AppConfig::load().map_err(|e| audience_core::AudienceError::Config(e.to_string()))?;
    if let Some(count) = cli.seed_count {
        config.seed.count = count;
    }

    let records = Arc::new(MemoryRecordStore::new());
    seeder::seed_records(&records, &config.seed);
    let service = SegmentService::new(records, Arc::new(MemorySegmentStore::new()));

    let default_limit = config.pagination.default_limit;
    match cli.command {
        Commands::Sample => {
            let page = service.search_users(None, &PageRequest::new(1, 20))?;
            info!(total = page.total, "Sample of seeded users");
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::CreateSegment { name, rules } => {
            let rules: serde_json::Value = serde_json::from_str(&rules)?;
            let segment = service.create_segment(&name, &rules)?;
            println!("{}", serde_json::to_string_pretty(&segment)?);
        }
        Commands::Members { rules, page, limit } => {
            let rules: serde_json::Value = serde_json::from_str(&rules)?;
            let segment = service.create_segment("ad-hoc", &rules)?;
            let members = service.segment_members(
                &segment.id,
                &PageRequest::new(page, limit.unwrap_or(default_limit)),
            )?;
            println!("{}", serde_json::to_string_pretty(&members)?);
        }
        Commands::Users { query, page, limit } => {
            let listing = service.search_users(
                query.as_deref(),
                &PageRequest::new(page, limit.unwrap_or(default_limit)),
            )?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
    }

    Ok(())
}
