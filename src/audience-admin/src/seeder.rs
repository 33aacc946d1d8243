//! Synthetic customer dataset for demos and local runs.

use std::collections::HashMap;

use audience_core::config::SeedConfig;
use audience_store::MemoryRecordStore;
use chrono::{Duration, SecondsFormat, Utc};
use rand::Rng;
use serde_json::json;
use tracing::info;

const FIRST_NAMES: &[&str] = &[
    "Asha", "Vikram", "Neha", "Rohit", "Priya", "Arjun", "Simran", "Aditya", "Kavya", "Sai",
];

/// Populate `store` with synthetic users: cycled names, example.com emails,
/// random spend/visits, and activity timestamps within the configured window.
pub fn seed_records(store: &MemoryRecordStore, config: &SeedConfig) {
    let mut rng = rand::thread_rng();
    let now = Utc::now();

    for i in 1..=config.count {
        let name = format!("{} {}", FIRST_NAMES[i % FIRST_NAMES.len()], i / 10 + 1);
        let email = format!(
            "{}{}@example.com",
            name.replace(' ', "").to_lowercase(),
            i
        );
        let spend = (rng.gen::<f64>() * config.spend_ceiling * 100.0).round() / 100.0;
        let last_active = now - Duration::days(rng.gen_range(0..=config.active_window_days));
        let created = now - Duration::days(rng.gen_range(0..=800));

        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), json!(name));
        attributes.insert("email".to_string(), json!(email));
        attributes.insert("total_spend".to_string(), json!(spend));
        attributes.insert(
            "visits".to_string(),
            json!(rng.gen_range(0..=config.max_visits)),
        );
        attributes.insert(
            "last_active_at".to_string(),
            json!(last_active.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        attributes.insert(
            "created_at".to_string(),
            json!(created.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );

        store.insert(audience_core::types::UserRecord::new(attributes));
    }

    info!(count = store.len(), "Seeded record store");
}
