use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `AUDIENCE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when the caller does not supply one.
    #[serde(default = "default_page_limit")]
    pub default_limit: u32,
    /// Hard cap on page size; larger requests are clamped, not rejected.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_seed_count")]
    pub count: usize,
    #[serde(default = "default_spend_ceiling")]
    pub spend_ceiling: f64,
    #[serde(default = "default_max_visits")]
    pub max_visits: u32,
    /// Seeded `last_active_at` values fall within this many days of now.
    #[serde(default = "default_active_window_days")]
    pub active_window_days: i64,
}

// Default functions
fn default_page_limit() -> u32 {
    50
}
fn default_max_limit() -> u32 {
    200
}
fn default_seed_count() -> usize {
    200
}
fn default_spend_ceiling() -> f64 {
    20_000.0
}
fn default_max_visits() -> u32 {
    50
}
fn default_active_window_days() -> i64 {
    365
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            count: default_seed_count(),
            spend_ceiling: default_spend_ceiling(),
            max_visits: default_max_visits(),
            active_window_days: default_active_window_days(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pagination: PaginationConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("AUDIENCE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
