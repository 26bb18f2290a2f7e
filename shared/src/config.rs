use std::env;
use std::time::Duration;

const DEFAULT_TABLE_NAME: &str = "civic-complaints";
const DEFAULT_PHOTO_BUCKET: &str = "civic-complaint-photos";
const DEFAULT_ZONE_NAME: &str = "City-Wide";
const DEFAULT_FALLBACK_DEPARTMENT: &str = "General Administration";
const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_VALIDATION_REWARD_POINTS: u32 = 10;
const DEFAULT_SLA_SWEEP_INTERVAL_SECS: u64 = 15 * 60;

/// Runtime settings shared by the API and monitor lambdas.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub table_name: String,
    pub photo_bucket: String,
    pub default_zone_name: String,
    pub fallback_department_name: String,
    pub classifier_url: Option<String>,
    pub classifier_timeout: Duration,
    pub validation_reward_points: u32,
    pub sla_sweep_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            photo_bucket: DEFAULT_PHOTO_BUCKET.to_string(),
            default_zone_name: DEFAULT_ZONE_NAME.to_string(),
            fallback_department_name: DEFAULT_FALLBACK_DEPARTMENT.to_string(),
            classifier_url: None,
            classifier_timeout: Duration::from_millis(DEFAULT_CLASSIFIER_TIMEOUT_MS),
            validation_reward_points: DEFAULT_VALIDATION_REWARD_POINTS,
            sla_sweep_interval: Duration::from_secs(DEFAULT_SLA_SWEEP_INTERVAL_SECS),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        Self {
            table_name: text("TABLE_NAME", defaults.table_name),
            photo_bucket: text("PHOTO_BUCKET", defaults.photo_bucket),
            default_zone_name: text("DEFAULT_ZONE_NAME", defaults.default_zone_name),
            fallback_department_name: text(
                "FALLBACK_DEPARTMENT_NAME",
                defaults.fallback_department_name,
            ),
            classifier_url: lookup("CLASSIFIER_URL")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            classifier_timeout: Duration::from_millis(parse_or(
                &lookup,
                "CLASSIFIER_TIMEOUT_MS",
                DEFAULT_CLASSIFIER_TIMEOUT_MS,
            )),
            validation_reward_points: parse_or(
                &lookup,
                "VALIDATION_REWARD_POINTS",
                DEFAULT_VALIDATION_REWARD_POINTS,
            ),
            sla_sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                "SLA_SWEEP_INTERVAL_SECS",
                DEFAULT_SLA_SWEEP_INTERVAL_SECS,
            )),
        }
    }
}

fn parse_or<T: std::str::FromStr + std::fmt::Display + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}
