//! Process-start configuration, read once from the environment.
//!
//! Grounded on spec.md section 6's environment-variable list and the design
//! note that singletons become explicit dependencies: this struct is built
//! once in `main` and handed to [`crate::ApiState`], never re-read or
//! mutated at call sites (SPEC_FULL.md section B, "Config").

use medsim_job::GovernorConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Accepted `X-API-Key` header values. Empty means auth is disabled,
    /// matching a local/dev deployment with no `API_KEY` set.
    pub api_keys: Vec<String>,
    pub cors_origins: Vec<String>,
    pub max_patients_per_job: u32,
    pub job_timeout_seconds: u64,
    pub cache_enabled: bool,
    pub cache_ttl_seconds: u64,
    pub enable_medical_simulation: bool,
    pub enable_treatment_utility_model: bool,
    pub governor: GovernorConfig,
    pub bind_addr: String,
    /// Number of background workers pulling pending jobs, highest priority
    /// first (`job_worker.py::JobWorkerPool`'s `pool_size`, default 2).
    pub job_worker_pool_size: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let api_keys = std::env::var("API_KEY")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let cors_origins = std::env::var("CORS_ORIGINS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        Self {
            api_keys,
            cors_origins,
            max_patients_per_job: env_u32("MAX_PATIENTS_PER_JOB", 50_000),
            job_timeout_seconds: env_u64("JOB_TIMEOUT_SECONDS", 600),
            cache_enabled: env_bool("CACHE_ENABLED", true),
            cache_ttl_seconds: env_u64("CACHE_TTL", 300),
            enable_medical_simulation: env_bool("ENABLE_MEDICAL_SIMULATION", true),
            enable_treatment_utility_model: env_bool("ENABLE_TREATMENT_UTILITY_MODEL", true),
            governor: GovernorConfig::from_env(),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            job_worker_pool_size: env_u32("JOB_WORKER_POOL_SIZE", 2) as usize,
        }
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hold_when_env_unset() {
        std::env::remove_var("API_KEY");
        std::env::remove_var("MAX_PATIENTS_PER_JOB");
        let config = AppConfig::from_env();
        assert!(config.api_keys.is_empty());
        assert_eq!(config.max_patients_per_job, 50_000);
        assert!(config.cache_enabled);
    }

    #[test]
    fn api_key_csv_is_split_and_trimmed() {
        std::env::set_var("API_KEY", " key-a ,key-b");
        let config = AppConfig::from_env();
        assert_eq!(config.api_keys, vec!["key-a".to_string(), "key-b".to_string()]);
        std::env::remove_var("API_KEY");
    }
}
