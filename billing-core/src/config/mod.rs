//! Configuration for the billing pipeline.

use std::env;
use std::time::Duration;

use service_core::config::Config as CoreConfig;
use service_core::error::AppError;

/// Tunables for the event ingestion pipeline.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// High-water mark for the in-process idempotency cache; the oldest
    /// half is evicted when the mark is exceeded.
    pub idempotency_capacity: usize,
    /// Timeout applied to every individual collaborator call.
    pub call_timeout_secs: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            idempotency_capacity: 10_000,
            call_timeout_secs: 10,
        }
    }
}

impl ProcessorConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Tunables for the stuck-record reconciliation sweep.
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// How long a record may sit in `processing` before the sweep fails it.
    pub processing_timeout_secs: u64,
    /// Interval between sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            processing_timeout_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl ReconciliationConfig {
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub common: CoreConfig,
    pub processor: ProcessorConfig,
    pub reconciliation: ReconciliationConfig,
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let common = CoreConfig::load()?;

        let processor = ProcessorConfig {
            idempotency_capacity: parse_env(
                "BILLING_IDEMPOTENCY_CAPACITY",
                ProcessorConfig::default().idempotency_capacity,
            )?,
            call_timeout_secs: parse_env(
                "BILLING_CALL_TIMEOUT_SECS",
                ProcessorConfig::default().call_timeout_secs,
            )?,
        };

        let reconciliation = ReconciliationConfig {
            processing_timeout_secs: parse_env(
                "BILLING_PROCESSING_TIMEOUT_SECS",
                ReconciliationConfig::default().processing_timeout_secs,
            )?,
            sweep_interval_secs: parse_env(
                "BILLING_SWEEP_INTERVAL_SECS",
                ReconciliationConfig::default().sweep_interval_secs,
            )?,
        };

        Ok(Self {
            common,
            processor,
            reconciliation,
        })
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            common: CoreConfig::default(),
            processor: ProcessorConfig::default(),
            reconciliation: ReconciliationConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, raw))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = BillingConfig::default();
        assert_eq!(config.processor.idempotency_capacity, 10_000);
        assert_eq!(config.processor.call_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.reconciliation.processing_timeout(),
            Duration::from_secs(300)
        );
    }
}
