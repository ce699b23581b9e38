use crate::services::ledger::LedgerPolicy;
use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub razorpay: RazorpayConfig,
    pub ledger: LedgerConfig,
    pub observability: ObservabilityConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

impl RazorpayConfig {
    pub fn is_configured(&self) -> bool {
        !self.key_id.is_empty() && !self.key_secret.expose_secret().is_empty()
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct LedgerConfig {
    pub grace_days: u32,
    pub late_fee_rate: Decimal,
    pub late_fee_period_days: u32,
    pub severe_overdue_days: i64,
    /// Minutes a stamped order blocks new orders for the same records.
    pub order_hold_minutes: i64,
    pub currency: String,
    pub gateway_timeout_seconds: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let policy = LedgerPolicy::default();
        Self {
            grace_days: policy.grace_days,
            late_fee_rate: policy.late_fee_rate,
            late_fee_period_days: policy.late_fee_period_days,
            severe_overdue_days: policy.severe_overdue_days,
            order_hold_minutes: 30,
            currency: "INR".to_string(),
            gateway_timeout_seconds: 10,
        }
    }
}

impl LedgerConfig {
    pub fn policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            grace_days: self.grace_days,
            late_fee_rate: self.late_fee_rate,
            late_fee_period_days: self.late_fee_period_days,
            severe_overdue_days: self.severe_overdue_days,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let host = or("LEDGER_SERVICE_HOST", "0.0.0.0");
        let port = parse(&var, "LEDGER_SERVICE_PORT", 3010)?;

        let db_url =
            var("LEDGER_DATABASE_URL").ok_or_else(|| anyhow!("LEDGER_DATABASE_URL must be set"))?;
        let db_name = or("LEDGER_DATABASE_NAME", "rent_ledger_db");

        let timeout_seconds = parse(&var, "GATEWAY_TIMEOUT_SECONDS", 10)?;
        let razorpay = RazorpayConfig {
            key_id: or("RAZORPAY_KEY_ID", ""),
            key_secret: Secret::new(or("RAZORPAY_KEY_SECRET", "")),
            webhook_secret: Secret::new(or("RAZORPAY_WEBHOOK_SECRET", "")),
            api_base_url: or("RAZORPAY_API_BASE_URL", "https://api.razorpay.com/v1"),
            timeout_seconds,
        };

        let defaults = LedgerConfig::default();
        let ledger = LedgerConfig {
            grace_days: parse(&var, "LEDGER_GRACE_DAYS", defaults.grace_days)?,
            late_fee_rate: parse(&var, "LEDGER_LATE_FEE_RATE", defaults.late_fee_rate)?,
            late_fee_period_days: parse(
                &var,
                "LEDGER_LATE_FEE_PERIOD_DAYS",
                defaults.late_fee_period_days,
            )?,
            severe_overdue_days: parse(
                &var,
                "LEDGER_SEVERE_OVERDUE_DAYS",
                defaults.severe_overdue_days,
            )?,
            order_hold_minutes: parse(&var, "LEDGER_ORDER_HOLD_MINUTES", defaults.order_hold_minutes)?,
            currency: or("LEDGER_CURRENCY", &defaults.currency),
            gateway_timeout_seconds: timeout_seconds,
        };
        if ledger.late_fee_period_days == 0 {
            return Err(anyhow!("LEDGER_LATE_FEE_PERIOD_DAYS must be positive"));
        }
        if ledger.late_fee_rate < Decimal::ZERO {
            return Err(anyhow!("LEDGER_LATE_FEE_RATE must not be negative"));
        }

        let observability = ObservabilityConfig {
            log_level: or("LOG_LEVEL", "info,rent_ledger_service=debug"),
            otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT"),
        };

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            razorpay,
            ledger,
            observability,
            service_name: "rent-ledger-service".to_string(),
        })
    }
}

fn parse<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn applies_defaults() {
        let config =
            Config::from_lookup(lookup(&[("LEDGER_DATABASE_URL", "mongodb://localhost:27017")]))
                .unwrap();

        assert_eq!(config.server.port, 3010);
        assert_eq!(config.database.db_name, "rent_ledger_db");
        assert!(!config.razorpay.is_configured());
        assert_eq!(config.razorpay.timeout_seconds, 10);
        assert_eq!(config.ledger.grace_days, 5);
        assert_eq!(config.ledger.late_fee_rate, Decimal::new(5, 2));
        assert_eq!(config.ledger.order_hold_minutes, 30);
        assert_eq!(config.ledger.currency, "INR");
        assert!(config.observability.otlp_endpoint.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("LEDGER_DATABASE_URL", "mongodb://db:27017"),
            ("LEDGER_SERVICE_PORT", "8080"),
            ("RAZORPAY_KEY_ID", "rzp_test_1"),
            ("RAZORPAY_KEY_SECRET", "secret"),
            ("LEDGER_LATE_FEE_RATE", "0.1"),
            ("LEDGER_GRACE_DAYS", "7"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://otel:4317"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.razorpay.is_configured());
        assert_eq!(config.ledger.policy().late_fee_rate, Decimal::new(1, 1));
        assert_eq!(config.ledger.policy().grace_days, 7);
        assert_eq!(
            config.observability.otlp_endpoint.as_deref(),
            Some("http://otel:4317")
        );
    }

    #[test]
    fn requires_database_url() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = Config::from_lookup(lookup(&[
            ("LEDGER_DATABASE_URL", "mongodb://localhost"),
            ("LEDGER_GRACE_DAYS", "five"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LEDGER_GRACE_DAYS"));
    }
}
