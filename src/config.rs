//! Service configuration, read from the environment (and `.env` via dotenvy).

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::pricing::PricingPolicy;

#[derive(Debug, Error, PartialEq)]
#[error("Invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError { pub key: &'static str, pub value: String, pub reason: String }

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub nats_url: Option<String>,
    pub pricing: PricingPolicy,
    pub payment: PaymentSettings,
    pub bootstrap_admin_email: Option<String>,
}

/// Simulated gateway behaviour.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentSettings {
    pub delay: Duration,
    /// Charges above this amount are declined.
    pub decline_above: Option<Decimal>,
}

impl Default for PaymentSettings {
    fn default() -> Self { Self { delay: Duration::from_millis(1500), decline_above: None } }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            database_url: None,
            db_max_connections: 10,
            nats_url: None,
            pricing: PricingPolicy::default(),
            payment: PaymentSettings::default(),
            bootstrap_admin_email: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let pricing = PricingPolicy {
            currency: get("CURRENCY").map(|c| c.to_uppercase()).unwrap_or(defaults.pricing.currency),
            tax_rate: parse(&get, "TAX_RATE")?.unwrap_or(defaults.pricing.tax_rate),
            shipping_fee: parse(&get, "SHIPPING_FEE")?.unwrap_or(defaults.pricing.shipping_fee),
            free_shipping_threshold: match parse::<Decimal>(&get, "FREE_SHIPPING_THRESHOLD")? {
                Some(t) if t.is_zero() => None,
                Some(t) => Some(t),
                None => defaults.pricing.free_shipping_threshold,
            },
            max_line_quantity: parse(&get, "MAX_LINE_QUANTITY")?.unwrap_or(defaults.pricing.max_line_quantity),
        };
        if pricing.tax_rate.is_sign_negative() || pricing.tax_rate > Decimal::ONE {
            return Err(ConfigError { key: "TAX_RATE", value: pricing.tax_rate.to_string(), reason: "must be between 0 and 1".into() });
        }
        if pricing.max_line_quantity == 0 {
            return Err(ConfigError { key: "MAX_LINE_QUANTITY", value: "0".into(), reason: "must be at least 1".into() });
        }

        let payment = PaymentSettings {
            delay: parse::<u64>(&get, "PAYMENT_DELAY_MS")?.map(Duration::from_millis).unwrap_or(defaults.payment.delay),
            decline_above: parse(&get, "PAYMENT_DECLINE_ABOVE")?,
        };

        Ok(Self {
            port: parse(&get, "PORT")?.unwrap_or(defaults.port),
            database_url: get("DATABASE_URL"),
            db_max_connections: parse(&get, "DB_MAX_CONNECTIONS")?.unwrap_or(defaults.db_max_connections),
            nats_url: get("NATS_URL"),
            pricing,
            payment,
            bootstrap_admin_email: get("BOOTSTRAP_ADMIN_EMAIL"),
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|value| value.parse::<T>().map_err(|e| ConfigError { key, reason: e.to_string(), value }))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8083);
        assert_eq!(c.database_url, None);
        assert_eq!(c.pricing, PricingPolicy::default());
        assert_eq!(c.payment.delay, Duration::from_millis(1500));
    }

    #[test]
    fn test_overrides() {
        let c = config(&[("PORT", "9000"), ("CURRENCY", "ngn"), ("TAX_RATE", "0.075"), ("FREE_SHIPPING_THRESHOLD", "0"), ("PAYMENT_DECLINE_ABOVE", "1000")]).unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.pricing.currency, "NGN");
        assert_eq!(c.pricing.tax_rate, Decimal::new(75, 3));
        assert_eq!(c.pricing.free_shipping_threshold, None);
        assert_eq!(c.payment.decline_above, Some(Decimal::new(1000, 0)));
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(config(&[("PORT", "eighty")]).unwrap_err().key, "PORT");
        assert_eq!(config(&[("TAX_RATE", "1.5")]).unwrap_err().key, "TAX_RATE");
        assert_eq!(config(&[("MAX_LINE_QUANTITY", "0")]).unwrap_err().key, "MAX_LINE_QUANTITY");
    }
}
