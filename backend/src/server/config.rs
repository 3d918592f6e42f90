//! Application settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `LEARNING_*` environment variables and
//! configuration files, in that order of precedence. Unset optional values
//! fall back to the defaults exposed by the accessor methods.

use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use learning_platform::domain::{
    CacheTtls, DiscountError, DiscountPolicy, NoCouponDiscount, PercentageCouponTable,
    RetryPolicy, StudentPolicy, UnknownStudentPolicy,
};
use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_EXPIRY_SWEEP_SECS: u64 = 3_600;

/// Runtime configuration for the enrollment service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "LEARNING")]
pub struct AppSettings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL; the in-memory store is used when unset.
    pub database_url: Option<String>,
    /// Redis URL for the course cache; an in-process cache is used when unset.
    pub redis_url: Option<String>,
    /// Upper bound on pooled database connections.
    pub db_max_connections: Option<u32>,
    /// Attempts per enrollment transaction before giving up.
    pub enrollment_max_attempts: Option<u32>,
    pub availability_ttl_secs: Option<u64>,
    pub details_ttl_secs: Option<u64>,
    pub search_ttl_secs: Option<u64>,
    /// `always_create` or `reuse_existing`.
    pub student_policy: Option<String>,
    /// Coupon table as `CODE=PERCENT` pairs separated by commas.
    pub coupons: Option<String>,
    /// Seconds between expiry sweeps; `0` disables the sweep.
    pub expiry_sweep_secs: Option<u64>,
    /// Apply embedded migrations before serving.
    #[ortho_config(default = false)]
    pub run_migrations: bool,
}

impl AppSettings {
    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR).parse()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self.enrollment_max_attempts {
            Some(attempts) => RetryPolicy::with_max_attempts(attempts),
            None => RetryPolicy::default(),
        }
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        let defaults = CacheTtls::default();
        let secs = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };
        CacheTtls {
            availability: secs(self.availability_ttl_secs, defaults.availability),
            details: secs(self.details_ttl_secs, defaults.details),
            search: secs(self.search_ttl_secs, defaults.search),
        }
    }

    pub fn student_policy(&self) -> Result<StudentPolicy, UnknownStudentPolicy> {
        self.student_policy
            .as_deref()
            .map_or(Ok(StudentPolicy::default()), str::parse)
    }

    /// Discount policy built from the coupon table, if one is configured.
    pub fn discount_policy(&self) -> Result<Arc<dyn DiscountPolicy>, DiscountError> {
        match self.coupons.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Ok(Arc::new(PercentageCouponTable::parse(raw)?)),
            _ => Ok(Arc::new(NoCouponDiscount)),
        }
    }

    /// Interval between expiry sweeps, or `None` when disabled.
    pub fn expiry_sweep_interval(&self) -> Option<Duration> {
        match self.expiry_sweep_secs.unwrap_or(DEFAULT_EXPIRY_SWEEP_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 12] = [
        "LEARNING_BIND_ADDR",
        "LEARNING_DATABASE_URL",
        "LEARNING_REDIS_URL",
        "LEARNING_DB_MAX_CONNECTIONS",
        "LEARNING_ENROLLMENT_MAX_ATTEMPTS",
        "LEARNING_AVAILABILITY_TTL_SECS",
        "LEARNING_DETAILS_TTL_SECS",
        "LEARNING_SEARCH_TTL_SECS",
        "LEARNING_STUDENT_POLICY",
        "LEARNING_COUPONS",
        "LEARNING_EXPIRY_SWEEP_SECS",
        "LEARNING_RUN_MIGRATIONS",
    ];

    fn load_from_empty_args() -> AppSettings {
        AppSettings::load_from_iter([OsString::from("learning-platform")])
            .expect("config should load")
    }

    fn env_with(overrides: &[(&'static str, &str)]) -> Vec<(&'static str, Option<String>)> {
        VARS.iter()
            .map(|name| {
                let value = overrides
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| (*value).to_owned());
                (*name, value)
            })
            .collect()
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(env_with(&[]));

        let settings = load_from_empty_args();

        assert_eq!(
            settings.bind_addr().expect("default addr"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("addr")
        );
        assert!(settings.database_url.is_none());
        assert!(settings.redis_url.is_none());
        assert_eq!(settings.db_max_connections(), 10);
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
        assert_eq!(settings.cache_ttls(), CacheTtls::default());
        assert_eq!(settings.student_policy(), Ok(StudentPolicy::AlwaysCreate));
        assert_eq!(
            settings.expiry_sweep_interval(),
            Some(Duration::from_secs(3_600))
        );
        assert!(!settings.run_migrations);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env(env_with(&[
            ("LEARNING_BIND_ADDR", "127.0.0.1:9000"),
            ("LEARNING_DATABASE_URL", "postgres://localhost/learning"),
            ("LEARNING_ENROLLMENT_MAX_ATTEMPTS", "5"),
            ("LEARNING_AVAILABILITY_TTL_SECS", "15"),
            ("LEARNING_STUDENT_POLICY", "reuse_existing"),
            ("LEARNING_EXPIRY_SWEEP_SECS", "0"),
            ("LEARNING_RUN_MIGRATIONS", "true"),
        ]));

        let settings = load_from_empty_args();

        assert_eq!(
            settings.bind_addr().expect("addr"),
            "127.0.0.1:9000".parse::<SocketAddr>().expect("addr")
        );
        assert_eq!(
            settings.database_url.as_deref(),
            Some("postgres://localhost/learning")
        );
        assert_eq!(settings.retry_policy().attempts(), 5);
        assert_eq!(settings.cache_ttls().availability, Duration::from_secs(15));
        assert_eq!(settings.cache_ttls().details, Duration::from_secs(300));
        assert_eq!(settings.student_policy(), Ok(StudentPolicy::ReuseExisting));
        assert_eq!(settings.expiry_sweep_interval(), None);
        assert!(settings.run_migrations);
    }

    #[rstest]
    fn invalid_values_surface_through_accessors() {
        let _guard = lock_env(env_with(&[
            ("LEARNING_BIND_ADDR", "not an address"),
            ("LEARNING_STUDENT_POLICY", "sometimes"),
            ("LEARNING_COUPONS", "VIP=250"),
        ]));

        let settings = load_from_empty_args();

        assert!(settings.bind_addr().is_err());
        assert!(settings.student_policy().is_err());
        assert!(settings.discount_policy().is_err());
    }
}
