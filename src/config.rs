use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,

    /// Base URL of the external tax-calculation service.
    pub tax_engine_url: String,
    pub tax_engine_timeout_secs: u64,

    /// Days between a period end and its pay date (provincial convention;
    /// 6 for Saskatchewan, where this product launched).
    pub pay_date_offset_days: i64,

    // Rate limiting
    pub rate_run_ops_per_min: u32,
    pub rate_read_per_min: u32,

    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://payrun.db?mode=rwc".to_string()),
            tax_engine_url: env::var("TAX_ENGINE_URL").expect("TAX_ENGINE_URL must be set"),
            tax_engine_timeout_secs: env::var("TAX_ENGINE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            pay_date_offset_days: env::var("PAY_DATE_OFFSET_DAYS")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .unwrap(),
            rate_run_ops_per_min: env::var("RATE_RUN_OPS_PER_MIN")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap(),
            rate_read_per_min: env::var("RATE_READ_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
        }
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            tax_engine_url: "http://localhost:0".to_string(),
            tax_engine_timeout_secs: 5,
            pay_date_offset_days: 6,
            rate_run_ops_per_min: 10_000,
            rate_read_per_min: 10_000,
            api_prefix: "/api".to_string(),
        }
    }
}
