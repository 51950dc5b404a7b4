// Configuration structure for:
// - Server listening address/port
// - Database connection string
// - Queue sizing (max concurrent lookups, pending capacity)
// - Automation pacing, retry and rate-limit tuning

use dotenv::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub max_concurrent_queries: usize,
    pub queue_capacity: usize,
    pub probe_timeout: Duration,
    pub probe_retry_attempts: usize,
    pub pacing_min: Duration,
    pub pacing_max: Duration,
    pub query_rate_limit: Option<u32>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:regions.db".to_string());
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);
        let max_concurrent_queries = env::var("MAX_CONCURRENT_QUERIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(3);
        let queue_capacity = env::var("QUEUE_CAPACITY")
            .unwrap_or_else(|_| "128".to_string())
            .parse()
            .unwrap_or(128);
        let probe_timeout = env::var("PROBE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "45".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(45));
        let probe_retry_attempts = env::var("PROBE_RETRY_ATTEMPTS")
            .map(|v| v.parse().unwrap_or(2))
            .unwrap_or(2);
        let pacing_min = env::var("PACING_MIN_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(2000));
        let pacing_max = env::var("PACING_MAX_MS")
            .unwrap_or_else(|_| "4000".to_string())
            .parse()
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(4000));
        let query_rate_limit = env::var("QUERY_RATE_LIMIT")
            .map(|v| v.parse().ok())
            .unwrap_or(None);

        Self {
            database_url,
            server_host,
            server_port,
            max_concurrent_queries,
            queue_capacity,
            probe_timeout,
            probe_retry_attempts,
            pacing_min,
            pacing_max,
            query_rate_limit,
        }
    }
}
