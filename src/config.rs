use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub worker_token_secret: String,
    pub service_key: String,
    pub listen_addr: String,
    pub sweep_interval: Duration,
    pub notify_webhook_url: Option<String>,
    pub cors_origin: String,
}

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup so tests do not touch process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let database_url = lookup("DATABASE_URL").ok_or("DATABASE_URL must be set")?;

        let worker_token_secret =
            lookup("WORKER_TOKEN_SECRET").ok_or("WORKER_TOKEN_SECRET must be set")?;

        let service_key = lookup("SERVICE_KEY").ok_or("SERVICE_KEY must be set")?;

        let listen_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let sweep_interval = parse_sweep_interval(lookup("SWEEP_INTERVAL_SECS").as_deref())?;

        let notify_webhook_url = lookup("NOTIFY_WEBHOOK_URL").filter(|url| !url.trim().is_empty());

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            database_url,
            worker_token_secret,
            service_key,
            listen_addr,
            sweep_interval,
            notify_webhook_url,
            cors_origin,
        })
    }
}

fn parse_sweep_interval(raw: Option<&str>) -> Result<Duration, String> {
    let secs = match raw {
        None => DEFAULT_SWEEP_INTERVAL_SECS,
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("SWEEP_INTERVAL_SECS is not a number: {}", e))?,
    };

    if secs == 0 {
        return Err("SWEEP_INTERVAL_SECS must be greater than zero".to_string());
    }

    Ok(Duration::from_secs(secs))
}
