use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use atc24_server::HubConfig;

const DEFAULT_PORT: u16 = 4173;

// Process configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub hub: HubConfig,
    pub static_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ip: IpAddr = parse_var(&var, "ATC24_BIND")?.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port: u16 = parse_var(&var, "PORT")?.unwrap_or(DEFAULT_PORT);

        let mut hub = HubConfig::default();
        if let Some(url) = var("ATC24_UPSTREAM_URL") {
            hub.upstream_url = url;
        }
        if let Some(url) = var("ATC24_STREAM_URL") {
            hub.stream_url = url;
        }
        if let Some(ms) = parse_var(&var, "ATC24_POLL_INTERVAL_MS")? {
            hub.poll_interval = millis(ms, "ATC24_POLL_INTERVAL_MS")?;
        }
        if let Some(ms) = parse_var(&var, "ATC24_RECONNECT_DELAY_MS")? {
            hub.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&var, "ATC24_HEARTBEAT_INTERVAL_MS")? {
            hub.heartbeat_interval = millis(ms, "ATC24_HEARTBEAT_INTERVAL_MS")?;
        }
        if let Some(ms) = parse_var(&var, "ATC24_LOOKUP_TTL_MS")? {
            hub.lookup_ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&var, "ATC24_CONNECT_TIMEOUT_MS")? {
            hub.connect_timeout = millis(ms, "ATC24_CONNECT_TIMEOUT_MS")?;
        }
        if let Some(ms) = parse_var(&var, "ATC24_STREAM_IDLE_TIMEOUT_MS")? {
            hub.stream_idle_timeout = millis(ms, "ATC24_STREAM_IDLE_TIMEOUT_MS")?;
        }
        if let Some(buffer) = parse_var(&var, "ATC24_SUBSCRIBER_BUFFER")? {
            hub.subscriber_buffer = buffer;
        }

        let static_dir = var("ATC24_STATIC_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            hub,
            static_dir,
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("parse {key}={raw}")))
        .transpose()
}

// Timer intervals must be non-zero.
fn millis(ms: u64, key: &str) -> Result<Duration> {
    anyhow::ensure!(ms > 0, "{key} must be greater than zero");
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:4173".parse().unwrap());
        assert_eq!(config.hub, HubConfig::default());
        assert_eq!(config.static_dir, None);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("ATC24_BIND", "127.0.0.1"),
            ("ATC24_UPSTREAM_URL", "http://localhost:9000"),
            ("ATC24_STREAM_URL", "ws://localhost:9000/wss"),
            ("ATC24_POLL_INTERVAL_MS", "1500"),
            ("ATC24_RECONNECT_DELAY_MS", "500"),
            ("ATC24_LOOKUP_TTL_MS", "0"),
            ("ATC24_SUBSCRIBER_BUFFER", "32"),
            ("ATC24_CONNECT_TIMEOUT_MS", "2500"),
            ("ATC24_STREAM_IDLE_TIMEOUT_MS", "30000"),
            ("ATC24_STATIC_DIR", "public"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.hub.upstream_url, "http://localhost:9000");
        assert_eq!(config.hub.stream_url, "ws://localhost:9000/wss");
        assert_eq!(config.hub.poll_interval, Duration::from_millis(1500));
        assert_eq!(config.hub.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.hub.lookup_ttl, Duration::ZERO);
        assert_eq!(config.hub.subscriber_buffer, 32);
        assert_eq!(config.hub.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.hub.stream_idle_timeout, Duration::from_secs(30));
        assert_eq!(config.static_dir, Some(PathBuf::from("public")));
    }

    #[test]
    fn test_bad_values_are_reported() {
        let err = config(&[("PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = config(&[("ATC24_POLL_INTERVAL_MS", "0")]).unwrap_err();
        assert!(err.to_string().contains("ATC24_POLL_INTERVAL_MS"));

        let err = config(&[("ATC24_STREAM_IDLE_TIMEOUT_MS", "0")]).unwrap_err();
        assert!(err.to_string().contains("ATC24_STREAM_IDLE_TIMEOUT_MS"));
    }
}
