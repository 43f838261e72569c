use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{DigestError, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CACHE_CONTROL: &str = "no-store, max-age=0";

#[derive(Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub digest: DigestSettings,
    pub cache_control: String,
}

/// Everything the digest service needs to talk to the provider.
#[derive(Clone)]
pub struct DigestSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub cache_ttl: Duration,
    pub grounding: bool,
    pub upstream_timeout: Duration,
}

impl Default for DigestSettings {
    fn default() -> Self {
        DigestSettings {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            grounding: true,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

// Keep the key out of Debug output.
impl std::fmt::Debug for DigestSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("cache_ttl", &self.cache_ttl)
            .field("grounding", &self.grounding)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        // A missing key is reported per request, not at startup
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| DigestError::Configuration(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| DigestError::Configuration(format!("Invalid host address: {}", e)))?;

        let server_addr = SocketAddr::new(ip, port);

        let digest = DigestSettings {
            api_key,
            api_base: env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            cache_ttl: secs_var("DIGEST_CACHE_TTL_SECS", DEFAULT_CACHE_TTL)?,
            grounding: match env::var("DIGEST_GROUNDING") {
                Ok(raw) => parse_flag(&raw).ok_or_else(|| {
                    DigestError::Configuration(format!("Invalid DIGEST_GROUNDING value: {}", raw))
                })?,
                Err(_) => true,
            },
            upstream_timeout: secs_var("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT)?,
        };

        let cache_control = env::var("HTTP_CACHE_CONTROL").unwrap_or_else(|_| DEFAULT_CACHE_CONTROL.to_string());

        Ok(Config {
            server_addr,
            digest,
            cache_control,
        })
    }
}

fn secs_var(name: &str, default: Duration) -> Result<Duration> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| DigestError::Configuration(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
