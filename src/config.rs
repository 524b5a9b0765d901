use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub default_currency: String,
    pub paid_display_limit: usize, // Paid entries shown before the unpaid ones
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|e| anyhow::anyhow!("PORT must be a valid port number: {}", e))?,
                cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN").ok().filter(|o| !o.is_empty()),
            },

            billing: BillingConfig {
                default_currency: env::var("DEFAULT_CURRENCY")
                    .map(|c| c.to_uppercase())
                    .unwrap_or_else(|_| "ZAR".to_string()),
                paid_display_limit: env::var("PAID_DISPLAY_LIMIT")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            default_currency: "ZAR".to_string(),
            paid_display_limit: 3,
        }
    }
}
