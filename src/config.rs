use crate::error::{FluxgenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_TRANSLATE_MODEL: &str = "@cf/qwen/qwen1.5-14b-chat-awq";
pub const DEFAULT_MODEL_ID: &str = "FLUX.1-Schnell-CF";
pub const DEFAULT_NUM_STEPS: i32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudflareAccount {
    pub account_id: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct CloudflareConfig {
    pub accounts: Vec<CloudflareAccount>,
    pub translate_model: String,
    pub api_base: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: Option<u16>,
    pub cloudflare: CloudflareConfig,
    pub model_map: BTreeMap<String, String>,
    pub default_model: String,
    pub num_steps: i32,
}

/// Models offered when `CUSTOMER_MODEL_MAP` is not set.
pub fn default_model_map() -> BTreeMap<String, String> {
    [
        ("FLUX.1-Schnell-CF", "@cf/black-forest-labs/flux-1-schnell"),
        ("SDXL-Base-CF", "@cf/stabilityai/stable-diffusion-xl-base-1.0"),
        ("SDXL-Lightning-CF", "@cf/bytedance/stable-diffusion-xl-lightning"),
        ("DreamShaper-8-LCM-CF", "@cf/lykon/dreamshaper-8-lcm"),
    ]
    .into_iter()
    .map(|(id, path)| (id.to_string(), path.to_string()))
    .collect()
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        CloudflareConfig {
            accounts: Vec::new(),
            translate_model: DEFAULT_TRANSLATE_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: None,
        }
    }
}

impl CloudflareConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let accounts = match lookup("CF_ACCOUNT_LIST") {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(|e| {
                FluxgenError::ConfigError(format!("CF_ACCOUNT_LIST is not valid JSON: {}", e))
            })?,
            _ => Vec::new(),
        };
        let timeout_secs = match lookup("CF_TIMEOUT_SECS") {
            Some(raw) => Some(raw.trim().parse().map_err(|_| {
                FluxgenError::ConfigError(format!("CF_TIMEOUT_SECS is not a number: {}", raw))
            })?),
            None => None,
        };

        Ok(CloudflareConfig {
            accounts,
            translate_model: lookup("CF_TRANSLATE_MODEL")
                .unwrap_or_else(|| DEFAULT_TRANSLATE_MODEL.to_string()),
            api_base: lookup("CF_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeout_secs,
        })
    }

    pub fn with_account(
        mut self,
        account_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        self.accounts.push(CloudflareAccount {
            account_id: account_id.into(),
            token: token.into(),
        });
        self
    }

    pub fn with_translate_model(mut self, model: impl Into<String>) -> Self {
        self.translate_model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: None,
            cloudflare: CloudflareConfig::default(),
            model_map: default_model_map(),
            default_model: DEFAULT_MODEL_ID.to_string(),
            num_steps: DEFAULT_NUM_STEPS,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => Some(raw.trim().parse().map_err(|_| {
                FluxgenError::ConfigError(format!("PORT is not a valid port: {}", raw))
            })?),
            None => None,
        };
        let model_map = match lookup("CUSTOMER_MODEL_MAP") {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(|e| {
                FluxgenError::ConfigError(format!("CUSTOMER_MODEL_MAP is not valid JSON: {}", e))
            })?,
            _ => default_model_map(),
        };
        let num_steps = match lookup("FLUX_NUM_STEPS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                FluxgenError::ConfigError(format!("FLUX_NUM_STEPS is not a number: {}", raw))
            })?,
            None => DEFAULT_NUM_STEPS,
        };

        Ok(Config {
            port,
            cloudflare: CloudflareConfig::from_lookup(&lookup)?,
            model_map,
            default_model: lookup("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            num_steps,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_cloudflare(mut self, config: CloudflareConfig) -> Self {
        self.cloudflare = config;
        self
    }

    pub fn with_model(mut self, id: impl Into<String>, path: impl Into<String>) -> Self {
        self.model_map.insert(id.into(), path.into());
        self
    }

    pub fn with_num_steps(mut self, num_steps: i32) -> Self {
        self.num_steps = num_steps;
        self
    }

    /// Checks the parts the server cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.cloudflare.accounts.is_empty() {
            return Err(FluxgenError::ConfigError(
                "CF_ACCOUNT_LIST must contain at least one account".into(),
            ));
        }
        if self.model_map.is_empty() {
            return Err(FluxgenError::ConfigError(
                "CUSTOMER_MODEL_MAP must contain at least one model".into(),
            ));
        }
        if !self.model_map.contains_key(&self.default_model) {
            return Err(FluxgenError::ConfigError(format!(
                "Default model {} is not in the model map",
                self.default_model
            )));
        }
        Ok(())
    }
}
