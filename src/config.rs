//! Client configuration and secret resolution

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// Scalar option value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue
{   Bool(bool)
  , Int(i64)
  , Float(f64)
  , String(String)
}

impl OptionValue
{   pub fn as_str(&self) -> Option<&str>
    {   match self
        {   OptionValue::String(s) => Some(s.as_str())
          , _ => None
        }
    }

    pub fn as_f64(&self) -> Option<f64>
    {   match self
        {   OptionValue::Int(i) => Some(*i as f64)
          , OptionValue::Float(f) => Some(*f)
          , _ => None
        }
    }

    pub fn as_i64(&self) -> Option<i64>
    {   match self
        {   OptionValue::Int(i) => Some(*i)
          , _ => None
        }
    }
}

impl fmt::Display for OptionValue
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   OptionValue::Bool(b) => write!(f, "{}", b)
          , OptionValue::Int(i) => write!(f, "{}", i)
          , OptionValue::Float(x) => write!(f, "{}", x)
          , OptionValue::String(s) => write!(f, "{}", s)
        }
    }
}

impl From<&str> for OptionValue
{   fn from(s: &str) -> Self
    {   OptionValue::String(s.to_string())
    }
}

impl From<String> for OptionValue
{   fn from(s: String) -> Self
    {   OptionValue::String(s)
    }
}

impl From<f64> for OptionValue
{   fn from(x: f64) -> Self
    {   OptionValue::Float(x)
    }
}

impl From<i64> for OptionValue
{   fn from(i: i64) -> Self
    {   OptionValue::Int(i)
    }
}

impl From<bool> for OptionValue
{   fn from(b: bool) -> Self
    {   OptionValue::Bool(b)
    }
}

/// Declarative provider configuration
///
/// `options` is pass-through: backends read the keys they need and
/// leave the rest alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig
{   /// Backend family tag, e.g. "openai"
    pub provider: String
  , /// Option name to scalar value
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>
}

impl ProviderConfig
{   pub fn new(provider: impl Into<String>) -> Self
    {   ProviderConfig
        {   provider: provider.into()
          , options: BTreeMap::new()
        }
    }

    pub fn with_option(
      mut self
    , key: impl Into<String>
    , value: impl Into<OptionValue>
    ) -> Self
    {   self.options.insert(key.into(), value.into());
        self
    }

    pub fn option(&self, key: &str) -> Option<&OptionValue>
    {   self.options.get(key)
    }

    /// Required string option
    pub fn require_str(&self, key: &str) -> Result<&str>
    {   match self.options.get(key)
        {   Some(OptionValue::String(s)) if !s.trim().is_empty() => Ok(s.as_str())
          , Some(OptionValue::String(_)) => {
              error!("Option '{}' is empty for {}", key, self.provider);
              Err(Error::InvalidConfig(format!(
                "option '{}' must not be empty", key
              )))
            }
          , Some(other) => Err(Error::InvalidConfig(format!(
              "option '{}' must be a string, got {}", key, other
            )))
          , None => {
              error!("Missing option '{}' for {}", key, self.provider);
              Err(Error::InvalidConfig(format!(
                "missing required option '{}'", key
              )))
            }
        }
    }

    /// Optional string option; present but non-string is an error
    pub fn optional_str(&self, key: &str) -> Result<Option<&str>>
    {   match self.options.get(key)
        {   None => Ok(None)
          , Some(OptionValue::String(s)) => Ok(Some(s.as_str()))
          , Some(other) => Err(Error::InvalidConfig(format!(
              "option '{}' must be a string, got {}", key, other
            )))
        }
    }

    /// Optional numeric option
    pub fn optional_f64(&self, key: &str) -> Result<Option<f64>>
    {   match self.options.get(key)
        {   None => Ok(None)
          , Some(v) => v.as_f64().map(Some).ok_or_else(||
              Error::InvalidConfig(format!(
                "option '{}' must be a number, got {}", key, v
              ))
            )
        }
    }

    /// Optional non-negative integer option
    pub fn optional_u64(&self, key: &str) -> Result<Option<u64>>
    {   match self.options.get(key)
        {   None => Ok(None)
          , Some(v) => v.as_i64()
              .and_then(|i| u64::try_from(i).ok())
              .map(Some)
              .ok_or_else(|| Error::InvalidConfig(format!(
                "option '{}' must be a non-negative integer, got {}",
                key, v
              )))
        }
    }
}

// ===== Secrets =====

/// Where secret option values come from
pub trait SecretSource
{   fn get(&self, name: &str) -> Option<String>;
}

/// Reads process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets
{   fn get(&self, name: &str) -> Option<String>
    {   std::env::var(name).ok()
    }
}

/// In-memory secrets, mostly for tests
#[derive(Debug, Clone, Default)]
pub struct MapSecrets
{   values: HashMap<String, String>
}

impl MapSecrets
{   pub fn new() -> Self
    {   MapSecrets::default()
    }

    pub fn with(
      mut self
    , name: impl Into<String>
    , value: impl Into<String>
    ) -> Self
    {   self.values.insert(name.into(), value.into());
        self
    }
}

impl SecretSource for MapSecrets
{   fn get(&self, name: &str) -> Option<String>
    {   self.values.get(name).cloned()
    }
}

// ===== Clients file =====

/// Option as written in a clients file: literal or env reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionSpec
{   Env
    {   env: String
    }
  , Value(OptionValue)
}

/// One named client definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSpec
{   pub provider: String
  , #[serde(default)]
    pub options: BTreeMap<String, OptionSpec>
}

/// Named clients loaded from JSON
///
/// ```json
/// { "clients": { "MyClient": { "provider": "openai",
///   "options": { "model": "gpt-35-turbo", "api_key": { "env": "OPENAI_API_KEY" } } } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientsFile
{   pub clients: BTreeMap<String, ClientSpec>
}

impl ClientsFile
{   pub fn load(path: impl AsRef<Path>) -> Result<Self>
    {   let path = path.as_ref();
        debug!("Loading clients from {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|e| {
          error!("Failed to read {}: {}", path.display(), e);
          Error::InvalidConfig(format!(
            "cannot read {}: {}", path.display(), e
          ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self>
    {   serde_json::from_str(raw).map_err(|e| {
          error!("Failed to parse clients file: {}", e);
          Error::InvalidConfig(format!("malformed clients file: {}", e))
        })
    }

    /// Resolve every env reference now; a missing secret fails here
    pub fn resolve(
      &self
    , secrets: &dyn SecretSource
    ) -> Result<BTreeMap<String, ProviderConfig>>
    {   let mut resolved = BTreeMap::new();
        for (name, spec) in &self.clients
        {   let mut config = ProviderConfig::new(spec.provider.clone());
            for (key, option) in &spec.options
            {   let value = match option
                {   OptionSpec::Value(v) => v.clone()
                  , OptionSpec::Env { env } => {
                      let secret = secrets.get(env).ok_or_else(|| {
                        error!(
                          "Client {}: variable {} is not set",
                          name, env
                        );
                        Error::InvalidConfig(format!(
                          "client '{}': environment variable {} is not set",
                          name, env
                        ))
                      })?;
                      OptionValue::String(secret)
                    }
                };
                config.options.insert(key.clone(), value);
            }
            debug!("Resolved client {} ({})", name, spec.provider);
            resolved.insert(name.clone(), config);
        }
        Ok(resolved)
    }
}

/// Failover configuration for the resilient wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverConfig
{   /// Move on to the next client once retries are spent
    pub enabled: bool
  , /// Max retry attempts per client
    pub max_retries: usize
  , /// Backoff multiplier for retries
    pub backoff_multiplier: f32
  , /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64
}

impl Default for FailoverConfig
{   fn default() -> Self
    {   FailoverConfig
        {   enabled: true
          , max_retries: 0
          , backoff_multiplier: 2.0
          , initial_backoff_ms: 100
        }
    }
}
