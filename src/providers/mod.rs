//! LLM provider implementations and the provider factory

pub mod openai;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use crate::client::ProviderClient;
use crate::config::{OptionValue, ProviderConfig};
use crate::error::{Error, Result};
use crate::request::ProviderResponse;

pub use openai::ChatProvider;

/// A backend that turns a prompt into generated text.
///
/// Implementations hold no per-call state; one instance serves any
/// number of concurrent calls.
#[async_trait]
pub trait Provider: Send + Sync
{   /// Provider tag, e.g. "openai"
    fn name(&self) -> &str;

    /// One round trip to the backend
    async fn complete(&self, prompt: &str) -> Result<ProviderResponse>;
}

/// Backend families the factory knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag
{   /// OpenAI chat completions
    OpenAi
  , /// Mistral AI, OpenAI-compatible chat completions
    Mistral
}

impl ProviderTag
{   pub fn as_str(&self) -> &'static str
    {   match self
        {   ProviderTag::OpenAi => "openai"
          , ProviderTag::Mistral => "mistral"
        }
    }

    pub fn default_base_url(&self) -> &'static str
    {   match self
        {   ProviderTag::OpenAi => "https://api.openai.com/v1"
          , ProviderTag::Mistral => "https://api.mistral.ai/v1"
        }
    }
}

impl fmt::Display for ProviderTag
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   f.write_str(self.as_str())
    }
}

impl FromStr for ProviderTag
{   type Err = Error;

    fn from_str(s: &str) -> Result<Self>
    {   match s.trim().to_ascii_lowercase().as_str()
        {   "openai" => Ok(ProviderTag::OpenAi)
          , "mistral" | "mistralai" => Ok(ProviderTag::Mistral)
          , _ => {
              error!("Unsupported provider tag: {}", s);
              Err(Error::UnsupportedProvider(s.to_string()))
            }
        }
    }
}

/// Build a client for `provider_tag` from declarative options.
///
/// No network traffic happens here; the connection is made on first use.
pub fn create(
  provider_tag: &str
, options: BTreeMap<String, OptionValue>
) -> Result<ProviderClient>
{   debug!("Creating {} client", provider_tag);
    let tag: ProviderTag = provider_tag.parse()?;
    let config = ProviderConfig
    {   provider: tag.as_str().to_string()
      , options
    };
    let timeout = crate::client::timeout_from(&config)?;
    let provider = ChatProvider::from_config(tag, &config, timeout)?;
    ProviderClient::from_provider(config, std::sync::Arc::new(provider))
}
