use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use log::{debug, error, trace};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use crate::config::ProviderConfig;
use crate::error::{Error, RequestFailure, Result};
use crate::request::ProviderResponse;
use super::{Provider, ProviderTag};

/// Option keys the chat backend reads; everything else is left alone
const KNOWN_OPTIONS: [&str; 6] =
  ["model", "api_key", "temperature", "max_tokens", "base_url", "timeout_ms"];

// ===== Message Types =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: String
  , pub content: String
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse
{   pub choices: Vec<Choice>
  , #[serde(default)]
    pub usage: Option<Usage>
  , #[serde(default)]
    pub model: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice
{   pub message: ChatMessage
  , pub finish_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage
{   #[serde(default)]
    pub total_tokens: Option<usize>
}

// ===== Chat Provider =====

/// OpenAI-compatible chat completions backend
pub struct ChatProvider
{   tag: ProviderTag
  , model: String
  , api_key: String
  , base_url: String
  , temperature: Option<f32>
  , max_tokens: Option<usize>
  , timeout: Duration
  , http_client: reqwest::Client
}

impl std::fmt::Debug for ChatProvider
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.debug_struct("ChatProvider")
          .field("tag", &self.tag)
          .field("model", &self.model)
          .field("base_url", &self.base_url)
          .field("temperature", &self.temperature)
          .field("max_tokens", &self.max_tokens)
          .field("timeout", &self.timeout)
          .finish_non_exhaustive()
    }
}

impl ChatProvider
{   /// Validate options and build the HTTP client; no request is sent
    pub fn from_config(
      tag: ProviderTag
    , config: &ProviderConfig
    , timeout: Duration
    ) -> Result<Self>
    {   debug!("Building {} chat provider", tag);

        let model = config.require_str("model")?.to_string();
        let api_key = config.require_str("api_key")?.to_string();

        let temperature = match config.optional_f64("temperature")?
        {   Some(t) if !(0.0..=2.0).contains(&t) => {
              error!("Temperature out of range: {}", t);
              return Err(Error::InvalidConfig(format!(
                "temperature must be within 0..=2, got {}", t
              )));
            }
          , other => other.map(|t| t as f32)
        };

        let max_tokens = config.optional_u64("max_tokens")?
          .map(|n| n as usize);

        let base_url = config.optional_str("base_url")?
          .unwrap_or(tag.default_base_url())
          .trim_end_matches('/')
          .to_string();

        let extra: BTreeSet<&str> = config.options.keys()
          .map(String::as_str)
          .filter(|k| !KNOWN_OPTIONS.contains(k))
          .collect();
        if !extra.is_empty()
        {   debug!("Keeping pass-through options: {:?}", extra);
        }

        let http_client = reqwest::Client::builder()
          .timeout(timeout)
          .build()
          .map_err(|e| {
            error!("Failed to build HTTP client: {}", e);
            Error::InvalidConfig(format!("http client: {}", e))
          })?;

        Ok(ChatProvider
        {   tag
          , model
          , api_key
          , base_url
          , temperature
          , max_tokens
          , timeout
          , http_client
        })
    }

    pub fn model(&self) -> &str
    {   &self.model
    }

    pub fn base_url(&self) -> &str
    {   &self.base_url
    }

    fn build_request(&self, prompt: &str) -> ChatRequest
    {   ChatRequest
        {   model: self.model.clone()
          , messages: vec![
              ChatMessage
              {   role: "user".to_string()
                , content: prompt.to_string()
              }
            ]
          , max_tokens: self.max_tokens
          , temperature: self.temperature
          , stream: Some(false)
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> Error
    {   if e.is_timeout()
        {   error!("{} request timed out", self.tag);
            Error::ProviderTimeout(self.timeout.as_millis() as u64)
        } else
        {   error!("HTTP error: {}", e);
            Error::request(RequestFailure::Network, e.to_string())
        }
    }
}

/// Classify a non-success HTTP status
pub fn failure_for_status(status: StatusCode) -> RequestFailure
{   match status.as_u16()
    {   401 | 403 => RequestFailure::Auth
      , 429 => RequestFailure::RateLimited
      , _ => RequestFailure::Backend
    }
}

#[async_trait]
impl Provider for ChatProvider
{   fn name(&self) -> &str
    {   self.tag.as_str()
    }

    async fn complete(&self, prompt: &str) -> Result<ProviderResponse>
    {   debug!("Sending prompt to {} ({})", self.tag, self.model);
        let started = Instant::now();
        let request = self.build_request(prompt);
        trace!("{} request: {:?}", self.tag, request);

        let response = self.http_client
          .post(format!("{}/chat/completions", self.base_url))
          .header("Authorization", format!("Bearer {}", self.api_key))
          .header("Content-Type", "application/json")
          .json(&request)
          .send()
          .await
          .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        trace!("{} response status: {}", self.tag, status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("{} API error {}: {}", self.tag, status, error_text);
            return Err(Error::request(
              failure_for_status(status),
              format!("{} returned {}: {}", self.tag, status, error_text)
            ));
        }

        let chat_response: ChatResponse
          = response.json().await.map_err(|e| {
            if e.is_timeout()
            {   return self.map_transport_error(e);
            }
            error!("Parse error: {}", e);
            Error::request(RequestFailure::Backend, e.to_string())
          })?;

        let tokens_used = chat_response.usage
          .and_then(|u| u.total_tokens);
        let model = chat_response.model
          .unwrap_or_else(|| self.model.clone());

        let choice = chat_response.choices.into_iter().next()
          .ok_or_else(|| {
            error!("No choices in response");
            Error::request(
              RequestFailure::Backend,
              "response contained no choices"
            )
          })?;

        Ok(ProviderResponse
        {   generated: choice.message.content
          , provider: self.tag.as_str().to_string()
          , model
          , tokens_used
          , finish_reason: choice.finish_reason
          , latency: started.elapsed()
        })
    }
}
