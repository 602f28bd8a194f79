//! Retry and fallback as a wrapper around base clients
//!
//! The wrapper owns no policy of its own: every decision comes from the
//! [`RecoveryPolicy`] it was built with.

use std::time::Duration;
use async_trait::async_trait;
use log::{debug, error, info};
use crate::client::ProviderClient;
use crate::config::{FailoverConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::providers::Provider;
use crate::request::ProviderResponse;

/// What to do after a recoverable failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery
{   /// Try the same client again after the delay
    Retry(Duration)
  , /// Move to the next client in order
    Fallback
  , /// Surface the error
    GiveUp
}

/// Decides how to react to a recoverable error.
///
/// `attempt` counts retries already spent on the current client.
pub trait RecoveryPolicy: Send + Sync
{   fn decide(&self, attempt: usize, error: &Error) -> Recovery;
}

/// Retry policy for failed requests
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy
{   pub max_retries: usize
  , pub backoff_multiplier: f32
  , pub initial_backoff: Duration
  , pub fallback: bool
}

impl RetryPolicy
{   /// Create a new retry policy
    pub fn new(
      max_retries: usize
    , backoff_multiplier: f32
    , initial_backoff_ms: u64
    , fallback: bool
    ) -> Self
    {   RetryPolicy
        {   max_retries
          , backoff_multiplier
          , initial_backoff: Duration::from_millis(
              initial_backoff_ms
            )
          , fallback
        }
    }

    /// Calculate backoff duration for attempt number
    pub fn backoff_for_attempt(
      &self
    , attempt: usize
    ) -> Duration
    {   debug!("Calculating backoff for attempt {}", attempt);
        let multiplier
          = self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(
          (self.initial_backoff.as_millis() as f32
            * multiplier) as u64
        )
    }
}

impl From<&FailoverConfig> for RetryPolicy
{   fn from(config: &FailoverConfig) -> Self
    {   RetryPolicy::new(
          config.max_retries,
          config.backoff_multiplier,
          config.initial_backoff_ms,
          config.enabled
        )
    }
}

impl RecoveryPolicy for RetryPolicy
{   fn decide(&self, attempt: usize, _error: &Error) -> Recovery
    {   if attempt < self.max_retries
        {   Recovery::Retry(self.backoff_for_attempt(attempt))
        } else if self.fallback
        {   Recovery::Fallback
        } else
        {   Recovery::GiveUp
        }
    }
}

/// Position in the ordered client list for one call
#[derive(Debug, Clone)]
pub struct FailoverSequence<'a>
{   pub clients: &'a [ProviderClient]
  , pub current_index: usize
}

impl<'a> FailoverSequence<'a>
{   /// Create a new failover sequence
    pub fn new(clients: &'a [ProviderClient]) -> Self
    {   debug!(
          "Creating failover sequence with {} clients",
          clients.len()
        );
        FailoverSequence
        {   clients
          , current_index: 0
        }
    }

    /// Get the current client
    pub fn current(&self) -> Option<&'a ProviderClient>
    {   self.clients.get(self.current_index)
    }

    /// Move to the next client
    pub fn next(&mut self) -> Option<&'a ProviderClient>
    {   self.current_index += 1;
        self.current()
    }

    /// Check if we have more clients to try
    pub fn has_next(&self) -> bool
    {   self.current_index + 1 < self.clients.len()
    }
}

/// Provider that retries and falls back across base clients
pub struct ResilientProvider
{   name: String
  , clients: Vec<ProviderClient>
  , policy: Box<dyn RecoveryPolicy>
}

impl ResilientProvider
{   pub fn new(
      name: impl Into<String>
    , clients: Vec<ProviderClient>
    , policy: Box<dyn RecoveryPolicy>
    ) -> Result<Self>
    {   let name = name.into();
        if clients.is_empty()
        {   error!("Resilient client {} has no base clients", name);
            return Err(Error::InvalidConfig(format!(
              "resilient client '{}' needs at least one base client",
              name
            )));
        }
        debug!(
          "Created resilient client {} over {} clients",
          name, clients.len()
        );
        Ok(ResilientProvider
        {   name
          , clients
          , policy
        })
    }

    /// Wrap into a client bounded by `timeout_ms` across all attempts
    pub fn into_client(self, timeout_ms: u64) -> Result<ProviderClient>
    {   let timeout_ms = i64::try_from(timeout_ms).map_err(|_| {
          error!("Timeout for {} out of range: {}", self.name, timeout_ms);
          Error::InvalidConfig(format!(
            "timeout_ms {} is out of range", timeout_ms
          ))
        })?;
        let config = ProviderConfig::new(self.name.clone())
          .with_option("timeout_ms", timeout_ms);
        ProviderClient::from_provider(config, std::sync::Arc::new(self))
    }
}

#[async_trait]
impl Provider for ResilientProvider
{   fn name(&self) -> &str
    {   &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<ProviderResponse>
    {   let mut sequence = FailoverSequence::new(&self.clients);
        let mut attempt = 0;
        loop
        {   let client = sequence.current().ok_or_else(|| {
              Error::InvalidConfig(format!(
                "resilient client '{}' has no base clients", self.name
              ))
            })?;
            let error = match client.run_prompt(prompt).await
            {   Ok(response) => return Ok(response)
              , Err(e) if !e.is_recoverable() => return Err(e)
              , Err(e) => e
            };

            match self.policy.decide(attempt, &error)
            {   Recovery::Retry(delay) => {
                  info!(
                    "{}: retrying {} in {} ms after: {}",
                    self.name, client.name(), delay.as_millis(), error
                  );
                  attempt += 1;
                  tokio::time::sleep(delay).await;
                }
              , Recovery::Fallback if sequence.has_next() => {
                  attempt = 0;
                  if let Some(next) = sequence.next()
                  {   info!(
                        "{}: falling back to {} after: {}",
                        self.name, next.name(), error
                      );
                  }
                }
              , Recovery::Fallback | Recovery::GiveUp => {
                  error!("{}: giving up: {}", self.name, error);
                  return Err(error);
                }
            }
        }
    }
}
