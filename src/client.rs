use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{debug, error, info};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::providers::Provider;
use crate::request::{render_template, PromptRequest, ProviderResponse};

/// Wait applied to a single call when `timeout_ms` is not set
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Read `timeout_ms` from a config, falling back to the default
pub fn timeout_from(config: &ProviderConfig) -> Result<Duration>
{   match config.optional_u64("timeout_ms")?
    {   Some(0) => {
          error!("timeout_ms must be positive");
          Err(Error::InvalidConfig(
            "option 'timeout_ms' must be positive".to_string()
          ))
        }
      , Some(ms) => Ok(Duration::from_millis(ms))
      , None => Ok(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

/// Configured handle to one text-generation backend.
///
/// Immutable after construction and cheap to clone; clones share the
/// same backend and may be used from concurrent tasks.
#[derive(Clone)]
pub struct ProviderClient
{   config: Arc<ProviderConfig>
  , provider: Arc<dyn Provider>
  , timeout: Duration
}

impl std::fmt::Debug for ProviderClient
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.debug_struct("ProviderClient")
          .field("provider", &self.provider.name())
          .field("timeout", &self.timeout)
          .finish_non_exhaustive()
    }
}

impl ProviderClient
{   /// Build from a config whose `provider` field names the backend
    pub fn create(config: ProviderConfig) -> Result<Self>
    {   crate::providers::create(&config.provider, config.options)
    }

    /// Wrap any backend, e.g. a stub or a resilient wrapper
    pub fn from_provider(
      config: ProviderConfig
    , provider: Arc<dyn Provider>
    ) -> Result<Self>
    {   let timeout = timeout_from(&config)?;
        info!(
          "Created {} client (timeout {} ms)",
          provider.name(),
          timeout.as_millis()
        );
        Ok(ProviderClient
        {   config: Arc::new(config)
          , provider
          , timeout
        })
    }

    pub fn config(&self) -> &ProviderConfig
    {   &self.config
    }

    pub fn name(&self) -> &str
    {   self.provider.name()
    }

    pub fn timeout(&self) -> Duration
    {   self.timeout
    }

    /// Send a literal prompt and await the response.
    ///
    /// Dropping the returned future abandons the in-flight request.
    pub async fn run_prompt(&self, prompt: &str) -> Result<ProviderResponse>
    {   debug!(
          "run_prompt on {} ({} chars)",
          self.provider.name(),
          prompt.len()
        );
        let started = Instant::now();
        match tokio::time::timeout(
          self.timeout,
          self.provider.complete(prompt)
        ).await
        {   Ok(Ok(mut response)) => {
              if response.latency.is_zero()
              {   response.latency = started.elapsed();
              }
              debug!(
                "{} answered in {} ms",
                self.provider.name(),
                response.latency.as_millis()
              );
              Ok(response)
            }
          , Ok(Err(e)) => {
              error!("{} request failed: {}", self.provider.name(), e);
              Err(e)
            }
          , Err(_) => {
              error!("{} timed out", self.provider.name());
              Err(Error::ProviderTimeout(self.timeout.as_millis() as u64))
            }
        }
    }

    /// Substitute replacers into `template`, then behave as `run_prompt`.
    ///
    /// Binding errors are reported before any network call.
    pub async fn run_prompt_template(
      &self
    , template: &str
    , replacers: &BTreeSet<String>
    , params: &BTreeMap<String, String>
    ) -> Result<ProviderResponse>
    {   let prompt = render_template(template, replacers, params)?;
        self.run_prompt(&prompt).await
    }

    pub async fn run(&self, request: &PromptRequest)
      -> Result<ProviderResponse>
    {   let prompt = request.render()?;
        self.run_prompt(&prompt).await
    }
}

/// Named clients, built once at startup
#[derive(Debug, Clone, Default)]
pub struct Clients
{   by_name: BTreeMap<String, ProviderClient>
}

impl Clients
{   /// Build every client now so bad configs fail before first use
    pub fn build(configs: BTreeMap<String, ProviderConfig>) -> Result<Self>
    {   let mut by_name = BTreeMap::new();
        for (name, config) in configs
        {   debug!("Building client {}", name);
            let client = ProviderClient::create(config).map_err(|e| {
              error!("Client {} failed to build: {}", name, e);
              match e
              {   Error::InvalidConfig(msg) => Error::InvalidConfig(
                    format!("client '{}': {}", name, msg)
                  )
                , other => other
              }
            })?;
            by_name.insert(name, client);
        }
        Ok(Clients { by_name })
    }

    pub fn insert(&mut self, name: impl Into<String>, client: ProviderClient)
    {   self.by_name.insert(name.into(), client);
    }

    pub fn get(&self, name: &str) -> Result<&ProviderClient>
    {   self.by_name.get(name).ok_or_else(|| {
          error!("Unknown client: {}", name);
          Error::InvalidConfig(format!("no client named '{}'", name))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str>
    {   self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize
    {   self.by_name.len()
    }

    pub fn is_empty(&self) -> bool
    {   self.by_name.is_empty()
    }
}
