#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use promptbind::{Error, Provider, ProviderClient, ProviderConfig, ProviderResponse, Result};

/// In-process backend that records every prompt it receives
pub struct StubProvider
{   name: String
  , script: Mutex<VecDeque<Result<String>>>
  , default_reply: Option<String>
  , delay: Option<Duration>
  , prompts: Mutex<Vec<String>>
}

impl StubProvider
{   /// Always answers `reply`
    pub fn replying(name: &str, reply: &str) -> Arc<Self>
    {   Arc::new(StubProvider
        {   name: name.to_string()
          , script: Mutex::new(VecDeque::new())
          , default_reply: Some(reply.to_string())
          , delay: None
          , prompts: Mutex::new(Vec::new())
        })
    }

    /// Answers from `script` in order, then fails
    pub fn scripted(name: &str, script: Vec<Result<String>>) -> Arc<Self>
    {   Arc::new(StubProvider
        {   name: name.to_string()
          , script: Mutex::new(script.into())
          , default_reply: None
          , delay: None
          , prompts: Mutex::new(Vec::new())
        })
    }

    /// Answers `reply` after `delay`
    pub fn slow(name: &str, reply: &str, delay: Duration) -> Arc<Self>
    {   Arc::new(StubProvider
        {   name: name.to_string()
          , script: Mutex::new(VecDeque::new())
          , default_reply: Some(reply.to_string())
          , delay: Some(delay)
          , prompts: Mutex::new(Vec::new())
        })
    }

    pub fn sent(&self) -> Vec<String>
    {   self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize
    {   self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for StubProvider
{   fn name(&self) -> &str
    {   &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<ProviderResponse>
    {   self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay
        {   tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        let text = match next
        {   Some(result) => result?
          , None => self.default_reply.clone().ok_or_else(||
              Error::InvalidConfig("stub script exhausted".to_string())
            )?
        };
        Ok(ProviderResponse::text(self.name.clone(), "stub-model", text))
    }
}

pub fn client_for(stub: &Arc<StubProvider>) -> ProviderClient
{   ProviderClient::from_provider(
      ProviderConfig::new(stub.name()),
      stub.clone()
    ).unwrap()
}

pub fn client_with_timeout(stub: &Arc<StubProvider>, timeout_ms: i64)
  -> ProviderClient
{   ProviderClient::from_provider(
      ProviderConfig::new(stub.name()).with_option("timeout_ms", timeout_ms),
      stub.clone()
    ).unwrap()
}
