//! The call-site pattern generated functions follow
//!
//! Render the prompt, run it on the client, deserialize the generated
//! text. The first error is returned unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use futures::future::FutureExt;
use log::debug;
use serde::de::DeserializeOwned;
use crate::client::ProviderClient;
use crate::deserializer::Deserializer;
use crate::error::Result;
use crate::registry::ImplFn;
use crate::request::render_template;

/// Named template parameters
pub type Params = BTreeMap<String, String>;

/// Prompt as declared by an implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptShape
{   Literal(String)
  , Template
    {   template: String
      , replacers: BTreeSet<String>
    }
}

/// One implementation variant: prompt + client + output type
pub struct PromptImpl<T>
{   tag: String
  , client: ProviderClient
  , prompt: PromptShape
  , deserializer: Deserializer<T>
}

impl<T> std::fmt::Debug for PromptImpl<T>
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.debug_struct("PromptImpl")
          .field("tag", &self.tag)
          .field("client", &self.client)
          .field("prompt", &self.prompt)
          .finish_non_exhaustive()
    }
}

impl<T: DeserializeOwned + Send + 'static> PromptImpl<T>
{   pub fn literal(
      tag: impl Into<String>
    , client: ProviderClient
    , prompt: impl Into<String>
    , deserializer: Deserializer<T>
    ) -> Self
    {   PromptImpl
        {   tag: tag.into()
          , client
          , prompt: PromptShape::Literal(prompt.into())
          , deserializer
        }
    }

    pub fn template(
      tag: impl Into<String>
    , client: ProviderClient
    , template: impl Into<String>
    , replacers: impl IntoIterator<Item = impl Into<String>>
    , deserializer: Deserializer<T>
    ) -> Self
    {   PromptImpl
        {   tag: tag.into()
          , client
          , prompt: PromptShape::Template
            {   template: template.into()
              , replacers: replacers.into_iter().map(Into::into).collect()
            }
          , deserializer
        }
    }

    pub fn tag(&self) -> &str
    {   &self.tag
    }

    pub fn client(&self) -> &ProviderClient
    {   &self.client
    }

    /// Literal prompts ignore `params`
    pub async fn run(&self, params: &Params) -> Result<T>
    {   debug!("Running impl {} on {}", self.tag, self.client.name());
        let response = match &self.prompt
        {   PromptShape::Literal(prompt) =>
              self.client.run_prompt(prompt).await?
          , PromptShape::Template { template, replacers } => {
              let prompt = render_template(template, replacers, params)?;
              self.client.run_prompt(&prompt).await?
            }
        };
        self.deserializer.from_string(&response.generated)
    }

    /// Callable form, ready for a `FunctionImpls` registry
    pub fn into_callable(self) -> ImplFn<Params, T>
    {   let this = Arc::new(self);
        Arc::new(move |params: Params| {
          let this = Arc::clone(&this);
          async move { this.run(&params).await }.boxed()
        })
    }
}
