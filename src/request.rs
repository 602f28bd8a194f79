//! Prompt requests and provider responses

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use log::{debug, error, trace};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// A prompt to run: literal text or a template with replacers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptRequest
{   Literal(String)
  , Template
    {   template: String
      , replacers: BTreeSet<String>
      , params: BTreeMap<String, String>
    }
}

impl PromptRequest
{   pub fn template(
      template: impl Into<String>
    , replacers: impl IntoIterator<Item = impl Into<String>>
    , params: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>
    ) -> Self
    {   PromptRequest::Template
        {   template: template.into()
          , replacers: replacers.into_iter().map(Into::into).collect()
          , params: params.into_iter()
              .map(|(k, v)| (k.into(), v.into()))
              .collect()
        }
    }

    /// The exact text sent downstream
    pub fn render(&self) -> Result<String>
    {   match self
        {   PromptRequest::Literal(prompt) => Ok(prompt.clone())
          , PromptRequest::Template { template, replacers, params } =>
              render_template(template, replacers, params)
        }
    }
}

/// Value for a replacer token: exact key first, then the brace-less name
fn lookup<'a>(
  params: &'a BTreeMap<String, String>
, token: &str
) -> Option<&'a str>
{   if let Some(v) = params.get(token)
    {   return Some(v.as_str());
    }
    token.strip_prefix('{')
      .and_then(|t| t.strip_suffix('}'))
      .and_then(|name| params.get(name))
      .map(String::as_str)
}

/// Substitute every replacer in one left-to-right pass.
///
/// All bindings are checked before any output is produced. Substituted
/// values are never re-scanned; on overlapping tokens the longest wins.
pub fn render_template(
  template: &str
, replacers: &BTreeSet<String>
, params: &BTreeMap<String, String>
) -> Result<String>
{   let mut bindings: Vec<(&str, &str)> = Vec::with_capacity(replacers.len());
    for token in replacers
    {   if token.is_empty()
        {   error!("Empty replacer token");
            return Err(Error::TemplateBinding(
              "replacer token must not be empty".to_string()
            ));
        }
        if !template.contains(token.as_str())
        {   error!("Replacer {} not found in template", token);
            return Err(Error::TemplateBinding(format!(
              "replacer '{}' does not occur in the template", token
            )));
        }
        let value = lookup(params, token).ok_or_else(|| {
          error!("No value for replacer {}", token);
          Error::TemplateBinding(format!(
            "replacer '{}' has no value in params", token
          ))
        })?;
        bindings.push((token.as_str(), value));
    }
    bindings.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    debug!("Rendering template with {} replacers", bindings.len());

    // next match of each token at or after `pos`; refreshed only once consumed
    let mut next: Vec<Option<usize>> = bindings.iter()
      .map(|&(token, _)| template.find(token))
      .collect();
    let mut out = String::with_capacity(template.len());
    let mut pos = 0;
    loop
    {   let mut best: Option<(usize, usize)> = None;
        for (i, at) in next.iter().enumerate()
        {   if let Some(at) = *at
            {   if best.map_or(true, |(b, _)| at < b)
                {   best = Some((at, i));
                }
            }
        }
        let Some((at, i)) = best else
        {   out.push_str(&template[pos..]);
            break;
        };
        let (token, value) = bindings[i];
        out.push_str(&template[pos..at]);
        out.push_str(value);
        pos = at + token.len();
        for (j, slot) in next.iter_mut().enumerate()
        {   if matches!(*slot, Some(n) if n < pos)
            {   *slot = template[pos..].find(bindings[j].0).map(|n| n + pos);
            }
        }
    }
    trace!("Rendered prompt: {:?}", out);
    Ok(out)
}

/// Provider response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse
{   /// Generated text
    pub generated: String
  , /// Provider tag that generated it
    pub provider: String
  , /// Model that generated it
    pub model: String
  , /// Tokens used, when the backend reports it
    pub tokens_used: Option<usize>
  , /// Why generation stopped, when the backend reports it
    pub finish_reason: Option<String>
  , /// Wall time of the round trip
    pub latency: Duration
}

impl ProviderResponse
{   /// Bare response carrying only generated text
    pub fn text(
      provider: impl Into<String>
    , model: impl Into<String>
    , generated: impl Into<String>
    ) -> Self
    {   ProviderResponse
        {   generated: generated.into()
          , provider: provider.into()
          , model: model.into()
          , tokens_used: None
          , finish_reason: None
          , latency: Duration::ZERO
        }
    }
}
