use std::fmt;
use thiserror::Error;

/// Why a provider request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestFailure
{   /// Credential rejected (401/403)
    Auth
  , /// Backend throttled the caller (429)
    RateLimited
  , /// Transport level failure, no usable response
    Network
  , /// Backend answered with an error or an unusable body
    Backend
}

impl fmt::Display for RequestFailure
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   let s = match self
        {   RequestFailure::Auth => "auth"
          , RequestFailure::RateLimited => "rate limited"
          , RequestFailure::Network => "network"
          , RequestFailure::Backend => "backend"
        };
        f.write_str(s)
    }
}

/// Error type for every promptbind operation
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error
{   /// Provider tag is not a recognized backend
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String)
  , /// Required option missing or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String)
  , /// Request reached the provider layer and failed
    #[error("Provider request failed ({kind}): {message}")]
    ProviderRequest
    {   kind: RequestFailure
      , message: String
    }
  , /// No response within the configured wait
    #[error("Provider timed out after {0} ms")]
    ProviderTimeout(u64)
  , /// Template replacer has no occurrence or no value
    #[error("Template binding error: {0}")]
    TemplateBinding(String)
  , /// Output did not match the declared type
    #[error("Failed to deserialize as {expected}: {reason} (got {got:?})")]
    Deserialization
    {   expected: String
      , got: String
      , reason: String
    }
  , /// Same (function, tag) registered twice
    #[error("Implementation '{tag}' already registered for {function}")]
    DuplicateImpl
    {   function: String
      , tag: String
    }
  , /// No implementation under that tag
    #[error("No implementation '{tag}' registered for {function}")]
    UnknownImpl
    {   function: String
      , tag: String
    }
}

impl Error
{   pub fn request(kind: RequestFailure, message: impl Into<String>)
      -> Self
    {   Error::ProviderRequest
        {   kind
          , message: message.into()
        }
    }

    pub fn deserialization(
      expected: impl fmt::Display
    , got: &str
    , reason: impl Into<String>
    ) -> Self
    {   Error::Deserialization
        {   expected: expected.to_string()
          , got: got.to_string()
          , reason: reason.into()
        }
    }

    /// Call-time failures a caller may choose to retry
    pub fn is_recoverable(&self) -> bool
    {   matches!(
          self,
          Error::ProviderRequest { .. } | Error::ProviderTimeout(_)
        )
    }

    /// Failures that prevent a client from being built at all
    pub fn is_construction_error(&self) -> bool
    {   matches!(
          self,
          Error::UnsupportedProvider(_) | Error::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
