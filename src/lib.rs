//! promptbind: runtime for generated LLM function bindings.
//!
//! Generated code builds one [`ProviderClient`] per declared client,
//! renders a prompt, runs it, and pipes the generated text through a
//! [`Deserializer`] for the function's return type. Implementation
//! variants are kept in a [`FunctionImpls`] registry so a test harness
//! can pick one by tag.
//!
//! ```no_run
//! use promptbind::{providers, Deserializer, PromptImpl, OptionValue};
//! use std::collections::BTreeMap;
//!
//! # async fn demo() -> promptbind::Result<()> {
//! let mut options = BTreeMap::new();
//! options.insert("model".to_string(), OptionValue::from("gpt-35-turbo"));
//! options.insert("api_key".to_string(), OptionValue::from("sk-..."));
//! let client = providers::create("openai", options)?;
//!
//! let v1 = PromptImpl::template(
//!   "v1", client, "hello there {arg}", ["{arg}"], Deserializer::<String>::new()
//! );
//! let params = BTreeMap::from([("arg".to_string(), "world".to_string())]);
//! let reply: String = v1.run(&params).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod config;
pub mod providers;
pub mod request;
pub mod resilient;
pub mod client;
pub mod deserializer;
pub mod registry;
pub mod function;

pub use client::{Clients, ProviderClient};
pub use config::{
  ClientsFile, EnvSecrets, FailoverConfig, MapSecrets, OptionValue,
  ProviderConfig, SecretSource,
};
pub use deserializer::{
  Described, Deserializer, EnumSchema, FieldSchema, PrimitiveKind,
  RecordSchema, TypeDescriptor,
};
pub use error::{Error, RequestFailure, Result};
pub use function::{Params, PromptImpl, PromptShape};
pub use providers::{Provider, ProviderTag};
pub use registry::{FunctionImpls, ImplFn, TestCase, TestCatalog};
pub use request::{PromptRequest, ProviderResponse};
pub use resilient::{Recovery, RecoveryPolicy, ResilientProvider, RetryPolicy};

/// Install `env_logger`, honouring `RUST_LOG` (default `warn`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logger()
{   let _ = env_logger::Builder::from_env(
      env_logger::Env::default().default_filter_or("warn")
    ).try_init();
}
