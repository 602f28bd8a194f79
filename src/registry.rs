//! Named implementation variants of generated functions

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use futures::future::{BoxFuture, FutureExt};
use log::{debug, error};
use crate::error::{Error, Result};

pub type ImplFuture<Out> = BoxFuture<'static, Result<Out>>;

/// A callable implementation: typed args in, typed result out
pub type ImplFn<Args, Out>
  = Arc<dyn Fn(Args) -> ImplFuture<Out> + Send + Sync>;

/// One (function, tag) pair, as a test harness parametrizes over them
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestCase
{   pub function: String
  , pub tag: String
}

impl fmt::Display for TestCase
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   write!(f, "{}[{}]", self.function, self.tag)
    }
}

/// Registry of implementations for one generated function.
///
/// Populated at startup; tags are unique and looked up exactly.
pub struct FunctionImpls<Args, Out>
{   function: String
  , impls: BTreeMap<String, ImplFn<Args, Out>>
}

impl<Args, Out> fmt::Debug for FunctionImpls<Args, Out>
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   f.debug_struct("FunctionImpls")
          .field("function", &self.function)
          .field("tags", &self.impls.keys().collect::<Vec<_>>())
          .finish()
    }
}

impl<Args: Send + 'static, Out: Send + 'static> FunctionImpls<Args, Out>
{   pub fn new(function: impl Into<String>) -> Self
    {   FunctionImpls
        {   function: function.into()
          , impls: BTreeMap::new()
        }
    }

    pub fn function(&self) -> &str
    {   &self.function
    }

    /// Register an async fn or closure under `tag`
    pub fn register_impl<F, Fut>(
      &mut self
    , tag: impl Into<String>
    , f: F
    ) -> Result<()>
    where
      F: Fn(Args) -> Fut + Send + Sync + 'static
    , Fut: Future<Output = Result<Out>> + Send + 'static
    {   let callable: ImplFn<Args, Out>
          = Arc::new(move |args| f(args).boxed());
        self.register_callable(tag, callable)
    }

    /// Register an already-built callable under `tag`
    pub fn register_callable(
      &mut self
    , tag: impl Into<String>
    , callable: ImplFn<Args, Out>
    ) -> Result<()>
    {   let tag = tag.into();
        if self.impls.contains_key(&tag)
        {   error!(
              "Duplicate implementation {} for {}",
              tag, self.function
            );
            return Err(Error::DuplicateImpl
            {   function: self.function.clone()
              , tag
            });
        }
        debug!("Registered {} for {}", tag, self.function);
        self.impls.insert(tag, callable);
        Ok(())
    }

    /// The callable registered under `tag`
    pub fn get_impl(&self, tag: &str) -> Result<ImplFn<Args, Out>>
    {   self.impls.get(tag).cloned().ok_or_else(|| {
          error!("No implementation {} for {}", tag, self.function);
          Error::UnknownImpl
          {   function: self.function.clone()
            , tag: tag.to_string()
          }
        })
    }

    /// Look up `tag` and run it
    pub async fn run(&self, tag: &str, args: Args) -> Result<Out>
    {   let callable = self.get_impl(tag)?;
        callable(args).await
    }

    /// Tags in sorted order
    pub fn tags(&self) -> impl Iterator<Item = &str>
    {   self.impls.keys().map(String::as_str)
    }

    pub fn iter(&self)
      -> impl Iterator<Item = (&str, &ImplFn<Args, Out>)>
    {   self.impls.iter().map(|(tag, f)| (tag.as_str(), f))
    }

    /// One entry per registered implementation, for test discovery
    pub fn test_cases(&self) -> Vec<TestCase>
    {   self.impls.keys()
          .map(|tag| TestCase
            {   function: self.function.clone()
              , tag: tag.clone()
            })
          .collect()
    }

    pub fn len(&self) -> usize
    {   self.impls.len()
    }

    pub fn is_empty(&self) -> bool
    {   self.impls.is_empty()
    }
}

/// Test cases gathered across every registered function.
///
/// Registries have different `Args`/`Out` types, so each is folded in
/// separately; cases come back sorted by function, then tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCatalog
{   cases: BTreeSet<TestCase>
}

impl TestCatalog
{   pub fn new() -> Self
    {   TestCatalog::default()
    }

    pub fn include<Args, Out>(mut self, impls: &FunctionImpls<Args, Out>) -> Self
    where
      Args: Send + 'static
    , Out: Send + 'static
    {   debug!(
          "Collecting {} test cases for {}",
          impls.len(), impls.function()
        );
        self.cases.extend(impls.test_cases());
        self
    }

    pub fn cases(&self) -> impl Iterator<Item = &TestCase>
    {   self.cases.iter()
    }

    /// Cases for one function only
    pub fn for_function<'a>(&'a self, function: &'a str)
      -> impl Iterator<Item = &'a TestCase> + 'a
    {   self.cases.iter().filter(move |c| c.function == function)
    }

    pub fn len(&self) -> usize
    {   self.cases.len()
    }

    pub fn is_empty(&self) -> bool
    {   self.cases.is_empty()
    }
}
