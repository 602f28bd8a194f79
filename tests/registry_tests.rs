mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use futures::future::FutureExt;
use promptbind::{
  Described, Deserializer, Error, FunctionImpls, ImplFn, Params, PromptImpl,
  RequestFailure, TestCase, TestCatalog, TypeDescriptor,
};
use serde::Deserialize;
use common::{client_for, StubProvider};

#[derive(Debug, Clone, PartialEq, Deserialize)]
enum Sentiment
{   Positive
  , Negative
}

impl Described for Sentiment
{   fn descriptor() -> TypeDescriptor
    {   TypeDescriptor::enumeration("Sentiment", ["Positive", "Negative"])
    }
}

fn arg(value: &str) -> Params
{   BTreeMap::from([("arg".to_string(), value.to_string())])
}

#[test]
fn test_duplicate_registration_fails()
{   let mut impls: FunctionImpls<String, String> = FunctionImpls::new("Blah");
    impls.register_impl("v1", |s: String| async move { Ok::<_, Error>(s) }).unwrap();

    let err = impls
      .register_impl("v1", |s: String| async move { Ok::<_, Error>(s.to_uppercase()) })
      .unwrap_err();
    assert_eq!(err, Error::DuplicateImpl
    {   function: "Blah".to_string()
      , tag: "v1".to_string()
    });
    assert_eq!(impls.len(), 1);
}

#[test]
fn test_get_impl_returns_registered_callable()
{   let mut impls: FunctionImpls<String, usize> = FunctionImpls::new("Count");
    let callable: ImplFn<String, usize>
      = Arc::new(|s: String| async move { Ok::<_, Error>(s.len()) }.boxed());
    impls.register_callable("len", callable.clone()).unwrap();

    let found = impls.get_impl("len").unwrap();
    assert!(Arc::ptr_eq(&found, &callable));
    assert_eq!(tokio_test::block_on(found("four".to_string())).unwrap(), 4);

    let missing = impls.get_impl("nope").err().unwrap();
    assert_eq!(missing, Error::UnknownImpl
    {   function: "Count".to_string()
      , tag: "nope".to_string()
    });
}

#[test]
fn test_discovery_lists_impls_in_tag_order()
{   let mut impls: FunctionImpls<(), ()> = FunctionImpls::new("FooBar");
    for tag in ["SomeName", "robust", "Alpha"]
    {   impls.register_impl(tag, |_: ()| async { Ok::<_, Error>(()) }).unwrap();
    }

    assert_eq!(impls.tags().collect::<Vec<_>>(), vec!["Alpha", "SomeName", "robust"]);
    assert_eq!(impls.iter().count(), 3);

    let cases = impls.test_cases();
    assert_eq!(cases[1], TestCase
    {   function: "FooBar".to_string()
      , tag: "SomeName".to_string()
    });
    assert_eq!(cases[1].to_string(), "FooBar[SomeName]");
}

#[test]
fn test_catalog_gathers_cases_across_functions()
{   let mut blah: FunctionImpls<String, String> = FunctionImpls::new("Blah");
    blah.register_impl("v1", |s: String| async move { Ok::<_, Error>(s) }).unwrap();
    let mut foobar: FunctionImpls<(), usize> = FunctionImpls::new("FooBar");
    for tag in ["SomeName", "Alpha"]
    {   foobar.register_impl(tag, |_: ()| async { Ok::<_, Error>(0) }).unwrap();
    }

    let catalog = TestCatalog::new().include(&foobar).include(&blah);
    let names: Vec<String> = catalog.cases().map(ToString::to_string).collect();
    assert_eq!(names, vec!["Blah[v1]", "FooBar[Alpha]", "FooBar[SomeName]"]);
    assert_eq!(catalog.for_function("FooBar").count(), 2);

    let again = catalog.clone().include(&blah);
    assert_eq!(again.len(), 3);
}

#[tokio::test]
async fn test_prompt_impl_through_registry()
{   let stub = StubProvider::replying("stub", "hi");
    let v1 = PromptImpl::template(
      "v1",
      client_for(&stub),
      "hello there {arg}",
      ["{arg}"],
      Deserializer::<String>::new()
    );

    let mut impls: FunctionImpls<Params, String> = FunctionImpls::new("Blah");
    impls.register_callable(v1.tag().to_string(), v1.into_callable()).unwrap();

    let out = impls.run("v1", arg("world")).await.unwrap();
    assert_eq!(out, "hi");
    assert_eq!(stub.sent(), vec!["hello there world".to_string()]);
}

#[tokio::test]
async fn test_literal_impl_ignores_params()
{   let stub = StubProvider::replying("stub", "Negative");
    let some_name = PromptImpl::literal(
      "SomeName",
      client_for(&stub),
      "does something\nasdf goes here",
      Deserializer::<Sentiment>::new()
    );

    let out = some_name.run(&arg("unused")).await.unwrap();
    assert_eq!(out, Sentiment::Negative);
    assert_eq!(stub.sent(), vec!["does something\nasdf goes here".to_string()]);
}

#[tokio::test]
async fn test_errors_propagate_unchanged()
{   let garbled = StubProvider::replying("stub", "Meh");
    let classify = PromptImpl::literal(
      "v1",
      client_for(&garbled),
      "classify",
      Deserializer::<Sentiment>::new()
    );
    let err = classify.run(&Params::new()).await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { ref got, .. } if got == "Meh"));

    let limited = StubProvider::scripted("stub", vec![
      Err(Error::request(RequestFailure::RateLimited, "slow down"))
    ]);
    let classify = PromptImpl::literal(
      "v1",
      client_for(&limited),
      "classify",
      Deserializer::<Sentiment>::new()
    );
    let err = classify.run(&Params::new()).await.unwrap_err();
    assert_eq!(err, Error::request(RequestFailure::RateLimited, "slow down"));

    let unbound = PromptImpl::template(
      "v2",
      client_for(&limited),
      "hello {arg}",
      ["{arg}"],
      Deserializer::<Sentiment>::new()
    );
    let err = unbound.run(&Params::new()).await.unwrap_err();
    assert!(matches!(err, Error::TemplateBinding(_)));
}
