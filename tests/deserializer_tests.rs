use promptbind::{Described, Deserializer, Error, FieldSchema, TypeDescriptor};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Deserialize)]
enum Tool
{   CodeInterpreter
  , WebSearch
}

impl Described for Tool
{   fn descriptor() -> TypeDescriptor
    {   TypeDescriptor::enumeration("Tool", ["CodeInterpreter", "WebSearch"])
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ClassifyResponse
{   tool: Tool
  , confidence: f64
  , notes: Option<String>
  , tags: Vec<String>
}

impl Described for ClassifyResponse
{   fn descriptor() -> TypeDescriptor
    {   TypeDescriptor::record("ClassifyResponse", [
          FieldSchema::new("tool", Tool::descriptor())
        , FieldSchema::new("confidence", f64::descriptor())
        , FieldSchema::new("notes", Option::<String>::descriptor())
        , FieldSchema::new("tags", Vec::<String>::descriptor())
        ])
    }
}

#[test]
fn test_primitive_round_trips()
{   for v in ["", "hi", "  padded  ", "{\"not\": \"parsed\"}", "line\nbreak"]
    {   assert_eq!(Deserializer::<String>::new().from_string(v).unwrap(), v);
    }
    for v in [0i64, -7, 42, i64::MAX, i64::MIN]
    {   assert_eq!(
          Deserializer::<i64>::new().from_string(&v.to_string()).unwrap(),
          v
        );
    }
    for v in [0.0f64, -1.5, 0.3, 1e-9, 12345.678, f64::MAX, f64::INFINITY, f64::NEG_INFINITY]
    {   assert_eq!(
          Deserializer::<f64>::new().from_string(&v.to_string()).unwrap(),
          v
        );
    }
    for v in [true, false]
    {   assert_eq!(
          Deserializer::<bool>::new().from_string(&v.to_string()).unwrap(),
          v
        );
    }
}

#[test]
fn test_non_finite_floats()
{   let floats = Deserializer::<f64>::new();
    assert_eq!(floats.from_string("inf").unwrap(), f64::INFINITY);
    assert_eq!(floats.from_string(" \"-inf\" ").unwrap(), f64::NEG_INFINITY);
    assert!(floats.from_string("NaN").unwrap().is_nan());

    let err = Deserializer::<i64>::new().from_string("inf").unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }));
}

#[test]
fn test_scalars_tolerate_whitespace_and_json_quotes()
{   assert_eq!(Deserializer::<i64>::new().from_string(" 12\n").unwrap(), 12);
    assert_eq!(Deserializer::<i64>::new().from_string("\"12\"").unwrap(), 12);
    assert!(Deserializer::<bool>::new().from_string("True").unwrap());
}

#[test]
fn test_scalar_mismatch_is_an_error()
{   let err = Deserializer::<i64>::new().from_string("twelve").unwrap_err();
    match err
    {   Error::Deserialization { expected, got, .. } => {
          assert_eq!(expected, "int");
          assert_eq!(got, "twelve");
        }
      , other => panic!("unexpected error: {:?}", other)
    }

    assert!(Deserializer::<i64>::new().from_string("1.5").is_err());
    assert!(Deserializer::<bool>::new().from_string("yes").is_err());
    assert!(Deserializer::<f64>::new().from_string("NaN").is_err());
    assert!(Deserializer::<i32>::new().from_string("99999999999").is_err());
}

#[test]
fn test_enum_membership()
{   let d = Deserializer::<Tool>::new();
    assert_eq!(d.from_string("WebSearch").unwrap(), Tool::WebSearch);
    assert_eq!(d.from_string(" \"CodeInterpreter\" ").unwrap(), Tool::CodeInterpreter);

    let err = d.from_string("not-a-member").unwrap_err();
    assert!(matches!(
      err,
      Error::Deserialization { ref expected, .. } if expected == "enum Tool"
    ));
    assert!(d.from_string("websearch").is_err());
}

#[test]
fn test_record_from_plain_json()
{   let raw = r#"{"tool": "WebSearch", "confidence": 0.9, "tags": ["a", "b"], "extra": 1}"#;
    let value = Deserializer::<ClassifyResponse>::new().from_string(raw).unwrap();
    assert_eq!(value, ClassifyResponse
    {   tool: Tool::WebSearch
      , confidence: 0.9
      , notes: None
      , tags: vec!["a".to_string(), "b".to_string()]
    });
}

#[test]
fn test_record_inside_fence_or_prose()
{   let fenced = "Sure! Here it is:\n```json\n{\"tool\": \"CodeInterpreter\", \"confidence\": 1, \"notes\": \"ok\", \"tags\": []}\n```\n";
    let value = Deserializer::<ClassifyResponse>::new().from_string(fenced).unwrap();
    assert_eq!(value.tool, Tool::CodeInterpreter);
    assert_eq!(value.notes.as_deref(), Some("ok"));

    let prose = "The answer is {\"tool\": \"WebSearch\", \"confidence\": 0.5, \"tags\": [\"x\"]} as requested.";
    let value = Deserializer::<ClassifyResponse>::new().from_string(prose).unwrap();
    assert_eq!(value.tags, vec!["x".to_string()]);
}

#[test]
fn test_record_validation_failures()
{   let d = Deserializer::<ClassifyResponse>::new();

    let missing = d.from_string(r#"{"tool": "WebSearch", "tags": []}"#).unwrap_err();
    assert!(matches!(
      missing,
      Error::Deserialization { ref reason, .. } if reason.contains("$.confidence")
    ));

    let bad_member = d.from_string(
      r#"{"tool": "Hammer", "confidence": 0.1, "tags": []}"#
    ).unwrap_err();
    assert!(matches!(
      bad_member,
      Error::Deserialization { ref reason, .. } if reason.contains("Hammer")
    ));

    let bad_element = d.from_string(
      r#"{"tool": "WebSearch", "confidence": 0.1, "tags": ["a", 2]}"#
    ).unwrap_err();
    assert!(matches!(
      bad_element,
      Error::Deserialization { ref reason, .. } if reason.contains("$.tags[1]")
    ));

    assert!(d.from_string("no json at all").is_err());
    assert!(d.from_string("[1, 2]").is_err());
}

#[test]
fn test_optional_and_list_targets()
{   let opt = Deserializer::<Option<String>>::new();
    assert_eq!(opt.from_string("null").unwrap(), None);
    assert_eq!(opt.from_string("text").unwrap(), Some("text".to_string()));

    let opt_int = Deserializer::<Option<i64>>::new();
    assert_eq!(opt_int.from_string("").unwrap(), None);
    assert_eq!(opt_int.from_string("3").unwrap(), Some(3));

    let tools = Deserializer::<Vec<Tool>>::new();
    assert_eq!(
      tools.from_string(r#"["WebSearch", "CodeInterpreter"]"#).unwrap(),
      vec![Tool::WebSearch, Tool::CodeInterpreter]
    );
    assert!(tools.from_string(r#"["WebSearch", "Nope"]"#).is_err());
}

#[test]
fn test_from_value_is_strict()
{   let d = Deserializer::<String>::new();
    assert_eq!(d.from_value(&json!("abc")).unwrap(), "abc");
    assert!(d.from_value(&json!(3)).is_err());

    let record = Deserializer::<ClassifyResponse>::new();
    let value = record.from_value(&json!({
      "tool": "WebSearch", "confidence": 2, "notes": null, "tags": []
    })).unwrap();
    assert_eq!(value.confidence, 2.0);
}

#[test]
fn test_same_input_same_outcome()
{   let d = Deserializer::<ClassifyResponse>::new();
    let raw = r#"{"tool": "Hammer"}"#;
    assert_eq!(d.from_string(raw).unwrap_err(), d.from_string(raw).unwrap_err());

    let explicit = Deserializer::<String>::with_descriptor(TypeDescriptor::string());
    assert_eq!(explicit.descriptor(), &TypeDescriptor::string());
}
