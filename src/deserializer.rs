//! Typed deserialization of provider output
//!
//! A [`Deserializer`] validates raw text against a [`TypeDescriptor`]
//! and then hands the validated JSON value to `serde` for the target
//! Rust type. Validation never coerces: a value either matches the
//! descriptor or the call fails with [`Error::Deserialization`].

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use log::{debug, trace};
use serde::de::{self, DeserializeOwned, IntoDeserializer};
use serde_json::{Map, Number, Value};
use crate::error::{Error, Result};

/// Scalar target types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind
{   String
  , Int
  , Float
  , Bool
}

impl fmt::Display for PrimitiveKind
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   let s = match self
        {   PrimitiveKind::String => "string"
          , PrimitiveKind::Int => "int"
          , PrimitiveKind::Float => "float"
          , PrimitiveKind::Bool => "bool"
        };
        f.write_str(s)
    }
}

/// Generated enum: a name and its member names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSchema
{   pub name: String
  , pub values: Vec<String>
}

/// One field of a generated class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema
{   pub name: String
  , pub ty: TypeDescriptor
}

impl FieldSchema
{   pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self
    {   FieldSchema
        {   name: name.into()
          , ty
        }
    }

    /// Only `Optional` fields may be absent
    pub fn is_required(&self) -> bool
    {   !matches!(self.ty, TypeDescriptor::Optional(_))
    }
}

/// Generated class: a name and its fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema
{   pub name: String
  , pub fields: Vec<FieldSchema>
}

/// Closed set of deserialization strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor
{   Primitive(PrimitiveKind)
  , Enum(EnumSchema)
  , Record(RecordSchema)
  , Optional(Box<TypeDescriptor>)
  , List(Box<TypeDescriptor>)
}

impl TypeDescriptor
{   pub fn string() -> Self
    {   TypeDescriptor::Primitive(PrimitiveKind::String)
    }

    pub fn int() -> Self
    {   TypeDescriptor::Primitive(PrimitiveKind::Int)
    }

    pub fn float() -> Self
    {   TypeDescriptor::Primitive(PrimitiveKind::Float)
    }

    pub fn bool() -> Self
    {   TypeDescriptor::Primitive(PrimitiveKind::Bool)
    }

    pub fn enumeration(
      name: impl Into<String>
    , values: impl IntoIterator<Item = impl Into<String>>
    ) -> Self
    {   TypeDescriptor::Enum(EnumSchema
        {   name: name.into()
          , values: values.into_iter().map(Into::into).collect()
        })
    }

    pub fn record(
      name: impl Into<String>
    , fields: impl IntoIterator<Item = FieldSchema>
    ) -> Self
    {   TypeDescriptor::Record(RecordSchema
        {   name: name.into()
          , fields: fields.into_iter().collect()
        })
    }

    pub fn optional(inner: TypeDescriptor) -> Self
    {   TypeDescriptor::Optional(Box::new(inner))
    }

    pub fn list(inner: TypeDescriptor) -> Self
    {   TypeDescriptor::List(Box::new(inner))
    }
}

impl fmt::Display for TypeDescriptor
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   TypeDescriptor::Primitive(kind) => write!(f, "{}", kind)
          , TypeDescriptor::Enum(e) => write!(f, "enum {}", e.name)
          , TypeDescriptor::Record(r) => write!(f, "class {}", r.name)
          , TypeDescriptor::Optional(inner) => write!(f, "{}?", inner)
          , TypeDescriptor::List(inner) => write!(f, "{}[]", inner)
        }
    }
}

/// Rust types that know their own descriptor.
///
/// Generated classes and enums implement this next to their serde
/// derives.
pub trait Described
{   fn descriptor() -> TypeDescriptor;
}

impl Described for String
{   fn descriptor() -> TypeDescriptor
    {   TypeDescriptor::string()
    }
}

impl Described for i64
{   fn descriptor() -> TypeDescriptor
    {   TypeDescriptor::int()
    }
}

impl Described for i32
{   fn descriptor() -> TypeDescriptor
    {   TypeDescriptor::int()
    }
}

impl Described for f64
{   fn descriptor() -> TypeDescriptor
    {   TypeDescriptor::float()
    }
}

impl Described for bool
{   fn descriptor() -> TypeDescriptor
    {   TypeDescriptor::bool()
    }
}

impl<T: Described> Described for Option<T>
{   fn descriptor() -> TypeDescriptor
    {   TypeDescriptor::optional(T::descriptor())
    }
}

impl<T: Described> Described for Vec<T>
{   fn descriptor() -> TypeDescriptor
    {   TypeDescriptor::list(T::descriptor())
    }
}

/// Converts provider text into `T`
pub struct Deserializer<T>
{   descriptor: TypeDescriptor
  , _target: PhantomData<fn() -> T>
}

impl<T> Clone for Deserializer<T>
{   fn clone(&self) -> Self
    {   Deserializer
        {   descriptor: self.descriptor.clone()
          , _target: PhantomData
        }
    }
}

impl<T> fmt::Debug for Deserializer<T>
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   f.debug_struct("Deserializer")
          .field("descriptor", &self.descriptor)
          .finish()
    }
}

impl<T: Described + DeserializeOwned> Deserializer<T>
{   pub fn new() -> Self
    {   Self::with_descriptor(T::descriptor())
    }
}

impl<T: Described + DeserializeOwned> Default for Deserializer<T>
{   fn default() -> Self
    {   Self::new()
    }
}

impl<T: DeserializeOwned> Deserializer<T>
{   pub fn with_descriptor(descriptor: TypeDescriptor) -> Self
    {   Deserializer
        {   descriptor
          , _target: PhantomData
        }
    }

    pub fn descriptor(&self) -> &TypeDescriptor
    {   &self.descriptor
    }

    pub fn from_string(&self, raw: &str) -> Result<T>
    {   debug!("Deserializing {} chars as {}", raw.len(), self.descriptor);
        if let Some(x) = non_finite_float(&self.descriptor, raw)
        {   trace!("Non-finite float: {}", x);
            let input: de::value::F64Deserializer<de::value::Error>
              = x.into_deserializer();
            return T::deserialize(input)
              .map_err(|e| fail(&self.descriptor, raw, e.to_string()));
        }
        let value = parse_raw(&self.descriptor, raw)?;
        self.into_target(value, raw)
    }

    /// Validate an already-structured value
    pub fn from_value(&self, value: &Value) -> Result<T>
    {   let validated = validate(&self.descriptor, value, "$")
          .map_err(|reason| fail(&self.descriptor, &value.to_string(), reason))?;
        self.into_target(validated, &value.to_string())
    }

    fn into_target(&self, value: Value, raw: &str) -> Result<T>
    {   trace!("Validated value: {}", value);
        serde_json::from_value(value)
          .map_err(|e| fail(&self.descriptor, raw, e.to_string()))
    }
}

fn fail(descriptor: &TypeDescriptor, raw: &str, reason: String) -> Error
{   debug!("Deserialization as {} failed: {}", descriptor, reason);
    Error::deserialization(descriptor, raw, reason)
}

/// Strip one layer of JSON string quoting, if present
fn unquote(s: &str) -> Cow<'_, str>
{   if s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
    {   if let Ok(inner) = serde_json::from_str::<String>(s)
        {   return Cow::Owned(inner);
        }
    }
    Cow::Borrowed(s)
}

/// Infinities and NaN have no JSON form; a top-level float skips `Value`
fn non_finite_float(descriptor: &TypeDescriptor, raw: &str) -> Option<f64>
{   match descriptor
    {   TypeDescriptor::Primitive(PrimitiveKind::Float) =>
          unquote(raw.trim()).parse::<f64>().ok().filter(|x| !x.is_finite())
      , _ => None
    }
}

fn parse_raw(descriptor: &TypeDescriptor, raw: &str) -> Result<Value>
{   match descriptor
    {   TypeDescriptor::Primitive(PrimitiveKind::String) =>
          Ok(Value::String(raw.to_string()))
      , TypeDescriptor::Primitive(kind) => {
          let text = unquote(raw.trim());
          parse_scalar(*kind, &text)
            .map_err(|reason| fail(descriptor, raw, reason))
        }
      , TypeDescriptor::Enum(schema) => {
          let text = unquote(raw.trim());
          enum_member(schema, &text)
            .map_err(|reason| fail(descriptor, raw, reason))
        }
      , TypeDescriptor::Optional(inner) => {
          let trimmed = raw.trim();
          let is_string = matches!(
            **inner,
            TypeDescriptor::Primitive(PrimitiveKind::String)
          );
          if trimmed == "null" || (trimmed.is_empty() && !is_string)
          {   Ok(Value::Null)
          } else
          {   parse_raw(inner, raw)
          }
        }
      , TypeDescriptor::Record(_) | TypeDescriptor::List(_) => {
          let value = extract_json(raw).ok_or_else(||
            fail(descriptor, raw, "no JSON value found".to_string())
          )?;
          validate(descriptor, &value, "$")
            .map_err(|reason| fail(descriptor, raw, reason))
        }
    }
}

fn parse_scalar(kind: PrimitiveKind, text: &str)
  -> std::result::Result<Value, String>
{   match kind
    {   PrimitiveKind::String => Ok(Value::String(text.to_string()))
      , PrimitiveKind::Int => text.parse::<i64>()
          .map(Value::from)
          .map_err(|e| format!("not an int: {}", e))
      , PrimitiveKind::Float => {
          let x = text.parse::<f64>()
            .map_err(|e| format!("not a float: {}", e))?;
          Number::from_f64(x)
            .map(Value::Number)
            .ok_or_else(|| "float is not finite".to_string())
        }
      , PrimitiveKind::Bool => {
          if text.eq_ignore_ascii_case("true")
          {   Ok(Value::Bool(true))
          } else if text.eq_ignore_ascii_case("false")
          {   Ok(Value::Bool(false))
          } else
          {   Err("not a bool".to_string())
          }
        }
    }
}

fn enum_member(schema: &EnumSchema, text: &str)
  -> std::result::Result<Value, String>
{   if schema.values.iter().any(|v| v == text)
    {   Ok(Value::String(text.to_string()))
    } else
    {   Err(format!(
          "'{}' is not a member of {} ({})",
          text, schema.name, schema.values.join(", ")
        ))
    }
}

/// Find a JSON value in model output: whole text, fenced block, or outer span
fn extract_json(raw: &str) -> Option<Value>
{   let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str(trimmed)
    {   return Some(v);
    }

    if let Some(start) = trimmed.find("```")
    {   let after = &trimmed[start + 3..];
        // skip the language tag line
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```")
        {   if let Ok(v) = serde_json::from_str(body[..end].trim())
            {   return Some(v);
            }
        }
    }

    let open = trimmed.find(|c: char| c == '{' || c == '[')?;
    let close_char = if trimmed[open..].starts_with('{') { '}' } else { ']' };
    let close = trimmed.rfind(close_char)?;
    if close <= open
    {   return None;
    }
    serde_json::from_str(&trimmed[open..=close]).ok()
}

fn found(value: &Value) -> &'static str
{   match value
    {   Value::Null => "null"
      , Value::Bool(_) => "bool"
      , Value::Number(_) => "number"
      , Value::String(_) => "string"
      , Value::Array(_) => "array"
      , Value::Object(_) => "object"
    }
}

fn mismatch(path: &str, descriptor: &TypeDescriptor, value: &Value) -> String
{   format!("{}: expected {}, found {}", path, descriptor, found(value))
}

/// Check a structured value against a descriptor; returns the value
/// restricted to declared fields, with absent optionals as null.
fn validate(descriptor: &TypeDescriptor, value: &Value, path: &str)
  -> std::result::Result<Value, String>
{   match (descriptor, value)
    {   (TypeDescriptor::Optional(_), Value::Null) => Ok(Value::Null)
      , (TypeDescriptor::Optional(inner), _) =>
          validate(inner, value, path)
      , (TypeDescriptor::Primitive(PrimitiveKind::String), Value::String(_))
      | (TypeDescriptor::Primitive(PrimitiveKind::Bool), Value::Bool(_))
      | (TypeDescriptor::Primitive(PrimitiveKind::Float), Value::Number(_)) =>
          Ok(value.clone())
      , (TypeDescriptor::Primitive(PrimitiveKind::Int), Value::Number(n))
          if n.is_i64() || n.is_u64() => Ok(value.clone())
      , (TypeDescriptor::Enum(schema), Value::String(s)) =>
          enum_member(schema, s).map_err(|e| format!("{}: {}", path, e))
      , (TypeDescriptor::List(inner), Value::Array(items)) => items.iter()
          .enumerate()
          .map(|(i, item)| validate(inner, item, &format!("{}[{}]", path, i)))
          .collect::<std::result::Result<Vec<_>, _>>()
          .map(Value::Array)
      , (TypeDescriptor::Record(schema), Value::Object(obj)) => {
          let mut out = Map::new();
          for field in &schema.fields
          {   let field_path = format!("{}.{}", path, field.name);
              match obj.get(&field.name)
              {   None | Some(Value::Null) if field.is_required() => {
                    return Err(format!(
                      "{}: missing required field of {}",
                      field_path, schema.name
                    ));
                  }
                , None | Some(Value::Null) => {
                    out.insert(field.name.clone(), Value::Null);
                  }
                , Some(v) => {
                    out.insert(
                      field.name.clone(),
                      validate(&field.ty, v, &field_path)?
                    );
                  }
              }
          }
          Ok(Value::Object(out))
        }
      , _ => Err(mismatch(path, descriptor, value))
    }
}
