//! Capability descriptors built from function metadata.
//!
//! A [`FunctionSpec`] is the plain metadata of a callable: its name, its
//! documentation, and its parameter list with optional type annotations and
//! defaults. [`FunctionSpec::describe`] turns that metadata into a
//! [`CapabilityDescriptor`] without touching any backend wire format; the
//! backend adapters serialise [`ToolDefinition`]s at the boundary.

use crate::types::{AppError, Result, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The schema primitives a capability parameter can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Map a type annotation to a schema primitive.
    ///
    /// Accepts schema names (`integer`), Rust type names (`i64`, `Vec<String>`,
    /// `Option<f64>`) and the short names used in docstrings (`int`, `dict`, `list`).
    /// Missing or unrecognised annotations map to `String`.
    pub fn from_annotation(annotation: Option<&str>) -> Self {
        let Some(raw) = annotation else {
            return ParamType::String;
        };
        let normalized = raw.trim().replace(' ', "").to_ascii_lowercase();
        let inner = strip_wrapper(&normalized, "option<", ">")
            .or_else(|| strip_wrapper(&normalized, "optional[", "]"));
        if let Some(inner) = inner {
            return ParamType::from_annotation(Some(inner));
        }
        let base = normalized
            .split(['<', '['])
            .next()
            .unwrap_or_default()
            .rsplit("::")
            .next()
            .unwrap_or_default();

        match base {
            "str" | "&str" | "string" | "char" => ParamType::String,
            "int" | "integer" | "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8"
            | "u16" | "u32" | "u64" | "u128" | "usize" => ParamType::Integer,
            "float" | "number" | "f32" | "f64" | "double" => ParamType::Number,
            "bool" | "boolean" => ParamType::Boolean,
            "dict" | "object" | "map" | "hashmap" | "btreemap" | "indexmap" => ParamType::Object,
            "list" | "array" | "vec" | "vecdeque" | "tuple" | "set" | "hashset" | "btreeset" => {
                ParamType::Array
            }
            _ if normalized.starts_with('[') || normalized.starts_with("&[") => ParamType::Array,
            _ => ParamType::String,
        }
    }

    /// Element type of an array annotation, when the annotation names one.
    ///
    /// `Vec<f64>`, `list[int]`, `&[String]` and `array<number>` all carry an
    /// element type. Bare `list` or a non-array annotation yields `None`.
    pub fn item_from_annotation(annotation: Option<&str>) -> Option<Self> {
        if ParamType::from_annotation(annotation) != ParamType::Array {
            return None;
        }
        let normalized = annotation?.trim().replace(' ', "").to_ascii_lowercase();
        let unwrapped = strip_wrapper(&normalized, "option<", ">")
            .or_else(|| strip_wrapper(&normalized, "optional[", "]"))
            .unwrap_or(normalized.as_str())
            .trim_start_matches('&');
        let open = unwrapped.find(['<', '['])?;
        let inner = unwrapped[open + 1..]
            .strip_suffix(['>', ']'])?
            .split(';')
            .next()
            .unwrap_or_default();
        // Tuples and multi-argument generics have no single element type.
        if inner.is_empty() || inner.contains(',') {
            return None;
        }
        Some(ParamType::from_annotation(Some(inner)))
    }

    /// Schema name as it appears in JSON schema documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn strip_wrapper<'a>(value: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    value.strip_prefix(prefix)?.strip_suffix(suffix)
}

/// Rust types that have a natural schema primitive.
pub trait SchemaType {
    const PARAM_TYPE: ParamType;
    /// Element primitive for sequence types.
    const ITEM_TYPE: Option<ParamType> = None;
}

fn type_annotation<T: SchemaType + ?Sized>() -> String {
    match T::ITEM_TYPE {
        Some(item) => format!("array<{}>", item),
        None => T::PARAM_TYPE.as_str().to_string(),
    }
}

macro_rules! schema_type {
    ($param:expr => $($ty:ty),+ $(,)?) => {
        $(impl SchemaType for $ty {
            const PARAM_TYPE: ParamType = $param;
        })+
    };
}

schema_type!(ParamType::String => String, str, char);
schema_type!(ParamType::Integer => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
schema_type!(ParamType::Number => f32, f64);
schema_type!(ParamType::Boolean => bool);
schema_type!(ParamType::Object => Map<String, Value>);

impl<T: SchemaType> SchemaType for Vec<T> {
    const PARAM_TYPE: ParamType = ParamType::Array;
    const ITEM_TYPE: Option<ParamType> = Some(T::PARAM_TYPE);
}

impl<V> SchemaType for std::collections::HashMap<String, V> {
    const PARAM_TYPE: ParamType = ParamType::Object;
}

impl<V> SchemaType for std::collections::BTreeMap<String, V> {
    const PARAM_TYPE: ParamType = ParamType::Object;
}

impl<T: SchemaType> SchemaType for Option<T> {
    const PARAM_TYPE: ParamType = T::PARAM_TYPE;
    const ITEM_TYPE: Option<ParamType> = T::ITEM_TYPE;
}

/// Metadata of one parameter of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub annotation: Option<String>,
    pub default: Option<Value>,
}

/// Metadata of a callable: name, documentation and ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSpec {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<ParamSpec>,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            params: Vec::new(),
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Required parameter typed by a Rust type.
    pub fn param<T: SchemaType + ?Sized>(self, name: impl Into<String>) -> Self {
        self.annotated(name, type_annotation::<T>())
    }

    /// Optional parameter typed by a Rust type, with its default value.
    pub fn param_with_default<T: SchemaType + Serialize>(
        mut self,
        name: impl Into<String>,
        default: T,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            annotation: Some(type_annotation::<T>()),
            default: Some(serde_json::to_value(default).unwrap_or(Value::Null)),
        });
        self
    }

    /// Required parameter carrying a free-form type annotation.
    pub fn annotated(mut self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            annotation: Some(annotation.into()),
            default: None,
        });
        self
    }

    /// Required parameter with no annotation at all.
    pub fn untyped(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            annotation: None,
            default: None,
        });
        self
    }

    /// Build the capability descriptor. Pure: equal specs give equal descriptors.
    pub fn describe(&self) -> CapabilityDescriptor {
        let doc = self
            .doc
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        let arg_docs = doc.map(parse_arg_docs).unwrap_or_default();

        let parameters = self
            .params
            .iter()
            .map(|p| ParameterDescriptor {
                name: p.name.clone(),
                param_type: ParamType::from_annotation(p.annotation.as_deref()),
                items: ParamType::item_from_annotation(p.annotation.as_deref()),
                required: p.default.is_none(),
                default: p.default.clone(),
                description: arg_docs
                    .iter()
                    .find(|(name, _)| *name == p.name)
                    .map(|(_, text)| text.clone()),
            })
            .collect();

        CapabilityDescriptor {
            name: self.name.clone(),
            description: doc
                .map(str::to_string)
                .unwrap_or_else(|| format!("Function {}", self.name)),
            parameters,
        }
    }
}

/// Pull `name: text` entries out of an `Args:` section.
fn parse_arg_docs(doc: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut in_args = false;
    for line in doc.lines() {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("args:") || trimmed.eq_ignore_ascii_case("arguments:") {
            in_args = true;
            continue;
        }
        if !in_args {
            continue;
        }
        if trimmed.is_empty() || (trimmed.ends_with(':') && !trimmed.contains(' ')) {
            break;
        }
        if let Some((head, text)) = trimmed.split_once(':') {
            let name = head.split_whitespace().next().unwrap_or_default();
            if !name.is_empty() {
                entries.push((name.to_string(), text.trim().to_string()));
            }
        }
    }
    entries
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Element type of an array parameter, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ParamType>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Declarative description of a capability. Parameters keep declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDescriptor>,
}

impl CapabilityDescriptor {
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON-schema form shared by all backend adapters.
    pub fn to_tool_definition(&self) -> ToolDefinition {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut schema = json!({ "type": param.param_type.as_str() });
            if let Some(description) = &param.description {
                schema["description"] = json!(description);
            }
            if let Some(item) = param.items {
                schema["items"] = json!({ "type": item.as_str() });
            }
            properties.insert(param.name.clone(), schema);
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// Validate and coerce model-supplied arguments against the declared parameters.
    ///
    /// Missing optional parameters are filled from their defaults. Unknown keys,
    /// missing required parameters, and values that cannot be coerced produce
    /// [`AppError::ArgumentCoercion`].
    pub fn coerce_arguments(&self, args: &Value) -> Result<Map<String, Value>> {
        let empty = Map::new();
        let supplied = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(AppError::ArgumentCoercion(format!(
                    "arguments for '{}' must be a JSON object, got {}",
                    self.name,
                    json_type_name(other)
                )))
            }
        };

        if let Some(unknown) = supplied.keys().find(|k| self.parameter(k).is_none()) {
            return Err(AppError::ArgumentCoercion(format!(
                "unexpected argument '{}' for '{}'",
                unknown, self.name
            )));
        }

        let mut coerced = Map::new();
        for param in &self.parameters {
            match supplied.get(&param.name) {
                Some(value) if !value.is_null() => {
                    let value = coerce_value(&param.name, param.param_type, value)?;
                    coerced.insert(param.name.clone(), value);
                }
                _ => match &param.default {
                    Some(default) => {
                        coerced.insert(param.name.clone(), default.clone());
                    }
                    None => {
                        return Err(AppError::ArgumentCoercion(format!(
                            "missing required argument '{}' for '{}'",
                            param.name, self.name
                        )))
                    }
                },
            }
        }
        Ok(coerced)
    }
}

fn coerce_value(name: &str, expected: ParamType, value: &Value) -> Result<Value> {
    let coerced = match (expected, value) {
        (ParamType::String, Value::String(_)) => Some(value.clone()),
        (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

        (ParamType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
        (ParamType::Integer, Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| json!(f as i64)),
        (ParamType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(|i| json!(i)),

        (ParamType::Number, Value::Number(_)) => Some(value.clone()),
        (ParamType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),

        (ParamType::Boolean, Value::Bool(_)) => Some(value.clone()),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },

        (ParamType::Object, Value::Object(_)) => Some(value.clone()),
        (ParamType::Object, Value::String(s)) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(Value::is_object),

        (ParamType::Array, Value::Array(_)) => Some(value.clone()),
        (ParamType::Array, Value::String(s)) => serde_json::from_str::<Value>(s)
            .ok()
            .filter(Value::is_array),

        _ => None,
    };

    coerced.ok_or_else(|| {
        AppError::ArgumentCoercion(format!(
            "argument '{}' expected {}, got {}",
            name,
            expected,
            json_type_name(value)
        ))
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
