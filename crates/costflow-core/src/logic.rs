//! Calculator settings: params, input wiring, logic definition and output mapping

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A param declared on a reusable calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamDeclaration {
    pub name: String,
    #[serde(default, alias = "type")]
    pub declared_type: Option<String>,
}

impl ParamDeclaration {
    pub fn new(name: impl Into<String>, declared_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.map(str::to_string),
        }
    }
}

/// Stage-level wiring of a param to a path in the host data tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputWiring {
    #[serde(alias = "param")]
    pub param_name: String,
    #[serde(alias = "path")]
    pub source_path: String,
}

impl InputWiring {
    pub fn new(param_name: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            param_name: param_name.into(),
            source_path: source_path.into(),
        }
    }
}

/// One variable declaration. Exactly one of `formula`/`value` is meaningful;
/// a non-blank formula wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// What a variable is defined by
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableBody<'a> {
    Formula(&'a str),
    Value(&'a Value),
    Empty,
}

impl VariableDef {
    pub fn formula(name: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            formula: Some(formula.into()),
            value: None,
        }
    }

    pub fn value(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            formula: None,
            value: Some(value.into()),
        }
    }

    pub fn body(&self) -> VariableBody<'_> {
        match (&self.formula, &self.value) {
            (Some(f), _) if !f.trim().is_empty() => VariableBody::Formula(f),
            (_, Some(v)) => VariableBody::Value(v),
            _ => VariableBody::Empty,
        }
    }
}

/// Ordered variable list (the LOGIC_JSON block). Evaluated strictly in order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "LogicRepr")]
pub struct LogicDefinition {
    pub vars: Vec<VariableDef>,
}

/// Accepted encodings of a logic definition
#[derive(Deserialize)]
#[serde(untagged)]
enum LogicRepr {
    Serialized(String),
    List(Vec<VariableDef>),
    Wrapped { vars: Vec<VariableDef> },
}

impl TryFrom<LogicRepr> for LogicDefinition {
    type Error = Error;

    fn try_from(repr: LogicRepr) -> Result<Self> {
        match repr {
            LogicRepr::Serialized(text) => LogicDefinition::from_json(&text),
            LogicRepr::List(vars) | LogicRepr::Wrapped { vars } => Ok(LogicDefinition { vars }),
        }
    }
}

impl LogicDefinition {
    pub fn new(vars: Vec<VariableDef>) -> Self {
        Self { vars }
    }

    /// Decode a serialized LOGIC_JSON block: either a bare array of variables
    /// or an object with a `vars` array. Blank text is an empty definition.
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str::<LogicRepr>(text) {
            Ok(LogicRepr::Serialized(_)) => Err(Error::InvalidLogic(
                "expected an array or an object with `vars`, got a string".into(),
            )),
            Ok(repr) => LogicDefinition::try_from(repr),
            Err(e) => Err(Error::InvalidLogic(e.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableDef> {
        self.vars.iter()
    }
}

/// The six results every stage's output mapping must be able to populate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequiredResult {
    Width,
    Length,
    Height,
    Weight,
    PurchasingPrice,
    BasePrice,
}

impl RequiredResult {
    pub const ALL: [RequiredResult; 6] = [
        RequiredResult::Width,
        RequiredResult::Length,
        RequiredResult::Height,
        RequiredResult::Weight,
        RequiredResult::PurchasingPrice,
        RequiredResult::BasePrice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredResult::Width => "width",
            RequiredResult::Length => "length",
            RequiredResult::Height => "height",
            RequiredResult::Weight => "weight",
            RequiredResult::PurchasingPrice => "purchasingPrice",
            RequiredResult::BasePrice => "basePrice",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == name)
    }
}

impl fmt::Display for RequiredResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed output key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultKey {
    Required(RequiredResult),
    Custom { slug: String, title: String },
}

impl ResultKey {
    /// Parse `width` … `basePrice`, or a `slug|title` pair
    pub fn parse(key: &str) -> Result<Self> {
        let key = key.trim();
        if let Some(required) = RequiredResult::from_name(key) {
            return Ok(ResultKey::Required(required));
        }
        let (slug, title) = key
            .split_once('|')
            .ok_or_else(|| Error::InvalidResultKey(format!("'{}' is not a result name or slug|title pair", key)))?;
        let slug = slug.trim();
        let title = title.trim();
        let slug_ok = !slug.is_empty()
            && slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !slug_ok {
            return Err(Error::InvalidResultKey(format!("invalid slug in '{}'", key)));
        }
        if title.is_empty() {
            return Err(Error::InvalidResultKey(format!("missing title in '{}'", key)));
        }
        Ok(ResultKey::Custom {
            slug: slug.to_string(),
            title: title.to_string(),
        })
    }

    /// Name the result is stored under in an outputs map
    pub fn name(&self) -> &str {
        match self {
            ResultKey::Required(r) => r.as_str(),
            ResultKey::Custom { slug, .. } => slug,
        }
    }
}

/// Stage-level mapping of a result key onto a variable or input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputMapping {
    pub key: String,
    #[serde(alias = "source", alias = "var")]
    pub source_ref: String,
}

impl OutputMapping {
    pub fn new(key: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            source_ref: source_ref.into(),
        }
    }
}

/// Reusable calculator configuration referenced by stages
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorSettings {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDeclaration>,
    #[serde(default, alias = "logicJson")]
    pub logic: LogicDefinition,
}
