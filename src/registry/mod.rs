//! Operation registry
//!
//! One immutable table describes every resource and tool: its parameters,
//! the remote method it maps to, how positional remote arguments are laid
//! out and what shape the result has. Dispatch is driven entirely by this
//! table.

mod table;
mod template;

pub use template::{SCHEME_SEPARATOR, UriTemplate};

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use serde_json::Value;

use crate::{Error, Result};

/// Whether an operation changes remote state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Never mutates remote state
    Read,
    /// Always mutates remote state
    Mutate,
}

impl Kind {
    /// Lowercase label for logs and listings
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Mutate => "mutate",
        }
    }
}

/// Namespace an operation name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Addressed by URI (`survey://{sid}`)
    Resource,
    /// Addressed by bare identifier (`add_response`)
    Tool,
}

/// Semantic type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// JSON integer, or a string of digits
    Integer,
    /// JSON string
    String,
    /// JSON boolean
    Bool,
    /// JSON object
    Mapping,
    /// JSON array of anything
    List,
    /// JSON array of strings
    StringList,
    /// JSON array of objects
    MappingList,
    /// Base64 text, decoded to bytes before the remote call
    Binary,
    /// `YYYY-MM-DD` string, passed through unparsed
    Date,
    /// String from a fixed set
    Enum(&'static [&'static str]),
    /// Any JSON value
    Any,
}

/// Constant value used for defaults and fixed remote arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    /// JSON null
    Null,
    /// String literal
    Str(&'static str),
    /// Integer literal
    Int(i64),
    /// Boolean literal
    Bool(bool),
}

impl Literal {
    /// JSON form of the literal
    #[must_use]
    pub fn to_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Str(s) => Value::String(s.to_string()),
            Self::Int(n) => Value::from(n),
            Self::Bool(b) => Value::Bool(b),
        }
    }
}

/// Whether a parameter must be supplied, and what happens when it is not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be supplied
    Required,
    /// Left out of the remote call when absent
    Optional,
    /// Replaced by a literal when absent
    Default(Literal),
}

/// Declared parameter of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name
    pub name: &'static str,
    /// Semantic type
    pub ty: ParamType,
    /// Required / optional / defaulted
    pub presence: Presence,
    /// Human-readable description
    pub description: &'static str,
}

/// One positional argument of the remote call, after the session key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteArg {
    /// Value of a parameter
    Param(&'static str),
    /// Fixed value
    Literal(Literal),
    /// Parameter wrapped as `{"token": value}`
    TokenQuery(&'static str),
    /// Mapping parameter with another parameter merged in under `key`
    MergeInto {
        /// Mapping parameter
        mapping: &'static str,
        /// Key to insert
        key: &'static str,
        /// Parameter supplying the value
        from: &'static str,
    },
}

/// Text representation of a binary result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8 text when valid, base64 otherwise
    Utf8,
    /// Always base64
    Base64,
}

/// Expected shape of an operation's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// Single JSON scalar
    Scalar,
    /// JSON array
    List,
    /// JSON object
    Mapping,
    /// Binary content rendered as text
    Binary(TextEncoding),
}

/// Static description of one resource or tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    /// URI template or tool name, unique across the registry
    pub name: &'static str,
    /// Read or mutate
    pub kind: Kind,
    /// Human-readable description
    pub description: &'static str,
    /// Declared parameters in order
    pub params: &'static [ParamSpec],
    /// Remote procedure name
    pub remote_method: &'static str,
    /// Positional layout of remote arguments after the session key
    pub remote_args: &'static [RemoteArg],
    /// Result shape
    pub result: ResultShape,
    /// List parameter whose elements each get their own remote call
    pub fan_out: Option<&'static str>,
    /// Whether the operation deletes remote data
    pub destructive: bool,
}

impl OperationDescriptor {
    /// Namespace derived from the name
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        if self.name.contains(SCHEME_SEPARATOR) {
            Namespace::Resource
        } else {
            Namespace::Tool
        }
    }

    /// Look up a declared parameter
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// A descriptor together with the values bound from a resource address
#[derive(Debug, Clone)]
pub struct Resolved<'r> {
    /// Matched descriptor
    pub descriptor: &'r OperationDescriptor,
    /// Path placeholder bindings, raw strings in path order
    pub bindings: Vec<(String, String)>,
}

/// Immutable set of operations
#[derive(Debug)]
pub struct Registry {
    operations: Vec<OperationDescriptor>,
    by_name: HashMap<&'static str, usize>,
    templates: Vec<(UriTemplate, usize)>,
}

static BUILTIN: LazyLock<Arc<Registry>> = LazyLock::new(|| {
    Arc::new(
        Registry::new(table::operations())
            .expect("built-in operation table must be consistent"),
    )
});

impl Registry {
    /// Build a registry, rejecting duplicate names and malformed templates
    pub fn new(operations: impl IntoIterator<Item = OperationDescriptor>) -> Result<Self> {
        let operations: Vec<OperationDescriptor> = operations.into_iter().collect();
        let mut by_name = HashMap::with_capacity(operations.len());
        let mut templates = Vec::new();

        for (index, op) in operations.iter().enumerate() {
            if by_name.insert(op.name, index).is_some() {
                return Err(Error::Config(format!("Duplicate operation name: {}", op.name)));
            }
            Self::check(op)?;
            if op.namespace() == Namespace::Resource {
                let template = UriTemplate::parse(op.name)?;
                if let Some(missing) = template.params().find(|p| op.param(p).is_none()) {
                    return Err(Error::Config(format!(
                        "{}: placeholder '{missing}' has no parameter",
                        op.name
                    )));
                }
                templates.push((template, index));
            }
        }

        Ok(Self {
            operations,
            by_name,
            templates,
        })
    }

    /// Every remote argument and fan-out target must name a declared parameter
    fn check(op: &OperationDescriptor) -> Result<()> {
        let referenced = op.remote_args.iter().flat_map(|arg| match arg {
            RemoteArg::Param(name) | RemoteArg::TokenQuery(name) => vec![*name],
            RemoteArg::MergeInto { mapping, from, .. } => vec![*mapping, *from],
            RemoteArg::Literal(_) => vec![],
        });
        for name in referenced.chain(op.fan_out) {
            if op.param(name).is_none() {
                return Err(Error::Config(format!(
                    "{}: remote argument refers to undeclared parameter '{name}'",
                    op.name
                )));
            }
        }
        Ok(())
    }

    /// Shared registry of all built-in LimeSurvey operations
    #[must_use]
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Exact lookup by resource template or tool name
    pub fn lookup(&self, name: &str) -> Result<&OperationDescriptor> {
        self.by_name
            .get(name)
            .map(|&index| &self.operations[index])
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))
    }

    /// Resolve a resource address or tool name.
    ///
    /// Addresses are matched against every template; the match with the most
    /// literal segments wins. Tool names match exactly.
    pub fn resolve(&self, name: &str) -> Result<Resolved<'_>> {
        if !name.contains(SCHEME_SEPARATOR) {
            return self.lookup(name).map(|descriptor| Resolved {
                descriptor,
                bindings: Vec::new(),
            });
        }

        self.templates
            .iter()
            .filter_map(|(template, index)| {
                template
                    .matches(name)
                    .map(|bindings| (template.literal_count(), *index, bindings))
            })
            .max_by_key(|(literals, _, _)| *literals)
            .map(|(_, index, bindings)| Resolved {
                descriptor: &self.operations[index],
                bindings,
            })
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))
    }

    /// All operations in table order
    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.iter()
    }

    /// Resources without placeholders
    pub fn resources(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.templates
            .iter()
            .filter(|(template, _)| template.is_concrete())
            .map(|(_, index)| &self.operations[*index])
    }

    /// Resources with placeholders
    pub fn resource_templates(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.templates
            .iter()
            .filter(|(template, _)| !template.is_concrete())
            .map(|(_, index)| &self.operations[*index])
    }

    /// Tools
    pub fn tools(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations
            .iter()
            .filter(|op| op.namespace() == Namespace::Tool)
    }

    /// Number of registered operations
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
