//! Parameter codec
//!
//! Validates inbound arguments against an operation's declared parameters,
//! lays them out as positional remote arguments, and turns remote results
//! back into JSON.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::registry::{
    OperationDescriptor, ParamSpec, ParamType, Presence, RemoteArg, ResultShape, TextEncoding,
};
use crate::remote::{CallArg, RemoteError, Reply};
use crate::{Error, Result};

/// A validated argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// JSON value
    Json(Value),
    /// Decoded binary payload
    Binary(Bytes),
}

impl From<ArgValue> for CallArg {
    fn from(value: ArgValue) -> Self {
        match value {
            ArgValue::Json(v) => Self::Json(v),
            ArgValue::Binary(b) => Self::Binary(b),
        }
    }
}

/// Validated arguments, keyed by parameter name.
///
/// Parameters that are absent and have no default are not present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<&'static str, ArgValue>,
}

impl Arguments {
    /// Value of a parameter, if present
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Copy with one parameter replaced
    #[must_use]
    pub fn with(&self, name: &'static str, value: ArgValue) -> Self {
        let mut values = self.values.clone();
        values.insert(name, value);
        Self { values }
    }
}

/// Encode bytes as standard base64
#[must_use]
pub fn encode_binary(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64
pub fn decode_binary(text: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}

/// Validate raw arguments against a descriptor
pub fn encode(descriptor: &OperationDescriptor, raw: &Map<String, Value>) -> Result<Arguments> {
    if let Some(unknown) = raw.keys().find(|key| descriptor.param(key).is_none()) {
        return Err(Error::invalid_argument(
            unknown.as_str(),
            format!("not a parameter of {}", descriptor.name),
        ));
    }

    let mut values = BTreeMap::new();
    for spec in descriptor.params {
        match raw.get(spec.name).filter(|v| !v.is_null()) {
            Some(value) => {
                values.insert(spec.name, coerce(spec, value)?);
            }
            None => match spec.presence {
                Presence::Required => {
                    return Err(Error::invalid_argument(spec.name, "missing required argument"));
                }
                Presence::Optional => {}
                Presence::Default(literal) => {
                    values.insert(spec.name, ArgValue::Json(literal.to_value()));
                }
            },
        }
    }

    Ok(Arguments { values })
}

/// Decimal digits with an optional leading minus sign
fn is_integer_text(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn coerce(spec: &ParamSpec, value: &Value) -> Result<ArgValue> {
    let mismatch = |expected: &str| Error::invalid_argument(spec.name, format!("expected {expected}"));

    let json = match spec.ty {
        ParamType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => value.clone(),
            Value::String(s) if is_integer_text(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| Error::invalid_argument(spec.name, "integer out of range"))?,
            _ => return Err(mismatch("an integer")),
        },
        ParamType::String | ParamType::Date => match value {
            Value::String(_) => value.clone(),
            _ => return Err(mismatch("a string")),
        },
        ParamType::Bool => match value {
            Value::Bool(_) => value.clone(),
            _ => return Err(mismatch("a boolean")),
        },
        ParamType::Mapping => match value {
            Value::Object(_) => value.clone(),
            _ => return Err(mismatch("an object")),
        },
        ParamType::List => match value {
            Value::Array(_) => value.clone(),
            _ => return Err(mismatch("an array")),
        },
        ParamType::StringList => match value {
            Value::Array(items) if items.iter().all(Value::is_string) => value.clone(),
            _ => return Err(mismatch("an array of strings")),
        },
        ParamType::MappingList => match value {
            Value::Array(items) if items.iter().all(Value::is_object) => value.clone(),
            _ => return Err(mismatch("an array of objects")),
        },
        ParamType::Enum(allowed) => match value {
            Value::String(s) if allowed.contains(&s.as_str()) => value.clone(),
            _ => {
                return Err(Error::invalid_argument(
                    spec.name,
                    format!("expected one of {}", allowed.join(", ")),
                ));
            }
        },
        ParamType::Binary => {
            let Value::String(text) = value else {
                return Err(mismatch("base64 text"));
            };
            let bytes = decode_binary(text)
                .map_err(|e| Error::invalid_argument(spec.name, format!("invalid base64: {e}")))?;
            return Ok(ArgValue::Binary(Bytes::from(bytes)));
        }
        ParamType::Any => value.clone(),
    };

    Ok(ArgValue::Json(json))
}

/// Lay out the positional remote arguments, after the session key
#[must_use]
pub fn build_call(descriptor: &OperationDescriptor, arguments: &Arguments) -> Vec<CallArg> {
    let mut slots: Vec<Option<CallArg>> = descriptor
        .remote_args
        .iter()
        .map(|arg| remote_arg(arg, arguments))
        .collect();

    while matches!(slots.last(), Some(None)) {
        slots.pop();
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or(CallArg::Json(Value::Null)))
        .collect()
}

fn remote_arg(arg: &RemoteArg, arguments: &Arguments) -> Option<CallArg> {
    match arg {
        RemoteArg::Param(name) => arguments.get(name).cloned().map(CallArg::from),
        RemoteArg::Literal(literal) => Some(CallArg::Json(literal.to_value())),
        RemoteArg::TokenQuery(name) => match arguments.get(name)? {
            ArgValue::Json(token) => {
                let mut query = Map::new();
                query.insert("token".to_string(), token.clone());
                Some(CallArg::Json(Value::Object(query)))
            }
            ArgValue::Binary(_) => None,
        },
        RemoteArg::MergeInto { mapping, key, from } => {
            let Some(ArgValue::Json(Value::Object(object))) = arguments.get(mapping) else {
                return None;
            };
            let mut merged = object.clone();
            if let Some(ArgValue::Json(id)) = arguments.get(from) {
                merged.insert((*key).to_string(), id.clone());
            }
            Some(CallArg::Json(Value::Object(merged)))
        }
    }
}

/// Convert a remote reply into the operation's result value
pub fn decode(shape: ResultShape, reply: Reply) -> std::result::Result<Value, RemoteError> {
    match (shape, reply) {
        (ResultShape::Binary(encoding), reply) => {
            let bytes = match reply {
                Reply::Binary(bytes) => bytes.to_vec(),
                Reply::Json(Value::String(text)) => decode_binary(&text)
                    .map_err(|e| RemoteError::Malformed(format!("binary result is not base64: {e}")))?,
                Reply::Json(other) => {
                    return Err(RemoteError::Malformed(format!(
                        "expected binary content, got {}",
                        json_type(&other)
                    )));
                }
            };
            Ok(binary_to_text(bytes, encoding))
        }
        (_, Reply::Json(value)) => Ok(value),
        (_, Reply::Binary(bytes)) => Ok(Value::String(encode_binary(&bytes))),
    }
}

/// Text form of a binary result.
///
/// Invalid UTF-8 is returned as `{"encoding": "base64", "content": ...}` so
/// it cannot be mistaken for text.
fn binary_to_text(bytes: Vec<u8>, encoding: TextEncoding) -> Value {
    match encoding {
        TextEncoding::Base64 => Value::String(encode_binary(&bytes)),
        TextEncoding::Utf8 => match String::from_utf8(bytes) {
            Ok(text) => Value::String(text),
            Err(e) => {
                warn!("Binary result is not valid UTF-8, returning base64");
                json!({
                    "encoding": "base64",
                    "content": encode_binary(e.as_bytes()),
                })
            }
        },
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Kind, Literal};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    const PARAMS: &[ParamSpec] = &[
        ParamSpec {
            name: "sid",
            ty: ParamType::Integer,
            presence: Presence::Required,
            description: "",
        },
        ParamSpec {
            name: "format",
            ty: ParamType::Enum(&["csv", "json"]),
            presence: Presence::Default(Literal::Str("csv")),
            description: "",
        },
        ParamSpec {
            name: "language",
            ty: ParamType::String,
            presence: Presence::Optional,
            description: "",
        },
        ParamSpec {
            name: "from",
            ty: ParamType::Integer,
            presence: Presence::Optional,
            description: "",
        },
        ParamSpec {
            name: "file",
            ty: ParamType::Binary,
            presence: Presence::Optional,
            description: "",
        },
    ];

    fn descriptor(remote_args: &'static [RemoteArg]) -> OperationDescriptor {
        OperationDescriptor {
            name: "export",
            kind: Kind::Read,
            description: "",
            params: PARAMS,
            remote_method: "export",
            remote_args,
            result: ResultShape::Scalar,
            fan_out: None,
            destructive: false,
        }
    }

    fn raw(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    // ── encode ──────────────────────────────────────────────────────────

    #[test]
    fn integer_accepts_digit_strings() {
        let args = encode(&descriptor(&[]), &raw(json!({"sid": "42"}))).unwrap();
        assert_eq!(args.get("sid"), Some(&ArgValue::Json(json!(42))));
    }

    #[test]
    fn negative_digit_strings_match_negative_numbers() {
        let from_text = encode(&descriptor(&[]), &raw(json!({"sid": "-5"}))).unwrap();
        let from_number = encode(&descriptor(&[]), &raw(json!({"sid": -5}))).unwrap();
        assert_eq!(from_text.get("sid"), Some(&ArgValue::Json(json!(-5))));
        assert_eq!(from_text, from_number);
    }

    #[test]
    fn integer_rejects_words_and_floats() {
        for bad in [
            json!("abc"),
            json!("-"),
            json!(""),
            json!("--5"),
            json!("+5"),
            json!("5-"),
            json!(1.5),
            json!(true),
        ] {
            let err = encode(&descriptor(&[]), &raw(json!({"sid": bad}))).unwrap_err();
            assert!(
                matches!(err, Error::InvalidArgument { ref name, .. } if name == "sid"),
                "{err}"
            );
        }
    }

    #[test]
    fn missing_required_is_rejected() {
        let err = encode(&descriptor(&[]), &raw(json!({"format": "csv"}))).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { ref name, ref reason }
            if name == "sid" && reason.contains("missing")));
    }

    #[test]
    fn explicit_null_counts_as_absent() {
        let args = encode(
            &descriptor(&[]),
            &raw(json!({"sid": 7, "format": null, "language": null})),
        )
        .unwrap();
        assert_eq!(args.get("format"), Some(&ArgValue::Json(json!("csv"))));
        assert_eq!(args.get("language"), None);

        let err = encode(&descriptor(&[]), &raw(json!({"sid": null}))).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn enum_outside_allowed_set_is_rejected() {
        let err = encode(&descriptor(&[]), &raw(json!({"sid": 7, "format": "xml"}))).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { ref reason, .. } if reason.contains("csv, json")));
    }

    #[test]
    fn undeclared_argument_is_rejected() {
        let err = encode(&descriptor(&[]), &raw(json!({"sid": 7, "bogus": 1}))).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { ref name, .. } if name == "bogus"));
    }

    #[test]
    fn binary_is_decoded_from_base64() {
        let args = encode(&descriptor(&[]), &raw(json!({"sid": 7, "file": "aGk="}))).unwrap();
        assert_eq!(
            args.get("file"),
            Some(&ArgValue::Binary(Bytes::from_static(b"hi")))
        );

        let err = encode(&descriptor(&[]), &raw(json!({"sid": 7, "file": "!!"}))).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { ref reason, .. } if reason.contains("base64")));
    }

    #[test]
    fn list_types_check_their_elements() {
        let spec = ParamSpec {
            name: "tokens",
            ty: ParamType::StringList,
            presence: Presence::Required,
            description: "",
        };
        assert!(coerce(&spec, &json!(["a", "b"])).is_ok());
        assert!(coerce(&spec, &json!(["a", 1])).is_err());

        let spec = ParamSpec {
            ty: ParamType::MappingList,
            ..spec
        };
        assert!(coerce(&spec, &json!([{"a": 1}])).is_ok());
        assert!(coerce(&spec, &json!([1])).is_err());
    }

    // ── build_call ──────────────────────────────────────────────────────

    #[test]
    fn trailing_omitted_args_are_dropped_and_interior_become_null() {
        const ARGS: &[RemoteArg] = &[
            RemoteArg::Param("sid"),
            RemoteArg::Param("format"),
            RemoteArg::Param("language"),
            RemoteArg::Param("from"),
        ];
        let d = descriptor(ARGS);

        let args = encode(&d, &raw(json!({"sid": 7}))).unwrap();
        assert_eq!(
            build_call(&d, &args),
            vec![CallArg::Json(json!(7)), CallArg::Json(json!("csv"))]
        );

        let args = encode(&d, &raw(json!({"sid": 7, "from": 10}))).unwrap();
        assert_eq!(
            build_call(&d, &args),
            vec![
                CallArg::Json(json!(7)),
                CallArg::Json(json!("csv")),
                CallArg::Json(Value::Null),
                CallArg::Json(json!(10)),
            ]
        );
    }

    #[test]
    fn token_query_and_literals() {
        const ARGS: &[RemoteArg] = &[
            RemoteArg::Param("sid"),
            RemoteArg::TokenQuery("language"),
            RemoteArg::Literal(Literal::Str("lss")),
        ];
        let d = descriptor(ARGS);
        let args = encode(&d, &raw(json!({"sid": 7, "language": "abc"}))).unwrap();
        assert_eq!(
            build_call(&d, &args),
            vec![
                CallArg::Json(json!(7)),
                CallArg::Json(json!({"token": "abc"})),
                CallArg::Json(json!("lss")),
            ]
        );
    }

    #[test]
    fn merge_into_inserts_id() {
        let params: &'static [ParamSpec] = &[
            ParamSpec {
                name: "response_id",
                ty: ParamType::Integer,
                presence: Presence::Required,
                description: "",
            },
            ParamSpec {
                name: "response",
                ty: ParamType::Mapping,
                presence: Presence::Required,
                description: "",
            },
        ];
        let d = OperationDescriptor {
            params,
            remote_args: &[RemoteArg::MergeInto {
                mapping: "response",
                key: "id",
                from: "response_id",
            }],
            ..descriptor(&[])
        };
        let args = encode(&d, &raw(json!({"response_id": "5", "response": {"Q1": "no"}}))).unwrap();
        assert_eq!(
            build_call(&d, &args),
            vec![CallArg::Json(json!({"Q1": "no", "id": 5}))]
        );
    }

    // ── decode ──────────────────────────────────────────────────────────

    #[test]
    fn utf8_result_becomes_text() {
        let value = decode(
            ResultShape::Binary(TextEncoding::Utf8),
            Reply::Binary(Bytes::from_static(b"a,b\n1,2")),
        )
        .unwrap();
        assert_eq!(value, json!("a,b\n1,2"));

        let value = decode(
            ResultShape::Binary(TextEncoding::Utf8),
            Reply::Json(json!(encode_binary(b"a,b\n1,2"))),
        )
        .unwrap();
        assert_eq!(value, json!("a,b\n1,2"));
    }

    #[test]
    fn invalid_utf8_falls_back_to_base64() {
        let value = decode(
            ResultShape::Binary(TextEncoding::Utf8),
            Reply::Binary(Bytes::from_static(&[0xff, 0xfe])),
        )
        .unwrap();
        assert_eq!(value, json!({"encoding": "base64", "content": "//4="}));
    }

    #[test]
    fn base64_result_stays_base64() {
        let value = decode(
            ResultShape::Binary(TextEncoding::Base64),
            Reply::Json(json!("JVBERg==")),
        )
        .unwrap();
        assert_eq!(value, json!("JVBERg=="));
    }

    #[test]
    fn non_text_binary_reply_is_malformed() {
        let err = decode(ResultShape::Binary(TextEncoding::Utf8), Reply::Json(json!(3))).unwrap_err();
        assert!(matches!(err, RemoteError::Malformed(_)));
    }

    #[test]
    fn json_results_pass_through() {
        let value = decode(ResultShape::Mapping, Reply::Json(json!({"sid": 7}))).unwrap();
        assert_eq!(value, json!({"sid": 7}));
    }

    proptest! {
        #[test]
        fn binary_round_trips(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let decoded = decode_binary(&encode_binary(&bytes)).unwrap();
            prop_assert_eq!(decoded, bytes);
        }

        #[test]
        fn binary_argument_reaches_call_unchanged(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            const ARGS: &[RemoteArg] = &[RemoteArg::Param("sid"), RemoteArg::Param("file")];
            let d = descriptor(ARGS);
            let args = encode(&d, &raw(json!({"sid": 1, "file": encode_binary(&bytes)}))).unwrap();
            let call = build_call(&d, &args);
            prop_assert_eq!(&call[1], &CallArg::Binary(Bytes::from(bytes)));
        }
    }
}
