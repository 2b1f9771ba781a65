//! Dispatcher
//!
//! Resolves a name, validates its arguments, runs the bound remote method in
//! a fresh session and decodes the result.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{Instrument, debug, info_span, warn};

use crate::codec::{self, ArgValue, Arguments};
use crate::config::Config;
use crate::fault;
use crate::registry::{Namespace, OperationDescriptor, Registry};
use crate::remote::{CallArg, LimeSurveyClient, RemotePlatform};
use crate::session::{Session, SessionManager};
use crate::{Error, Result};

/// One validated call, ready to be sent
#[derive(Debug)]
pub struct InvocationRequest<'r> {
    /// Target operation
    pub descriptor: &'r OperationDescriptor,
    /// Validated arguments
    pub arguments: Arguments,
}

impl InvocationRequest<'_> {
    /// Positional argument lists, one per remote call.
    ///
    /// Fan-out operations yield one list per element of the fan-out
    /// parameter; everything else yields exactly one.
    #[must_use]
    pub fn remote_calls(&self) -> Vec<Vec<CallArg>> {
        let elements = self
            .descriptor
            .fan_out
            .and_then(|param| match self.arguments.get(param) {
                Some(ArgValue::Json(Value::Array(items))) => Some((param, items)),
                _ => None,
            });

        match elements {
            Some((param, items)) => items
                .iter()
                .map(|item| {
                    let arguments = self.arguments.with(param, ArgValue::Json(item.clone()));
                    codec::build_call(self.descriptor, &arguments)
                })
                .collect(),
            None => vec![codec::build_call(self.descriptor, &self.arguments)],
        }
    }
}

/// Routes named calls to the remote platform
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    sessions: SessionManager,
}

impl Dispatcher {
    /// Create a dispatcher over a registry and session manager
    pub fn new(registry: Arc<Registry>, sessions: SessionManager) -> Self {
        Self { registry, sessions }
    }

    /// Dispatcher over the built-in registry talking to LimeSurvey
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = LimeSurveyClient::new(config.limesurvey.request_timeout)?;
        let platform: Arc<dyn RemotePlatform> = Arc::new(client);
        Ok(Self::new(
            Registry::builtin(),
            SessionManager::new(platform, config.limesurvey.credentials()),
        ))
    }

    /// Registry in use
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatch a resource address or tool name
    pub async fn dispatch(&self, name: &str, raw_args: Value) -> Result<Value> {
        self.dispatch_in(None, name, raw_args).await
    }

    /// Read a resource; tool names are not resources
    pub async fn read_resource(&self, uri: &str) -> Result<Value> {
        self.dispatch_in(Some(Namespace::Resource), uri, Value::Null)
            .await
    }

    /// Call a tool; resource addresses are not tools
    pub async fn call_tool(&self, name: &str, raw_args: Value) -> Result<Value> {
        self.dispatch_in(Some(Namespace::Tool), name, raw_args).await
    }

    async fn dispatch_in(
        &self,
        namespace: Option<Namespace>,
        name: &str,
        raw_args: Value,
    ) -> Result<Value> {
        let resolved = self.registry.resolve(name)?;
        let descriptor = resolved.descriptor;
        if namespace.is_some_and(|ns| ns != descriptor.namespace()) {
            return Err(Error::UnknownOperation(name.to_string()));
        }

        let mut raw = match raw_args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(Error::invalid_argument(
                    "arguments",
                    "expected an object",
                ));
            }
        };
        for (param, value) in resolved.bindings {
            if raw.contains_key(&param) {
                return Err(Error::invalid_argument(
                    param,
                    "already bound by the resource address",
                ));
            }
            raw.insert(param, Value::String(value));
        }

        let request = InvocationRequest {
            descriptor,
            arguments: codec::encode(descriptor, &raw)?,
        };

        let span = info_span!(
            "dispatch",
            operation = descriptor.name,
            kind = descriptor.kind.as_str(),
            method = descriptor.remote_method,
        );
        self.sessions
            .with_session(|session| invoke(session, request))
            .instrument(span)
            .await
    }
}

async fn invoke(session: Session, request: InvocationRequest<'_>) -> Result<Value> {
    let descriptor = request.descriptor;
    let calls = request.remote_calls();
    let mut results = Vec::with_capacity(calls.len());

    for args in calls {
        debug!(args = args.len(), "Invoking remote method");
        let outcome = match session.call(descriptor.remote_method, args).await {
            Ok(reply) => match fault::inspect_reply(&reply) {
                Some(fault) => Err(fault),
                None => codec::decode(descriptor.result, reply).map_err(fault::translate),
            },
            Err(e) => Err(fault::translate(e)),
        };

        match outcome {
            Ok(value) => results.push(value),
            Err(fault) => {
                warn!(code = %fault.code, message = %fault.message, "Remote fault");
                return Err(fault.into());
            }
        }
    }

    if descriptor.fan_out.is_some() {
        Ok(Value::Array(results))
    } else {
        Ok(results.pop().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn calls(name: &str, raw: Value) -> Vec<Vec<CallArg>> {
        let registry = Registry::builtin();
        let descriptor = registry.lookup(name).unwrap();
        let Value::Object(raw) = raw else {
            panic!("not an object")
        };
        InvocationRequest {
            descriptor,
            arguments: codec::encode(descriptor, &raw).unwrap(),
        }
        .remote_calls()
    }

    #[test]
    fn fan_out_yields_one_call_per_element() {
        assert_eq!(
            calls(
                "add_responses",
                json!({"sid": 7, "responses": [{"Q1": "a"}, {"Q1": "b"}]}),
            ),
            vec![
                vec![CallArg::Json(json!(7)), CallArg::Json(json!({"Q1": "a"}))],
                vec![CallArg::Json(json!(7)), CallArg::Json(json!({"Q1": "b"}))],
            ]
        );
    }

    #[test]
    fn empty_fan_out_makes_no_calls() {
        assert!(calls("add_responses", json!({"sid": 7, "responses": []})).is_empty());
    }

    #[test]
    fn single_call_layout_for_plain_tools() {
        assert_eq!(
            calls(
                "set_participant_properties",
                json!({"sid": 7, "token": "abc", "properties": {"email": "x@y.z"}}),
            ),
            vec![vec![
                CallArg::Json(json!(7)),
                CallArg::Json(json!({"token": "abc"})),
                CallArg::Json(json!({"email": "x@y.z"})),
            ]]
        );
    }
}
