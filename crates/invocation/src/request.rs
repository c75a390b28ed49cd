//! The caller-facing invocation request.
//!
//! There is one canonical record, [`InvocationRequest`], and two ways to get
//! one: [`InvocationRequest::builder`] for typed callers, and
//! [`InvocationRequest::from_value`] for loosely-typed mappings such as a JSON
//! test case read from disk. Both validate the same rules and fail with
//! [`InvalidRequestError`].

use std::collections::BTreeMap;

use crate::errors::{InvalidRequestError, InvocationContext};
use crate::identifiers::{MethodName, ServiceName};
use crate::types::Value;

/// One method invocation to perform against a registered service.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    service: ServiceName,
    method: MethodName,
    params: Vec<Value>,
    host: Option<String>,
    port: Option<u16>,
    address_index: usize,
}

impl InvocationRequest {
    /// Starts a builder for `service.method()` with no arguments.
    pub fn builder(service: impl Into<String>, method: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            service: service.into(),
            method: method.into(),
            params: Vec::new(),
            host: None,
            port: None,
            address_index: 0,
        }
    }

    /// Validates a loosely-typed mapping into a request.
    ///
    /// Recognised keys: `service`, `method` (required strings), `params`
    /// (sequence, default empty), `host` (string), `port` (integer), and
    /// `index` or `addressIndex` (non-negative integer, default 0). Unknown
    /// keys are ignored.
    pub fn from_value(value: &Value) -> Result<Self, InvalidRequestError> {
        let map = value.as_mapping().ok_or_else(|| {
            InvalidRequestError::new(format!("request must be a mapping, got {}", value.kind()))
        })?;

        let service = required_string(map, "service")?;
        let method = required_string(map, "method")?;

        let params = match map.get("params") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items.clone(),
            Some(other) => {
                return Err(InvalidRequestError::new(format!(
                    "params must be a sequence, got {}",
                    other.kind()
                )))
            }
        };

        let host = match map.get("host") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(InvalidRequestError::new(format!(
                    "host must be a string, got {}",
                    other.kind()
                )))
            }
        };

        let port = match map.get("port") {
            None | Some(Value::Null) => None,
            Some(value) => Some(port_from_value(value)?),
        };

        let index_value = ["index", "addressIndex"]
            .into_iter()
            .filter_map(|key| map.get(key))
            .find(|value| !matches!(value, Value::Null));
        let address_index = match index_value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| {
                    InvalidRequestError::new(format!(
                        "index must be a non-negative integer, got {n}"
                    ))
                })?,
            Some(other) => {
                return Err(InvalidRequestError::new(format!(
                    "index must be an integer, got {}",
                    other.kind()
                )))
            }
        };

        let mut builder = Self::builder(service, method)
            .params(params)
            .address_index(address_index);
        if let Some(host) = host {
            builder = builder.host(host);
        }
        if let Some(port) = port {
            builder = builder.port(port);
        }
        builder.build()
    }

    /// Service name, short or fully qualified, as supplied.
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Method name.
    pub fn method(&self) -> &MethodName {
        &self.method
    }

    /// Ordered invocation arguments.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Explicit host, when the registry is to be bypassed.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Explicit port, when the registry is to be bypassed.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Which resolved provider to dial when several are registered.
    pub fn address_index(&self) -> usize {
        self.address_index
    }

    /// `Some((host, port))` when the request targets an address directly.
    pub fn direct_target(&self) -> Option<(&str, u16)> {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => Some((host.as_str(), port)),
            _ => None,
        }
    }

    /// Context for error reporting, without an address yet.
    pub fn context(&self) -> InvocationContext {
        InvocationContext {
            service: Some(self.service.to_string()),
            method: Some(self.method.to_string()),
            address: None,
        }
    }
}

/// Builder for [`InvocationRequest`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    service: String,
    method: String,
    params: Vec<Value>,
    host: Option<String>,
    port: Option<u16>,
    address_index: usize,
}

impl RequestBuilder {
    /// Sets the ordered invocation arguments.
    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Appends one argument.
    pub fn param(mut self, param: impl Into<Value>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Targets `host` directly instead of resolving the service.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Targets `port` directly instead of resolving the service.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Selects which resolved provider to dial.
    pub fn address_index(mut self, index: usize) -> Self {
        self.address_index = index;
        self
    }

    /// Validates and builds the request.
    pub fn build(self) -> Result<InvocationRequest, InvalidRequestError> {
        let service = ServiceName::new(self.service)
            .ok_or_else(|| InvalidRequestError::new("service must not be empty"))?;
        let method = MethodName::new(self.method)
            .ok_or_else(|| InvalidRequestError::new("method must not be empty"))?;

        let host = match self.host {
            Some(h) if h.trim().is_empty() => {
                return Err(InvalidRequestError::new("host must not be empty"))
            }
            other => other,
        };
        if host.is_some() != self.port.is_some() {
            return Err(InvalidRequestError::new(
                "host and port must be given together to bypass the registry",
            ));
        }

        Ok(InvocationRequest {
            service,
            method,
            params: self.params,
            host,
            port: self.port,
            address_index: self.address_index,
        })
    }
}

fn required_string(map: &BTreeMap<String, Value>, key: &str) -> Result<String, InvalidRequestError> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(InvalidRequestError::new(format!(
            "{key} must be a string, got {}",
            other.kind()
        ))),
        None => Err(InvalidRequestError::new(format!("{key} is required"))),
    }
}

fn port_from_value(value: &Value) -> Result<u16, InvalidRequestError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| InvalidRequestError::new(format!("port {n} is out of range"))),
        other => Err(InvalidRequestError::new(format!(
            "port must be an integer, got {}",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(json: &str) -> Value {
        Value::from_json_str(json).unwrap()
    }

    #[test]
    fn test_from_value_minimal_case() {
        let request = InvocationRequest::from_value(&mapping(
            r#"{"service":"UserInfoRpcService","method":"getUserState","params":[600001]}"#,
        ))
        .unwrap();
        assert_eq!(request.service().as_str(), "UserInfoRpcService");
        assert_eq!(request.method().as_str(), "getUserState");
        assert_eq!(request.params(), &[Value::from(600001_i64)]);
        assert_eq!(request.address_index(), 0);
        assert_eq!(request.direct_target(), None);
    }

    #[test]
    fn test_from_value_defaults_params_to_empty() {
        let request =
            InvocationRequest::from_value(&mapping(r#"{"service":"a.B","method":"ping"}"#)).unwrap();
        assert!(request.params().is_empty());
    }

    #[test]
    fn test_from_value_rejects_non_integer_port() {
        let err = InvocationRequest::from_value(&mapping(
            r#"{"service":"a.B","method":"m","host":"h","port":"20880"}"#,
        ))
        .unwrap_err();
        assert!(err.reason.contains("port must be an integer"));

        let err = InvocationRequest::from_value(&mapping(
            r#"{"service":"a.B","method":"m","host":"h","port":2.5}"#,
        ))
        .unwrap_err();
        assert!(err.reason.contains("port"));
    }

    #[test]
    fn test_from_value_rejects_non_sequence_params() {
        let err = InvocationRequest::from_value(&mapping(
            r#"{"service":"a.B","method":"m","params":{"id":1}}"#,
        ))
        .unwrap_err();
        assert!(err.reason.contains("params must be a sequence"));
    }

    #[test]
    fn test_from_value_host_and_port_target_directly() {
        let request = InvocationRequest::from_value(&mapping(
            r#"{"service":"a.B","method":"m","host":"10.0.0.5","port":20880,"index":2}"#,
        ))
        .unwrap();
        assert_eq!(request.direct_target(), Some(("10.0.0.5", 20880)));
        assert_eq!(request.address_index(), 2);
    }

    #[test]
    fn test_address_index_alias() {
        let request = InvocationRequest::from_value(&mapping(
            r#"{"service":"a.B","method":"m","addressIndex":1}"#,
        ))
        .unwrap();
        assert_eq!(request.address_index(), 1);
    }

    #[test]
    fn test_null_index_falls_back_to_alias() {
        let request = InvocationRequest::from_value(&mapping(
            r#"{"service":"a.B","method":"m","index":null,"addressIndex":2}"#,
        ))
        .unwrap();
        assert_eq!(request.address_index(), 2);

        let request = InvocationRequest::from_value(&mapping(
            r#"{"service":"a.B","method":"m","index":3,"addressIndex":2}"#,
        ))
        .unwrap();
        assert_eq!(request.address_index(), 3);
    }

    #[test]
    fn test_from_value_rejects_non_mapping() {
        let err = InvocationRequest::from_value(&mapping("[1,2]")).unwrap_err();
        assert!(err.reason.contains("mapping"));
    }

    #[test]
    fn test_builder_requires_host_and_port_together() {
        let err = InvocationRequest::builder("a.B", "m").port(20880).build().unwrap_err();
        assert!(err.reason.contains("together"));
    }

    #[test]
    fn test_builder_rejects_empty_names() {
        assert!(InvocationRequest::builder("", "m").build().is_err());
        assert!(InvocationRequest::builder("a.B", " ").build().is_err());
    }
}
