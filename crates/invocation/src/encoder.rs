//! Invocation encoder: renders a call in the console's `invoke` syntax.
//!
//! ```text
//! invoke com.example.UserService.getUserState(600001,"zh-CN",{"deep":true})
//! ```
//!
//! Each top-level argument is encoded independently as compact JSON and the
//! results are comma-joined. Nested sequences are encoded as JSON arrays, not
//! expanded into further argument slots. Non-ASCII characters are written as
//! `\uXXXX` escapes, so the command is plain ASCII whatever charset the
//! provider console decodes with.

use crate::request::InvocationRequest;
use crate::types::Value;

/// Renders `invoke <service>.<method>(<args>)`.
///
/// `params` is expanded only when it is a [`Value::Sequence`]; any other
/// non-null value is passed as a single argument, and [`Value::Null`] yields
/// an empty argument list.
pub fn encode(method: &str, service: &str, params: &Value) -> String {
    format!("invoke {service}.{method}({})", encode_arguments(params))
}

/// Renders the command for a validated request.
pub fn encode_request(request: &InvocationRequest) -> String {
    let args = request
        .params()
        .iter()
        .map(encode_argument)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "invoke {}.{}({args})",
        request.service(),
        request.method()
    )
}

fn encode_arguments(params: &Value) -> String {
    match params {
        Value::Null => String::new(),
        Value::Sequence(items) => items
            .iter()
            .map(encode_argument)
            .collect::<Vec<_>>()
            .join(","),
        single => encode_argument(single),
    }
}

fn encode_argument(value: &Value) -> String {
    escape_non_ascii(&value.to_json_string())
}

/// Rewrites every non-ASCII character of a JSON text as `\uXXXX`, using a
/// surrogate pair above the basic multilingual plane. Such characters only
/// occur inside JSON strings, where the escape is equivalent.
fn escape_non_ascii(json: &str) -> String {
    if json.is_ascii() {
        return json.to_string();
    }
    let mut out = String::with_capacity(json.len() + 16);
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units).iter() {
            out.push_str(&format!("\\u{unit:04x}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::decoder::parse_value;

    fn seq(json: &str) -> Value {
        Value::from_json_str(json).unwrap()
    }

    #[test]
    fn test_encode_sequence_expands_top_level_only() {
        let params = seq(r#"[600001, "name", [1, 2], {"k": "v"}, true, null]"#);
        assert_eq!(
            encode("getUserState", "com.example.UserService", &params),
            r#"invoke com.example.UserService.getUserState(600001,"name",[1,2],{"k":"v"},true,null)"#
        );
    }

    #[test]
    fn test_encode_single_string_is_one_argument() {
        let params = Value::from("hello");
        assert_eq!(encode("echo", "EchoService", &params), r#"invoke EchoService.echo("hello")"#);
    }

    #[test]
    fn test_encode_single_mapping_is_one_argument() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), Value::from(2_i64));
        map.insert("a".to_string(), Value::from(1_i64));
        assert_eq!(
            encode("save", "a.Repo", &Value::Mapping(map)),
            r#"invoke a.Repo.save({"a":1,"b":2})"#
        );
    }

    #[test]
    fn test_encode_empty_params() {
        assert_eq!(encode("ping", "svc", &Value::Sequence(vec![])), "invoke svc.ping()");
        assert_eq!(encode("ping", "svc", &Value::Null), "invoke svc.ping()");
    }

    #[test]
    fn test_encode_escapes_non_ascii() {
        assert_eq!(
            encode("find", "svc", &seq(r#"["张三", {"café": "ü"}]"#)),
            r#"invoke svc.find("\u5f20\u4e09",{"caf\u00e9":"\u00fc"})"#
        );
        assert_eq!(
            encode("find", "svc", &Value::from("😀")),
            r#"invoke svc.find("\ud83d\ude00")"#
        );
    }

    #[test]
    fn test_escaped_argument_decodes_to_original_text() {
        let encoded = encode_argument(&Value::from("张三 😀"));
        assert!(encoded.is_ascii());
        assert_eq!(parse_value(&encoded).unwrap(), Value::from("张三 😀"));
    }

    #[test]
    fn test_encode_request_matches_encode() {
        let request = InvocationRequest::builder("UserInfoRpcService", "getUserState")
            .param(600001_i64)
            .param("x")
            .build()
            .unwrap();
        assert_eq!(
            encode_request(&request),
            encode("getUserState", "UserInfoRpcService", &seq(r#"[600001,"x"]"#))
        );
    }

    #[test]
    fn test_each_argument_decodes_back_to_itself() {
        let params = vec![
            Value::from(42_i64),
            Value::from("text with \"quotes\" and, commas"),
            Value::from(false),
            Value::Null,
            seq(r#"{"nested":{"list":[1,2.5,"x"]},"flag":true}"#),
        ];
        for param in &params {
            let encoded = param.to_json_string();
            assert_eq!(&parse_value(&encoded).unwrap(), param, "argument {encoded}");
        }
    }
}
