//! Response decoder: strips console framing from a raw reply.
//!
//! A raw reply, as read up to and including the prompt, looks like:
//!
//! ```text
//! invoke com.example.UserService.getUserState(600001)\r\n
//! {"state":1,"name":"张三"}\r\n
//! elapsed: 12 ms.\r\n
//! dubbo>
//! ```
//!
//! Decoding steps, in order:
//!
//! 1. bytes → text in the configured encoding, dropping undecodable sequences;
//! 2. remove the trailing prompt and surrounding whitespace;
//! 3. drop a leading echo of the `invoke` command, when the console sent one;
//! 4. cut everything from the first `elapsed` onward (the timing footer);
//! 5. normalise `\r\n` to `\n`;
//! 6. try to parse what is left as JSON.
//!
//! Step 6 failing is reported as a [`ResponseDecodeWarning`] on the result,
//! never as an error.

use std::time::Duration;

use crate::errors::ResponseDecodeWarning;
use crate::types::{InvocationResult, TextEncoding, Timestamp, Value};

const ELAPSED_MARKER: &str = "elapsed";
const ECHO_PREFIX: &str = "invoke ";

/// Decodes a raw reply read up to and including `prompt`.
pub fn decode(raw: &[u8], encoding: TextEncoding, prompt: &str) -> InvocationResult {
    let text = encoding.decode_lossy(raw);
    let text = text.strip_suffix(prompt).unwrap_or(&text).trim();
    let text = strip_command_echo(text);

    let (body, server_elapsed) = match text.find(ELAPSED_MARKER) {
        Some(at) => (text[..at].trim_end(), parse_elapsed(&text[at..])),
        None => (text, None),
    };
    let raw_text = body.replace("\r\n", "\n");

    let (structured, warning) = match parse_value(&raw_text) {
        Ok(value) => (Some(value), None),
        Err(e) => (
            None,
            Some(ResponseDecodeWarning {
                message: e.to_string(),
            }),
        ),
    };
    let pretty = structured.as_ref().map(Value::to_pretty_string);

    InvocationResult {
        raw_text,
        structured,
        pretty,
        server_elapsed,
        warning,
        received_at: Timestamp::now(),
    }
}

/// Parses text produced by the console (or by [`Value::to_json_string`]).
pub fn parse_value(text: &str) -> Result<Value, serde_json::Error> {
    Value::from_json_str(text)
}

fn strip_command_echo(text: &str) -> &str {
    if !text.starts_with(ECHO_PREFIX) {
        return text;
    }
    match text.split_once('\n') {
        Some((_, rest)) => rest.trim_start(),
        // A reply that is nothing but the echo carries no payload.
        None => "",
    }
}

/// Parses `elapsed: 12 ms` (optionally followed by `.` or other text).
fn parse_elapsed(footer: &str) -> Option<Duration> {
    let rest = footer.strip_prefix(ELAPSED_MARKER)?.trim_start();
    let rest = rest.strip_prefix(':').unwrap_or(rest).trim_start();
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let millis = digits.parse::<u64>().ok()?;
    rest[digits.len()..]
        .trim_start()
        .starts_with("ms")
        .then(|| Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "dubbo>";

    #[test]
    fn test_decode_strips_echo_footer_and_prompt() {
        let raw = b"invoke com.example.UserService.getUserState(600001)\r\n{\"a\":1}\r\nelapsed: 12 ms\r\ndubbo>";
        let result = decode(raw, TextEncoding::Utf8, PROMPT);

        assert_eq!(result.raw_text, "{\"a\":1}");
        assert!(!result.raw_text.contains("elapsed"));
        assert!(!result.raw_text.contains(PROMPT));
        assert_eq!(result.structured, Some(Value::from_json_str(r#"{"a":1}"#).unwrap()));
        assert_eq!(result.pretty.as_deref(), Some("{\n    \"a\": 1\n}"));
        assert_eq!(result.server_elapsed, Some(Duration::from_millis(12)));
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_decode_without_echo() {
        let raw = "{\"name\":\"张三\"}\r\nelapsed: 3 ms.\r\ndubbo>".as_bytes();
        let result = decode(raw, TextEncoding::Utf8, PROMPT);
        assert_eq!(result.raw_text, "{\"name\":\"张三\"}");
        assert_eq!(result.display_text(), "{\n    \"name\": \"张三\"\n}");
        assert_eq!(result.server_elapsed, Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_plain_text_result_is_a_warning_not_an_error() {
        let raw = b"No such method getUser in service UserService\r\ndubbo>";
        let result = decode(raw, TextEncoding::Utf8, PROMPT);
        assert_eq!(result.raw_text, "No such method getUser in service UserService");
        assert!(result.structured.is_none());
        assert!(result.pretty.is_none());
        assert!(result.warning.is_some());
        assert_eq!(result.display_text(), result.raw_text);
    }

    #[test]
    fn test_scalar_results_parse() {
        let result = decode(b"true\r\nelapsed: 1 ms\r\ndubbo>", TextEncoding::Utf8, PROMPT);
        assert_eq!(result.structured, Some(Value::Bool(true)));

        let result = decode(b"\"ok\"\r\ndubbo>", TextEncoding::Utf8, PROMPT);
        assert_eq!(result.structured, Some(Value::from("ok")));
    }

    #[test]
    fn test_multiline_payload_newlines_are_normalised() {
        let raw = b"{\r\n  \"a\": [1,\r\n 2]\r\n}\r\nelapsed: 0 ms\r\ndubbo>";
        let result = decode(raw, TextEncoding::Utf8, PROMPT);
        assert_eq!(result.raw_text, "{\n  \"a\": [1,\n 2]\n}");
        assert!(result.structured.is_some());
    }

    #[test]
    fn test_invalid_bytes_are_dropped() {
        let raw = b"\"a\xffb\"\r\ndubbo>";
        let result = decode(raw, TextEncoding::Utf8, PROMPT);
        assert_eq!(result.structured, Some(Value::from("ab")));
    }

    #[test]
    fn test_custom_prompt() {
        let result = decode(b"42\r\nqos> ", TextEncoding::Utf8, "qos> ");
        assert_eq!(result.structured, Some(Value::from(42_i64)));
    }

    #[test]
    fn test_unparseable_elapsed_footer_is_still_removed() {
        let result = decode(b"1\r\nelapsed: soon\r\ndubbo>", TextEncoding::Utf8, PROMPT);
        assert_eq!(result.raw_text, "1");
        assert_eq!(result.server_elapsed, None);
    }

    #[test]
    fn test_echo_only_reply_is_empty() {
        let result = decode(b"invoke a.B.c()\r\ndubbo>", TextEncoding::Utf8, PROMPT);
        assert_eq!(result.raw_text, "");
        assert!(result.warning.is_some());
    }
}
