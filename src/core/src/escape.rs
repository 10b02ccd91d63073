/* src/core/src/escape.rs */

/// Escape `<`, `>`, and `&` in a JSON document as `\uXXXX` sequences so the
/// text can be embedded inside an inline `<script>` tag without ever closing
/// the tag or introducing markup. In valid JSON these characters only occur
/// inside string values, where the escapes decode back to the same text.
pub fn escape_inline_json(json: &str) -> String {
  let mut out = String::with_capacity(json.len());
  for ch in json.chars() {
    match ch {
      '<' => out.push_str("\\u003c"),
      '>' => out.push_str("\\u003e"),
      '&' => out.push_str("\\u0026"),
      _ => out.push(ch),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_json_passthrough() {
    let input = r#"{"key":"hello"}"#;
    assert_eq!(escape_inline_json(input), input);
  }

  #[test]
  fn script_close_cannot_survive() {
    let input = r#"{"html":"</script><script>alert(1)</script>"}"#;
    let escaped = escape_inline_json(input);
    assert!(!escaped.contains("</script>"));
    assert!(!escaped.contains('<'));
    assert!(!escaped.contains('>'));
  }

  #[test]
  fn ampersand_escaped() {
    assert_eq!(escape_inline_json(r#"{"q":"a&b"}"#), "{\"q\":\"a\\u0026b\"}");
  }

  #[test]
  fn escapes_round_trip_through_json() {
    let value = serde_json::json!({"body": "<b>bold & brash</b>"});
    let escaped = escape_inline_json(&value.to_string());
    let parsed: serde_json::Value = serde_json::from_str(&escaped).expect("valid json");
    assert_eq!(parsed, value);
  }

  #[test]
  fn non_ascii_untouched() {
    let input = r#"{"msg":"héllo"}"#;
    assert_eq!(escape_inline_json(input), input);
  }
}
