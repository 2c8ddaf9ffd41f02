//! Parser for ad-hoc `method(name=value, ...)` call strings, the textual
//! front end to the handler's dispatch path.

use serde_json::{Map, Value};

use palaver_core::ConnectorError;

/// Parse a native call string like
/// `conversations.history(channel=C024BE91L, limit=10)` into a method name
/// and a parameter object.
///
/// Values may be single- or double-quoted strings, integers, floats,
/// booleans, or bare words (kept as strings).
pub fn parse_native_call(input: &str) -> Result<(String, Map<String, Value>), ConnectorError> {
    let malformed =
        |detail: &str| ConnectorError::UnsupportedQueryShape(format!("malformed native call: {}", detail));

    let input = input.trim();
    let open = input
        .find('(')
        .ok_or_else(|| malformed("expected 'method(...)'"))?;
    if !input.ends_with(')') {
        return Err(malformed("missing closing parenthesis"));
    }

    let method = input[..open].trim();
    if method.is_empty()
        || !method
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    {
        return Err(malformed("invalid method name"));
    }

    let body = &input[open + 1..input.len() - 1];
    let mut params = Map::new();
    for part in split_args(body)? {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let eq = part
            .find('=')
            .ok_or_else(|| malformed("expected name=value"))?;
        let name = part[..eq].trim();
        if name.is_empty() {
            return Err(malformed("empty parameter name"));
        }
        let value = parse_value(part[eq + 1..].trim())
            .ok_or_else(|| malformed("empty parameter value"))?;
        params.insert(name.to_string(), value);
    }

    Ok((method.to_string(), params))
}

/// Split the argument body on commas, honoring quoted values.
fn split_args(body: &str) -> Result<Vec<String>, ConnectorError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in body.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                current.push(c);
            }
            None if c == ',' => parts.push(std::mem::take(&mut current)),
            None => current.push(c),
        }
    }
    if quote.is_some() {
        return Err(ConnectorError::UnsupportedQueryShape(
            "malformed native call: unterminated quote".to_string(),
        ));
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    Ok(parts)
}

fn parse_value(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    let bytes = raw.as_bytes();
    if raw.len() >= 2
        && ((bytes[0] == b'\'' && bytes[raw.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[raw.len() - 1] == b'"'))
    {
        return Some(Value::String(raw[1..raw.len() - 1].to_string()));
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Some(Value::from(f));
    }
    match raw {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => Some(Value::String(raw.to_string())),
    }
}
