//! Safe literal evaluator for parameter values.
//!
//! Accepts the literal subset models emit in call lines and maps it onto
//! JSON values:
//!
//! ```text
//! 42   -3.5   1e3          numbers
//! 'a'  "b\n"               strings (adjacent strings concatenate)
//! [1, 2]  (1, 2)  (1,)     lists and tuples -> arrays
//! {'k': 1}                 dicts -> objects (non-string keys are stringified)
//! {1, 2}                   sets -> arrays
//! True False None          also true / false / null
//! ```
//!
//! Nothing is ever executed. Anything outside this grammar is an error, and
//! callers fall back to the raw text.

use serde_json::{Map, Number, Value};

/// Evaluate `input` as a literal.
pub fn parse_literal(input: &str) -> Result<Value, String> {
    let tokens = tokenize(input.trim())?;
    if tokens.is_empty() {
        return Err("empty literal".into());
    }
    let (value, rest) = parse_value(&tokens)?;
    if !rest.is_empty() {
        return Err(format!("unexpected tokens after literal: {rest:?}"));
    }
    Ok(value)
}

/// Render a JSON value as a literal that [`parse_literal`] reads back.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".into(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(render_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), render_literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Num(Number),
    True,
    False,
    None,
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '[' | ']' | '(' | ')' | '{' | '}' | ',' | ':' => {
                chars.next();
                tokens.push(match c {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ',' => Token::Comma,
                    _ => Token::Colon,
                });
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some('r') => s.push('\r'),
                            Some('b') => s.push('\u{8}'),
                            Some('f') => s.push('\u{c}'),
                            Some('0') => s.push('\0'),
                            Some('u') => {
                                let hex: String = chars.by_ref().take(4).collect();
                                let code = u32::from_str_radix(&hex, 16)
                                    .map_err(|_| format!("invalid \\u escape: {hex}"))?;
                                s.push(char::from_u32(code).ok_or("invalid unicode escape")?);
                            }
                            Some(e @ ('\\' | '\'' | '"' | '/')) => s.push(e),
                            Some(other) => {
                                s.push('\\');
                                s.push(other);
                            }
                            None => return Err("unterminated string literal".into()),
                        },
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err("unterminated string literal".into()),
                    }
                }
                // Adjacent literals concatenate: 'a' 'b' == 'ab'
                if let Some(Token::Str(prev)) = tokens.last_mut() {
                    prev.push_str(&s);
                } else {
                    tokens.push(Token::Str(s));
                }
            }
            _ if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let mut num_str = String::new();
                num_str.push(c);
                chars.next();
                while let Some(&nc) = chars.peek() {
                    let after_exp = matches!(num_str.chars().last(), Some('e' | 'E'));
                    if nc.is_ascii_digit()
                        || nc == '.'
                        || nc == '_'
                        || nc == 'e'
                        || nc == 'E'
                        || (after_exp && (nc == '-' || nc == '+'))
                    {
                        num_str.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(parse_number(&num_str)?));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&wc) = chars.peek() {
                    if wc.is_alphanumeric() || wc == '_' {
                        word.push(wc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match word.as_str() {
                    "True" | "true" => Token::True,
                    "False" | "false" => Token::False,
                    "None" | "null" => Token::None,
                    _ => return Err(format!("not a literal: {word}")),
                });
            }
            _ => return Err(format!("unexpected character: {c}")),
        }
    }

    Ok(tokens)
}

fn parse_number(raw: &str) -> Result<Number, String> {
    let cleaned = raw.replace('_', "");
    let unsigned = cleaned.trim_start_matches(['+', '-']);
    if unsigned.is_empty() || !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(format!("invalid number: {raw}"));
    }
    let is_float = unsigned.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(n) = cleaned.trim_start_matches('+').parse::<i64>() {
            return Ok(Number::from(n));
        }
    }
    cleaned
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| format!("invalid number: {raw}"))
}

fn parse_value(tokens: &[Token]) -> Result<(Value, &[Token]), String> {
    let (first, rest) = tokens.split_first().ok_or("unexpected end of literal")?;
    match first {
        Token::Str(s) => Ok((Value::String(s.clone()), rest)),
        Token::Num(n) => Ok((Value::Number(n.clone()), rest)),
        Token::True => Ok((Value::Bool(true), rest)),
        Token::False => Ok((Value::Bool(false), rest)),
        Token::None => Ok((Value::Null, rest)),
        Token::LBracket => {
            let (items, rest, _) = parse_sequence(rest, &Token::RBracket)?;
            Ok((Value::Array(items), rest))
        }
        Token::LParen => {
            let (mut items, rest, trailing_comma) = parse_sequence(rest, &Token::RParen)?;
            // (x) is just x; (x,) and (x, y) are tuples
            if items.len() == 1 && !trailing_comma {
                Ok((items.remove(0), rest))
            } else {
                Ok((Value::Array(items), rest))
            }
        }
        Token::LBrace => parse_brace(rest),
        other => Err(format!("unexpected token: {other:?}")),
    }
}

/// Comma-separated values up to `close`. Also reports whether the last
/// element was followed by a comma.
fn parse_sequence<'a>(
    mut tokens: &'a [Token],
    close: &Token,
) -> Result<(Vec<Value>, &'a [Token], bool), String> {
    let mut items = Vec::new();
    let mut trailing_comma = false;
    loop {
        if tokens.first() == Some(close) {
            return Ok((items, &tokens[1..], trailing_comma));
        }
        let (value, rest) = parse_value(tokens)?;
        items.push(value);
        trailing_comma = false;
        match rest.first() {
            Some(Token::Comma) => {
                trailing_comma = true;
                tokens = &rest[1..];
            }
            Some(t) if t == close => tokens = rest,
            Some(t) => return Err(format!("expected ',' or {close:?}, found {t:?}")),
            None => return Err(format!("missing closing {close:?}")),
        }
    }
}

/// `{...}` is a dict when the first element is followed by ':', else a set.
fn parse_brace(tokens: &[Token]) -> Result<(Value, &[Token]), String> {
    if tokens.first() == Some(&Token::RBrace) {
        return Ok((Value::Object(Map::new()), &tokens[1..]));
    }
    let (first, after_first) = parse_value(tokens)?;
    if after_first.first() != Some(&Token::Colon) {
        let (items, rest, _) = parse_sequence(tokens, &Token::RBrace)?;
        return Ok((Value::Array(items), rest));
    }

    let mut map = Map::new();
    let mut key = first;
    let mut rest = &after_first[1..];
    loop {
        let (value, after_value) = parse_value(rest)?;
        map.insert(key_string(key), value);
        match after_value.first() {
            Some(Token::Comma) => rest = &after_value[1..],
            Some(Token::RBrace) => return Ok((Value::Object(map), &after_value[1..])),
            Some(t) => return Err(format!("expected ',' or '}}', found {t:?}")),
            None => return Err("missing closing '}'".into()),
        }
        if rest.first() == Some(&Token::RBrace) {
            return Ok((Value::Object(map), &rest[1..]));
        }
        let (next_key, after_key) = parse_value(rest)?;
        if after_key.first() != Some(&Token::Colon) {
            return Err("expected ':' after dict key".into());
        }
        key = next_key;
        rest = &after_key[1..];
    }
}

fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => render_literal(&other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars() {
        assert_eq!(parse_literal("42").unwrap(), json!(42));
        assert_eq!(parse_literal("-3.5").unwrap(), json!(-3.5));
        assert_eq!(parse_literal("+7").unwrap(), json!(7));
        assert_eq!(parse_literal("1e3").unwrap(), json!(1000.0));
        assert_eq!(parse_literal("1_000").unwrap(), json!(1000));
        assert_eq!(parse_literal("True").unwrap(), json!(true));
        assert_eq!(parse_literal("false").unwrap(), json!(false));
        assert_eq!(parse_literal("None").unwrap(), Value::Null);
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(parse_literal("'green shoes'").unwrap(), json!("green shoes"));
        assert_eq!(parse_literal(r#""a\"b""#).unwrap(), json!("a\"b"));
        assert_eq!(parse_literal(r"'line\nbreak'").unwrap(), json!("line\nbreak"));
        assert_eq!(parse_literal(r#""\u00e9""#).unwrap(), json!("é"));
        assert_eq!(parse_literal("'a' 'b'").unwrap(), json!("ab"));
    }

    #[test]
    fn containers() {
        assert_eq!(parse_literal("[1, 2, 3]").unwrap(), json!([1, 2, 3]));
        assert_eq!(parse_literal("[1, [2, [3]],]").unwrap(), json!([1, [2, [3]]]));
        assert_eq!(parse_literal("(1, 2)").unwrap(), json!([1, 2]));
        assert_eq!(parse_literal("(1,)").unwrap(), json!([1]));
        assert_eq!(parse_literal("(1)").unwrap(), json!(1));
        assert_eq!(parse_literal("()").unwrap(), json!([]));
        assert_eq!(
            parse_literal("{'a': 1, 'b': {'c': [True, None]}}").unwrap(),
            json!({"a": 1, "b": {"c": [true, null]}})
        );
        assert_eq!(parse_literal("{1: 'x'}").unwrap(), json!({"1": "x"}));
        assert_eq!(parse_literal("{1, 2}").unwrap(), json!([1, 2]));
        assert_eq!(parse_literal("{}").unwrap(), json!({}));
    }

    #[test]
    fn rejects_non_literals() {
        assert!(parse_literal("hello world").is_err());
        assert!(parse_literal("hello").is_err());
        assert!(parse_literal("").is_err());
        assert!(parse_literal("[1, 2").is_err());
        assert!(parse_literal("'open").is_err());
        assert!(parse_literal("1 2").is_err());
        assert!(parse_literal("__import__('os')").is_err());
        assert!(parse_literal("-").is_err());
    }

    #[test]
    fn render_reads_back() {
        let value = json!({"q": "it's \"green\"", "n": [1, 2.5, null, true], "d": {}});
        assert_eq!(parse_literal(&render_literal(&value)).unwrap(), value);
    }
}
