//! Path pattern grammar.
//!
//! A pattern is a sequence of `/literal` and `/{name}` groups, where a template
//! may carry a modifier (`{+name}` catch-all) and a fixed value
//! (`{name:value}`). Optional (`{/name}`) and catch-all (`{+name}`) groups may
//! also follow without a literal slash, since the slash is implied by the
//! modifier.

use std::borrow::Cow;
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::RouterError;

/// Characters escaped in a single path component (`encodeURIComponent` set).
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Characters escaped in RFC 6570 reserved expansion. Reserved characters,
/// brackets and existing percent triplets pass through.
const RESERVED: &AsciiSet = &COMPONENT
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'%');

/// RFC 6570 operators we recognise but do not support.
const UNSUPPORTED_OPERATORS: &[char] = &['#', '.', ';', '?', '&', '=', ',', '!', '@', '|'];

/// Template modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// `{/name}`: the segment may be absent.
    Optional,
    /// `{+name}`: consumes all remaining path segments.
    CatchAll,
}

impl Modifier {
    /// The modifier character as written in a pattern.
    pub fn symbol(self) -> char {
        match self {
            Self::Optional => '/',
            Self::CatchAll => '+',
        }
    }
}

/// A templated path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    pub modifier: Option<Modifier>,
    /// Fixed value from `{name:value}`.
    pub fixed: Option<String>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifier: None,
            fixed: None,
        }
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = Some(modifier);
        self
    }

    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed = Some(value.into());
        self
    }

    pub fn is_optional(&self) -> bool {
        self.modifier == Some(Modifier::Optional)
    }

    pub fn is_catch_all(&self) -> bool {
        self.modifier == Some(Modifier::CatchAll)
    }
}

/// One unit of a slash-delimited path or pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Plain, already decoded path component.
    Literal(String),
    /// Path component produced by expanding a catch-all. Serialized with
    /// reserved expansion rather than full component encoding.
    Reserved(String),
    /// Templated component.
    Param(Param),
    /// Annotation key; never matched by routing.
    Meta(String),
}

impl Segment {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn meta(name: impl Into<String>) -> Self {
        Self::Meta(name.into())
    }

    /// Text of a concrete (literal or reserved) segment.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(s) | Self::Reserved(s) => Some(s),
            Self::Param(_) | Self::Meta(_) => None,
        }
    }

    pub fn as_param(&self) -> Option<&Param> {
        match self {
            Self::Param(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.as_param().is_some_and(Param::is_optional)
    }
}

impl From<&str> for Segment {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for Segment {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl From<Param> for Segment {
    fn from(value: Param) -> Self {
        Self::Param(value)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "/{}", encode_component(s)),
            Self::Reserved(s) => write!(f, "/{}", encode_reserved(s)),
            Self::Param(p) => {
                let open = match p.modifier {
                    None => "/{",
                    Some(Modifier::Optional) => "{/",
                    Some(Modifier::CatchAll) => "{+",
                };
                f.write_str(open)?;
                f.write_str(&p.name)?;
                if let Some(fixed) = &p.fixed {
                    write!(f, ":{fixed}")?;
                }
                f.write_str("}")
            }
            Self::Meta(name) => write!(f, "<meta:{name}>"),
        }
    }
}

/// Parse a pattern string into segments.
///
/// Literal components are percent-decoded; malformed escapes are kept as-is.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, RouterError> {
    let mut segments = Vec::new();
    let mut rest = pattern;

    while !rest.is_empty() {
        if let Some(after_slash) = rest.strip_prefix('/') {
            let templated = after_slash
                .strip_prefix('{')
                .filter(|body| !body.starts_with('/'));
            if let Some(body) = templated {
                let (param, tail) = parse_template(pattern, body, false)?;
                segments.push(Segment::Param(param));
                rest = tail;
            } else {
                // `/{/name}` yields an empty literal followed by the optional group.
                let end = after_slash.find(['/', '{']).unwrap_or(after_slash.len());
                segments.push(Segment::Literal(
                    robust_decode(&after_slash[..end]).into_owned(),
                ));
                rest = &after_slash[end..];
            }
        } else if let Some(body) = rest.strip_prefix('{') {
            let (param, tail) = parse_template(pattern, body, true)?;
            segments.push(Segment::Param(param));
            rest = tail;
        } else {
            return Err(RouterError::syntax(
                pattern,
                format!("expected '/' or '{{' before '{rest}'"),
            ));
        }
    }

    Ok(segments)
}

/// Parse the body of a template group (the text after `{`). Returns the
/// parameter and the remaining input after the closing brace.
fn parse_template<'a>(
    pattern: &str,
    body: &'a str,
    implicit_slash: bool,
) -> Result<(Param, &'a str), RouterError> {
    let close = body
        .find('}')
        .ok_or_else(|| RouterError::syntax(pattern, "unbalanced '{'"))?;
    let (inner, tail) = (&body[..close], &body[close + 1..]);

    let (modifier, spec) = match inner.chars().next() {
        Some('+') => (Some(Modifier::CatchAll), &inner[1..]),
        Some('/') if implicit_slash => (Some(Modifier::Optional), &inner[1..]),
        Some(c) if UNSUPPORTED_OPERATORS.contains(&c) => {
            return Err(RouterError::syntax(
                pattern,
                format!("unsupported modifier '{c}'"),
            ));
        }
        _ => (None, inner),
    };

    if implicit_slash && modifier.is_none() {
        return Err(RouterError::syntax(
            pattern,
            format!("template '{{{inner}}}' must follow '/' or use the '/' or '+' modifier"),
        ));
    }

    let (name, fixed) = match spec.split_once(':') {
        Some((name, fixed)) => (name, Some(fixed)),
        None => (spec, None),
    };

    if name.is_empty() {
        return Err(RouterError::syntax(pattern, "empty parameter name"));
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '/' | '{')) {
        return Err(RouterError::syntax(
            pattern,
            format!("invalid character '{c}' in parameter name '{name}'"),
        ));
    }
    if fixed.is_some_and(str::is_empty) {
        return Err(RouterError::syntax(
            pattern,
            format!("empty fixed value for parameter '{name}'"),
        ));
    }

    Ok((
        Param {
            name: name.to_string(),
            modifier,
            fixed: fixed.map(str::to_string),
        },
        tail,
    ))
}

/// Split a request path into decoded components. One leading slash is
/// stripped; empty components are kept, so `/a//b/` yields `["a", "", "b", ""]`.
pub fn split_path(path: &str) -> Vec<String> {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.split('/')
        .map(|component| robust_decode(component).into_owned())
        .collect()
}

/// Percent-decode a component without ever failing.
///
/// If the whole input does not decode to UTF-8, each run of escape triplets is
/// decoded on its own and runs that still fail are left untouched.
pub fn robust_decode(input: &str) -> Cow<'_, str> {
    if !input.contains('%') {
        return Cow::Borrowed(input);
    }
    match percent_decode_str(input).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Owned(decode_escape_runs(input)),
    }
}

fn decode_escape_runs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let run_len = escape_run_len(tail.as_bytes());
        if run_len == 0 {
            out.push('%');
            rest = &tail[1..];
            continue;
        }
        let run = &tail[..run_len];
        match percent_decode_str(run).decode_utf8() {
            Ok(decoded) => out.push_str(&decoded),
            Err(_) => out.push_str(run),
        }
        rest = &tail[run_len..];
    }

    out.push_str(rest);
    out
}

/// Length in bytes of the run of `%XX` triplets at the start of `bytes`.
fn escape_run_len(bytes: &[u8]) -> usize {
    bytes
        .chunks(3)
        .take_while(|c| {
            c.len() == 3 && c[0] == b'%' && c[1].is_ascii_hexdigit() && c[2].is_ascii_hexdigit()
        })
        .count()
        * 3
}

/// Percent-encode a single path component.
pub fn encode_component(input: &str) -> Cow<'_, str> {
    utf8_percent_encode(input, COMPONENT).into()
}

/// RFC 6570 reserved expansion: encodes everything except unreserved and
/// reserved characters, brackets and existing percent triplets.
pub fn encode_reserved(input: &str) -> Cow<'_, str> {
    utf8_percent_encode(input, RESERVED).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str) -> Segment {
        Segment::Param(Param::new(name))
    }

    #[test]
    fn parse_literals_and_params() {
        let segments = parse_pattern("/page/{title}/html").unwrap();
        assert_eq!(
            segments,
            vec![Segment::literal("page"), param("title"), Segment::literal("html")]
        );
    }

    #[test]
    fn parse_fixed_value() {
        let segments = parse_pattern("/{domain:en.wikipedia.org}/v1").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Param(Param::new("domain").with_fixed("en.wikipedia.org")),
                Segment::literal("v1"),
            ]
        );
    }

    #[test]
    fn parse_modifiers_without_slash() {
        let segments = parse_pattern("/several{/optional}{/path}{+segments}").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::literal("several"),
                Segment::Param(Param::new("optional").with_modifier(Modifier::Optional)),
                Segment::Param(Param::new("path").with_modifier(Modifier::Optional)),
                Segment::Param(Param::new("segments").with_modifier(Modifier::CatchAll)),
            ]
        );
    }

    #[test]
    fn parse_catch_all_after_slash() {
        let segments = parse_pattern("/optional/{+path}").unwrap();
        assert_eq!(
            segments[1],
            Segment::Param(Param::new("path").with_modifier(Modifier::CatchAll))
        );
    }

    #[test]
    fn parse_keeps_empty_components() {
        assert_eq!(
            parse_pattern("/double//slash").unwrap(),
            vec![
                Segment::literal("double"),
                Segment::literal(""),
                Segment::literal("slash"),
            ]
        );
        assert_eq!(
            parse_pattern("/page/").unwrap(),
            vec![Segment::literal("page"), Segment::literal("")]
        );
        assert!(parse_pattern("").unwrap().is_empty());
    }

    #[test]
    fn parse_decodes_literals_robustly() {
        let segments = parse_pattern("/a%2Fb/100%/%FF").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::literal("a/b"),
                Segment::literal("100%"),
                Segment::literal("%FF"),
            ]
        );
    }

    #[test]
    fn parse_rejects_unbalanced_brace() {
        let err = parse_pattern("/page/{title").unwrap_err();
        assert!(matches!(err, RouterError::Syntax { .. }));
        assert!(err.to_string().contains("/page/{title"));
    }

    #[test]
    fn parse_rejects_unknown_modifier() {
        assert!(matches!(
            parse_pattern("/page/{#title}"),
            Err(RouterError::Syntax { .. })
        ));
        assert!(matches!(
            parse_pattern("/page{title}"),
            Err(RouterError::Syntax { .. })
        ));
        assert!(matches!(
            parse_pattern("/page/{}"),
            Err(RouterError::Syntax { .. })
        ));
    }

    #[test]
    fn parse_rejects_relative_text() {
        assert!(matches!(
            parse_pattern("page/{title}"),
            Err(RouterError::Syntax { .. })
        ));
    }

    #[test]
    fn split_path_strips_one_leading_slash() {
        assert_eq!(split_path("/a/b"), vec!["a", "b"]);
        assert_eq!(split_path("//a"), vec!["", "a"]);
        assert_eq!(split_path("/a/"), vec!["a", ""]);
        assert_eq!(split_path("/"), vec![""]);
    }

    #[test]
    fn split_path_decodes_each_component() {
        assert_eq!(split_path("/a%2fb/c%20d"), vec!["a/b", "c d"]);
        assert_eq!(split_path("/bad%zz/%E2%82"), vec!["bad%zz", "%E2%82"]);
    }

    #[test]
    fn robust_decode_keeps_invalid_runs() {
        assert_eq!(robust_decode("%C3%A4%FF-%41"), "%C3%A4%FF-A");
        assert_eq!(robust_decode("plain"), "plain");
    }

    #[test]
    fn encode_component_escapes_reserved() {
        assert_eq!(encode_component("foo/bar"), "foo%2Fbar");
        assert_eq!(encode_component("a b:c"), "a%20b%3Ac");
        assert_eq!(encode_component("it's-(ok)*~"), "it's-(ok)*~");
        assert_eq!(encode_component("100%"), "100%25");
    }

    #[test]
    fn encode_reserved_keeps_reserved_characters() {
        assert_eq!(
            encode_reserved("ä:/?#[]@!$&'()*+,;=%2f%20"),
            "%C3%A4:/?#[]@!$&'()*+,;=%2f%20"
        );
        assert_eq!(encode_reserved("a b"), "a%20b");
    }

    #[test]
    fn segment_display_matches_pattern_syntax() {
        assert_eq!(param("title").to_string(), "/{title}");
        assert_eq!(
            Segment::Param(Param::new("rest").with_modifier(Modifier::CatchAll)).to_string(),
            "{+rest}"
        );
        assert_eq!(Segment::literal("a b").to_string(), "/a%20b");
    }
}
