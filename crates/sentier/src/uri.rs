//! URI templates: parse, bind, expand, render and prefix comparison.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Serialize, Serializer};
use url::{Position, Url};

use crate::error::RouterError;
use crate::params::{ParamValue, Params};
use crate::pattern::{
    encode_component, encode_reserved, parse_pattern, split_path, Modifier, Param, Segment,
};

/// Serialization format for [`Uri::render`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Substitute values; stop at the first unresolved template.
    #[default]
    Expanded,
    /// Substitute values; render unresolved templates as `{name}`.
    SimplePattern,
    /// Render every template with its modifier, and `:value` when bound.
    FullPattern,
}

/// Options for [`Uri::render`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions<'a> {
    pub format: Format,
    /// Parameters to use instead of the URI's own.
    pub params: Option<&'a Params>,
}

impl RenderOptions<'_> {
    pub fn format(format: Format) -> Self {
        Self {
            format,
            params: None,
        }
    }
}

/// A path (optionally prefixed by scheme and authority) made of literal and
/// templated segments, plus a map of bound parameters.
///
/// The segment sequence is immutable and shared between URIs derived from one
/// another; parameters are per instance.
#[derive(Debug, Clone)]
pub struct Uri {
    path: Arc<[Segment]>,
    params: Params,
    proto_host: Option<String>,
    rendered: OnceLock<String>,
}

impl Uri {
    /// Parse a plain path or absolute URI. Components are decoded but never
    /// interpreted as templates.
    pub fn parse(input: &str) -> Result<Self, RouterError> {
        Self::parse_with(input, false)
    }

    /// Parse a path or absolute URI as a pattern.
    pub fn parse_pattern(input: &str) -> Result<Self, RouterError> {
        Self::parse_with(input, true)
    }

    fn parse_with(input: &str, as_pattern: bool) -> Result<Self, RouterError> {
        let (proto_host, path) = split_proto_host(input)?;
        let segments = if as_pattern {
            parse_pattern(path)?
        } else if path.is_empty() {
            Vec::new()
        } else {
            split_path(path).into_iter().map(Segment::Literal).collect()
        };
        Ok(Self {
            path: segments.into(),
            params: Params::new(),
            proto_host,
            rendered: OnceLock::new(),
        })
    }

    /// Build from segments that are already correctly typed.
    pub fn from_segments(segments: impl Into<Vec<Segment>>) -> Self {
        let segments: Vec<Segment> = segments.into();
        Self {
            path: segments.into(),
            params: Params::new(),
            proto_host: None,
            rendered: OnceLock::new(),
        }
    }

    /// Copy `other`, sharing its segments but starting from `params`.
    pub fn from_uri(other: &Uri, params: Params) -> Self {
        Self {
            path: Arc::clone(&other.path),
            params,
            proto_host: other.proto_host.clone(),
            rendered: OnceLock::new(),
        }
    }

    /// Replace the bound parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self.rendered = OnceLock::new();
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.path
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Mutable access to the bound parameters. Drops the cached rendering.
    pub fn params_mut(&mut self) -> &mut Params {
        self.rendered = OnceLock::new();
        &mut self.params
    }

    /// Scheme and authority (`https://example.org`), if parsed from an
    /// absolute URI.
    pub fn proto_host(&self) -> Option<&str> {
        self.proto_host.as_deref()
    }

    /// Bind values for the template segments named in `params`. Names that do
    /// not occur in the path are ignored.
    pub fn bind(&mut self, params: &Params) -> &mut Self {
        let mut changed = false;
        for segment in self.path.iter() {
            if let Segment::Param(param) = segment {
                if let Some(value) = params.get(&param.name) {
                    self.params.insert(param.name.clone(), value.clone());
                    changed = true;
                }
            }
        }
        if changed {
            self.rendered = OnceLock::new();
        }
        self
    }

    /// Append the segments of `suffix`. Its parameters are merged over ours.
    pub fn join(&self, suffix: &Uri) -> Uri {
        let path: Vec<Segment> = self.path.iter().chain(suffix.path.iter()).cloned().collect();
        let mut params = self.params.clone();
        params.extend(suffix.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            path: path.into(),
            params,
            proto_host: self.proto_host.clone(),
            rendered: OnceLock::new(),
        }
    }

    /// Produce a URI with every template replaced by a literal.
    ///
    /// Values come from `params` if given, else from the bound parameters,
    /// else from the segment's fixed value. An unresolved optional segment is
    /// dropped, an unresolved catch-all ends the path, and any other
    /// unresolved template is an error. Catch-all values are split on `/`.
    pub fn expand(&self, params: Option<&Params>) -> Result<Uri, RouterError> {
        let params = params.unwrap_or(&self.params);
        let mut path = Vec::with_capacity(self.path.len());

        for segment in self.path.iter() {
            let Segment::Param(param) = segment else {
                path.push(segment.clone());
                continue;
            };
            match (resolve(param, params), param.modifier) {
                (Some(value), Some(Modifier::CatchAll)) => path.extend(
                    value
                        .split('/')
                        .map(|piece| Segment::Reserved(piece.to_string())),
                ),
                (Some(value), _) => path.push(Segment::Literal(value)),
                (None, None) => return Err(RouterError::MissingParameter(param.name.clone())),
                (None, Some(Modifier::Optional)) => {}
                (None, Some(Modifier::CatchAll)) => break,
            }
        }

        Ok(Self {
            path: path.into(),
            params: Params::new(),
            proto_host: self.proto_host.clone(),
            rendered: OnceLock::new(),
        })
    }

    /// Serialize to a string.
    pub fn render(&self, options: &RenderOptions<'_>) -> String {
        match options.params {
            None if options.format == Format::Expanded => self
                .rendered
                .get_or_init(|| self.render_with(Format::Expanded, &self.params))
                .clone(),
            params => self.render_with(options.format, params.unwrap_or(&self.params)),
        }
    }

    fn render_with(&self, format: Format, params: &Params) -> String {
        let mut out = self.proto_host.clone().unwrap_or_default();

        for segment in self.path.iter() {
            let param = match segment {
                Segment::Literal(s) => {
                    out.push('/');
                    out.push_str(&encode_component(s));
                    continue;
                }
                Segment::Reserved(s) => {
                    out.push('/');
                    out.push_str(&encode_reserved(s));
                    continue;
                }
                Segment::Meta(_) => continue,
                Segment::Param(param) => param,
            };

            match (resolve(param, params), format) {
                (Some(value), Format::FullPattern) => {
                    push_template(&mut out, param, Some(&value));
                }
                (Some(value), _) => {
                    out.push('/');
                    if param.is_catch_all() {
                        out.push_str(&encode_reserved(&value));
                    } else {
                        out.push_str(&encode_component(&value));
                    }
                }
                (None, Format::Expanded) => {
                    // Mark where a catch-all would continue.
                    if param.is_catch_all() {
                        out.push('/');
                    }
                    return out;
                }
                (None, _) => push_template(&mut out, param, None),
            }
        }

        out
    }

    /// Whether the leading segments of this URI are compatible with `prefix`.
    ///
    /// Templates in `prefix` are wildcards. Templates in this URI are
    /// wildcards unless pinned by a fixed value; literals must be equal.
    pub fn starts_with(&self, prefix: &Uri) -> bool {
        if self.path.len() < prefix.path.len() {
            return false;
        }
        self.path
            .iter()
            .zip(prefix.path.iter())
            .all(|(ours, theirs)| segments_compatible(ours, theirs))
    }

    /// [`Uri::starts_with`] for a plain path string. The empty string is a
    /// prefix of everything.
    pub fn starts_with_path(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return true;
        }
        let segments: Vec<Segment> = split_path(prefix).into_iter().map(Segment::Literal).collect();
        self.starts_with(&Uri::from_segments(segments))
    }
}

fn resolve(param: &Param, params: &Params) -> Option<String> {
    params
        .get(&param.name)
        .map(ParamValue::to_string)
        .or_else(|| param.fixed.clone())
}

fn push_template(out: &mut String, param: &Param, value: Option<&str>) {
    match param.modifier {
        None => out.push_str("/{"),
        Some(modifier) => {
            out.push('{');
            out.push(modifier.symbol());
        }
    }
    out.push_str(&encode_component(&param.name));
    if let Some(value) = value {
        out.push(':');
        out.push_str(&encode_component(value));
    }
    out.push('}');
}

/// Only our own fixed values pin a segment; any template in the prefix
/// accepts whatever it is compared with.
fn segments_compatible(ours: &Segment, theirs: &Segment) -> bool {
    match (ours, theirs) {
        (_, Segment::Param(_)) => true,
        (Segment::Param(p), other) => match (&p.fixed, other.as_literal()) {
            (Some(fixed), Some(literal)) => fixed == literal,
            _ => true,
        },
        (a, b) => a.as_literal() == b.as_literal(),
    }
}

/// Split `scheme://authority` off an absolute URI. Paths starting with `/` or
/// `{` are returned unchanged.
fn split_proto_host(input: &str) -> Result<(Option<String>, &str), RouterError> {
    if !has_scheme(input) {
        return Ok((None, input));
    }

    let url = Url::parse(input)
        .map_err(|e| RouterError::InvalidPath(format!("{input}: {e}")))?;
    let after_scheme = &input[url.scheme().len() + 1..];
    let authority = after_scheme
        .strip_prefix("//")
        .ok_or_else(|| RouterError::InvalidPath(format!("{input}: missing authority")))?;
    // Take the path from the input text; the parsed URL re-encodes braces.
    let path = authority
        .find(['/', '?', '#'])
        .map_or("", |i| &authority[i..]);
    if path.contains(['?', '#']) {
        return Err(RouterError::InvalidPath(format!(
            "{input}: query and fragment are not supported"
        )));
    }

    Ok((Some(url[..Position::BeforePath].to_string()), path))
}

fn has_scheme(input: &str) -> bool {
    match input.split_once(':') {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&RenderOptions::default()))
    }
}

impl FromStr for Uri {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Vec<Segment>> for Uri {
    fn from(segments: Vec<Segment>) -> Self {
        Self::from_segments(segments)
    }
}

impl Serialize for Uri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
