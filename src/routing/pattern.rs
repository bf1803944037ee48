//! Path pattern compilation, matching and destination expansion.
//!
//! # Syntax
//! - `/blog` literal segment (case-sensitive)
//! - `/:slug` named parameter, exactly one non-empty segment
//! - `/:slug*` named wildcard, one or more trailing segments
//! - `/:slug?` optional parameter, zero or one trailing segment
//! - `/:post(\d+)` named parameter constrained by a regex
//!
//! Wildcard, optional and regex parameters must be the final segment.

use std::borrow::Cow;
use std::fmt;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use url::form_urlencoded;

/// Errors raised while compiling a source or destination pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern `{0}` must start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern `{0}` contains an empty segment")]
    EmptySegment(String),

    #[error("pattern `{pattern}`: invalid parameter name in segment `{segment}`")]
    InvalidParamName { pattern: String, segment: String },

    #[error("pattern `{pattern}`: parameter `{name}` is declared more than once")]
    DuplicateParam { pattern: String, name: String },

    #[error("pattern `{pattern}`: segment `{segment}` must be the final segment")]
    NotFinalSegment { pattern: String, segment: String },

    #[error("pattern `{0}` has unbalanced parentheses")]
    UnbalancedGroup(String),

    #[error("pattern `{pattern}`: unexpected `{rest}` after parameter `{name}`")]
    TrailingCharacters {
        pattern: String,
        name: String,
        rest: String,
    },

    #[error("pattern `{pattern}`: invalid regex for `{name}`: {message}")]
    InvalidRegex {
        pattern: String,
        name: String,
        message: String,
    },

    #[error("destination `{0}` is not a valid absolute URL")]
    InvalidUrl(String),
}

/// One compiled segment of a source pattern.
#[derive(Debug, Clone)]
pub enum PatternSegment {
    Literal(String),
    Param(String),
    Optional(String),
    Wildcard(String),
    Regex { name: String, regex: Regex },
}

impl PatternSegment {
    fn param_name(&self) -> Option<&str> {
        match self {
            PatternSegment::Literal(_) => None,
            PatternSegment::Param(name)
            | PatternSegment::Optional(name)
            | PatternSegment::Wildcard(name)
            | PatternSegment::Regex { name, .. } => Some(name),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            PatternSegment::Optional(_) | PatternSegment::Wildcard(_) | PatternSegment::Regex { .. }
        )
    }
}

/// A value captured by a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    /// Render the value as a path fragment; wildcard captures are joined with `/`.
    pub fn joined(&self) -> String {
        match self {
            ParamValue::Single(value) => value.clone(),
            ParamValue::Multi(values) => values.join("/"),
        }
    }

    /// Like [`joined`](Self::joined), with every segment percent-encoded
    /// for use inside a path.
    pub fn encoded(&self) -> String {
        match self {
            ParamValue::Single(value) => urlencoding::encode(value).into_owned(),
            ParamValue::Multi(values) => values
                .iter()
                .map(|v| urlencoding::encode(v))
                .collect::<Vec<_>>()
                .join("/"),
        }
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::Multi(values)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Captured parameters, in the order they appear in the source pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A compiled source pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    raw: String,
    segments: Vec<PatternSegment>,
}

impl CompiledPattern {
    /// Compile a source pattern such as `/blog/:slug*`.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let raw_segments = split_segments(pattern)?;
        let mut segments = Vec::with_capacity(raw_segments.len());
        let mut names: Vec<String> = Vec::new();

        for (i, raw) in raw_segments.iter().enumerate() {
            let segment = parse_segment(pattern, raw, true)?;
            if segment.is_terminal() && i + 1 != raw_segments.len() {
                return Err(PatternError::NotFinalSegment {
                    pattern: pattern.to_string(),
                    segment: raw.to_string(),
                });
            }
            if let Some(name) = segment.param_name() {
                if names.iter().any(|n| n == name) {
                    return Err(PatternError::DuplicateParam {
                        pattern: pattern.to_string(),
                        name: name.to_string(),
                    });
                }
                names.push(name.to_string());
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// Names of every parameter this pattern captures.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(PatternSegment::param_name)
    }

    /// Match a request path (any query string is ignored).
    ///
    /// Captured values are percent-decoded.
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let (path, _) = split_query(path);
        let path = path.strip_prefix('/')?;
        let path = path.strip_suffix('/').unwrap_or(path);
        let request: Vec<Cow<'_, str>> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').map(decode_segment).collect()
        };

        let mut params = Params::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PatternSegment::Literal(literal) => {
                    if !request.get(i).is_some_and(|s| s == literal) {
                        return None;
                    }
                }
                PatternSegment::Param(name) => {
                    let value = request.get(i).filter(|s| !s.is_empty())?;
                    params.insert(name.as_str(), value.to_string());
                }
                PatternSegment::Regex { name, regex } => {
                    let value = request.get(i).filter(|s| regex.is_match(s))?;
                    params.insert(name.as_str(), value.to_string());
                }
                PatternSegment::Wildcard(name) => {
                    let rest = request.get(i..).unwrap_or_default();
                    if rest.is_empty() || rest.iter().any(|s| s.is_empty()) {
                        return None;
                    }
                    let values: Vec<String> = rest.iter().map(|s| s.to_string()).collect();
                    params.insert(name.as_str(), values);
                    return Some(params);
                }
                PatternSegment::Optional(name) => {
                    return match request.get(i..).unwrap_or_default() {
                        [] => Some(params),
                        [value] if !value.is_empty() => {
                            params.insert(name.as_str(), value.to_string());
                            Some(params)
                        }
                        _ => None,
                    };
                }
            }
        }

        (request.len() == self.segments.len()).then_some(params)
    }
}

impl fmt::Display for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Path part of a destination: literals and parameter references.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DestinationSegment {
    Literal(String),
    Param(String),
}

/// A compiled rewrite or redirect destination.
#[derive(Debug, Clone)]
pub struct Destination {
    raw: String,
    origin: Option<String>,
    segments: Vec<DestinationSegment>,
    query: Vec<(String, String)>,
}

impl Destination {
    /// Parse a destination such as `/news/:slug`, `/search?q=:term` or
    /// `https://example.com/blog/:slug*`.
    pub fn parse(destination: &str) -> Result<Self, PatternError> {
        let (origin, rest) = match destination.find("://") {
            Some(scheme_end) => {
                let authority_start = scheme_end + 3;
                let split = destination[authority_start..]
                    .find(['/', '?'])
                    .map(|i| authority_start + i)
                    .unwrap_or(destination.len());
                let origin = &destination[..split];
                url::Url::parse(origin)
                    .map_err(|_| PatternError::InvalidUrl(destination.to_string()))?;
                let rest = &destination[split..];
                (Some(origin.to_string()), rest)
            }
            None => (None, destination),
        };

        let (path, query) = split_query(rest);
        let path = if path.is_empty() && origin.is_some() { "/" } else { path };

        let mut segments = Vec::new();
        for raw in split_segments(path)? {
            let segment = match parse_segment(destination, raw, false)? {
                PatternSegment::Literal(literal) => DestinationSegment::Literal(literal),
                other => match other.param_name() {
                    Some(name) => DestinationSegment::Param(name.to_string()),
                    None => DestinationSegment::Literal(raw.to_string()),
                },
            };
            segments.push(segment);
        }

        let query = query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Ok(Self {
            raw: destination.to_string(),
            origin,
            segments,
            query,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the destination points at another origin.
    pub fn is_external(&self) -> bool {
        self.origin.is_some()
    }

    /// Parameters referenced in the path or as whole query values.
    pub fn referenced_params(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .segments
            .iter()
            .filter_map(|s| match s {
                DestinationSegment::Param(name) => Some(name.as_str()),
                DestinationSegment::Literal(_) => None,
            })
            .collect();
        names.extend(self.query.iter().filter_map(|(_, v)| param_reference(v)));
        names
    }

    /// Substitute `params` into the destination.
    pub fn expand(&self, params: &Params) -> String {
        self.expand_with_query(params, None)
    }

    /// Substitute `params` and merge the incoming request query string.
    ///
    /// Parameters the destination does not reference are appended to the
    /// query, after the destination's own pairs and before `request_query`.
    pub fn expand_with_query(&self, params: &Params, request_query: Option<&str>) -> String {
        let mut out = self.origin.clone().unwrap_or_default();
        let path_start = out.len();

        for segment in &self.segments {
            match segment {
                DestinationSegment::Literal(literal) => {
                    out.push('/');
                    out.push_str(literal);
                }
                DestinationSegment::Param(name) => {
                    if let Some(value) = params.get(name) {
                        out.push('/');
                        out.push_str(&value.encoded());
                    }
                }
            }
        }
        if out.len() == path_start {
            out.push('/');
        }

        let referenced = self.referenced_params();
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.query {
            let value = match param_reference(value) {
                Some(name) => params.get(name).map(ParamValue::joined).unwrap_or_default(),
                None => value.clone(),
            };
            query.append_pair(key, &value);
        }
        for (name, value) in params.iter() {
            if !referenced.contains(&name) {
                query.append_pair(name, &value.joined());
            }
        }
        if let Some(request_query) = request_query {
            query.extend_pairs(form_urlencoded::parse(request_query.as_bytes()));
        }

        let query = query.finish();
        if !query.is_empty() {
            out.push('?');
            out.push_str(&query);
        }
        out
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split `path?query` into its two halves.
pub fn split_query(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    }
}

/// Percent-decode one path segment; invalid UTF-8 is kept verbatim.
fn decode_segment(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Returns the parameter name when `value` is exactly `:name`.
fn param_reference(value: &str) -> Option<&str> {
    value
        .strip_prefix(':')
        .filter(|name| is_valid_name(name))
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a pattern on `/`, ignoring slashes nested inside a regex group.
fn split_segments(pattern: &str) -> Result<Vec<&str>, PatternError> {
    let body = pattern
        .strip_prefix('/')
        .ok_or_else(|| PatternError::MissingLeadingSlash(pattern.to_string()))?;
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let body = body.strip_suffix('/').unwrap_or(body);

    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| PatternError::UnbalancedGroup(pattern.to_string()))?;
            }
            '/' if depth == 0 => {
                segments.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(PatternError::UnbalancedGroup(pattern.to_string()));
    }
    segments.push(&body[start..]);

    if segments.iter().any(|s| s.is_empty()) {
        return Err(PatternError::EmptySegment(pattern.to_string()));
    }
    Ok(segments)
}

fn parse_segment(pattern: &str, raw: &str, allow_regex: bool) -> Result<PatternSegment, PatternError> {
    let Some(body) = raw.strip_prefix(':') else {
        return Ok(PatternSegment::Literal(raw.to_string()));
    };

    let name_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(body.len());
    let (name, rest) = body.split_at(name_len);
    if name.is_empty() {
        return Err(PatternError::InvalidParamName {
            pattern: pattern.to_string(),
            segment: raw.to_string(),
        });
    }
    let name = name.to_string();

    match rest {
        "" => Ok(PatternSegment::Param(name)),
        "*" => Ok(PatternSegment::Wildcard(name)),
        "?" => Ok(PatternSegment::Optional(name)),
        group if allow_regex && group.starts_with('(') && group.ends_with(')') => {
            let expr = &group[1..group.len() - 1];
            let regex = Regex::new(&format!("^(?:{expr})$")).map_err(|e| PatternError::InvalidRegex {
                pattern: pattern.to_string(),
                name: name.clone(),
                message: e.to_string(),
            })?;
            Ok(PatternSegment::Regex { name, regex })
        }
        rest => Err(PatternError::TrailingCharacters {
            pattern: pattern.to_string(),
            name,
            rest: rest.to_string(),
        }),
    }
}
