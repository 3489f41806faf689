//! Media types with profile-aware parameters.
//!
//! A [`MediaType`] is an immutable `type/subtype` pair plus parameters. Two
//! parameters are reserved for negotiation weights and never take part in a
//! representation's identity:
//!
//! - `q` - the client's preference, from the `Accept` header
//! - `qs` - the server's preference among the formats it can produce
//!
//! Every other parameter, most notably `profile`, makes a media type more
//! specific.
//!
//! # Examples
//!
//! ```
//! use halcyon_core::media_type::{MediaType, Specificity};
//!
//! let v2: MediaType = "application/hal+json; profile=\"https://example.com/orders/v2\"; qs=0.7"
//!     .parse()
//!     .unwrap();
//!
//! assert_eq!(v2.profile(), Some("https://example.com/orders/v2"));
//! assert_eq!(v2.server_quality(), 0.7);
//! assert_eq!(v2.specificity(), Specificity::ConcreteWithParameters);
//! assert_eq!(v2, v2.without_quality_parameters());
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The wildcard used for both type and subtype.
pub const WILDCARD: &str = "*";

/// Client-side quality parameter.
pub const PARAM_QUALITY_CLIENT: &str = "q";

/// Server-side quality parameter.
pub const PARAM_QUALITY_SERVER: &str = "qs";

/// Parameter naming a hypermedia representation version.
pub const PARAM_PROFILE: &str = "profile";

/// Structured syntax suffix for JSON based media types.
pub const JSON_SUFFIX: &str = "+json";

pub const TYPE_APPLICATION: &str = "application";

/// Quality assumed when `q` or `qs` is absent.
pub const DEFAULT_QUALITY: f32 = 1.0;

type Params = SmallVec<[(String, String); 2]>;

// ============================================================================
// Specificity
// ============================================================================

/// How precisely a media type identifies a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Specificity {
    /// `*/*`
    WildcardType = 0,
    /// `application/*`
    WildcardSubtype = 1,
    /// `application/json`
    Concrete = 2,
    /// `application/hal+json;profile="https://example.com/orders/v2"`
    ConcreteWithParameters = 3,
}

impl Specificity {
    /// Numeric level, higher is more specific.
    #[inline]
    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Check whether a parameter name is one of the negotiation weights.
#[inline]
pub fn is_reserved_parameter(name: &str) -> bool {
    name.eq_ignore_ascii_case(PARAM_QUALITY_CLIENT) || name.eq_ignore_ascii_case(PARAM_QUALITY_SERVER)
}

// ============================================================================
// Media Type
// ============================================================================

/// A media type (MIME type) with optional parameters.
///
/// Type, subtype and parameter names are stored lower-cased. Parameter values
/// are kept verbatim and compared case-sensitively.
#[derive(Debug, Clone)]
pub struct MediaType {
    type_: String,
    subtype: String,
    params: Params,
}

impl MediaType {
    /// Create a new media type without parameters.
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into().to_ascii_lowercase(),
            subtype: subtype.into().to_ascii_lowercase(),
            params: Params::new(),
        }
    }

    /// Return a copy with the parameter set, replacing any existing value.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    /// Create `*/*`.
    pub fn any() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    /// Create `application/json`.
    pub fn json() -> Self {
        Self::new(TYPE_APPLICATION, "json")
    }

    /// Create `application/hal+json`.
    pub fn hal_json() -> Self {
        Self::new(TYPE_APPLICATION, "hal+json")
    }

    /// Create `application/hal+json` qualified with a profile.
    pub fn hal_json_with_profile(profile: impl Into<String>) -> Self {
        Self::hal_json().with_param(PARAM_PROFILE, profile)
    }

    /// Create `application/octet-stream`.
    pub fn octet_stream() -> Self {
        Self::new(TYPE_APPLICATION, "octet-stream")
    }

    /// Parse a media type such as `application/hal+json; profile="..."; q=0.8`.
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    /// The top-level type, possibly `*`.
    pub fn type_(&self) -> &str {
        &self.type_
    }

    /// The subtype, possibly `*`.
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }

    /// Look up a parameter by case-insensitive name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All parameters, including `q` and `qs`, in declaration order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parameters that are part of the representation's identity.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params().filter(|(k, _)| !is_reserved_parameter(k))
    }

    /// Whether any non-reserved parameter is present.
    pub fn has_parameters(&self) -> bool {
        self.parameters().next().is_some()
    }

    /// The `profile` parameter, if present.
    pub fn profile(&self) -> Option<&str> {
        self.param(PARAM_PROFILE)
    }

    /// Check if the type is a wildcard (`*/...`).
    pub fn is_wildcard_type(&self) -> bool {
        self.type_ == WILDCARD
    }

    /// Check if the subtype is a wildcard (`.../*`).
    pub fn is_wildcard_subtype(&self) -> bool {
        self.subtype == WILDCARD
    }

    /// Check if this is `*/*`.
    pub fn is_any(&self) -> bool {
        self.is_wildcard_type() && self.is_wildcard_subtype()
    }

    /// Neither type nor subtype is a wildcard.
    pub fn is_concrete(&self) -> bool {
        !self.is_wildcard_type() && !self.is_wildcard_subtype()
    }

    /// Type and subtype match, or either side is a wildcard at that position.
    /// Parameters are not considered.
    pub fn is_compatible(&self, other: &MediaType) -> bool {
        let type_matches = self.is_wildcard_type() || other.is_wildcard_type() || self.type_ == other.type_;
        let subtype_matches =
            self.is_wildcard_subtype() || other.is_wildcard_subtype() || self.subtype == other.subtype;
        type_matches && subtype_matches
    }

    /// How precisely this media type identifies a representation.
    pub fn specificity(&self) -> Specificity {
        if self.is_wildcard_type() {
            Specificity::WildcardType
        } else if self.is_wildcard_subtype() {
            Specificity::WildcardSubtype
        } else if self.has_parameters() {
            Specificity::ConcreteWithParameters
        } else {
            Specificity::Concrete
        }
    }

    /// Check for a structured syntax suffix such as `+json`.
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.subtype.len() > suffix.len() && self.subtype.ends_with(suffix)
    }

    /// Check for the `+json` structured syntax suffix.
    pub fn is_json_suffixed(&self) -> bool {
        self.has_suffix(JSON_SUFFIX)
    }

    /// Client preference (`q`), defaulting to 1.0.
    pub fn quality(&self) -> f32 {
        self.weight(PARAM_QUALITY_CLIENT)
    }

    /// Server preference (`qs`), defaulting to 1.0.
    pub fn server_quality(&self) -> f32 {
        self.weight(PARAM_QUALITY_SERVER)
    }

    fn weight(&self, name: &str) -> f32 {
        self.param(name)
            .and_then(parse_quality)
            .unwrap_or(DEFAULT_QUALITY)
    }

    /// Return a copy carrying the given `q`.
    pub fn with_quality(self, q: f32) -> Self {
        self.with_param(PARAM_QUALITY_CLIENT, format_quality(q))
    }

    /// Return a copy carrying the given `qs`.
    pub fn with_server_quality(self, qs: f32) -> Self {
        self.with_param(PARAM_QUALITY_SERVER, format_quality(qs))
    }

    /// Return a copy carrying both `q` and `qs`.
    pub fn with_quality_parameters(self, q: f32, qs: f32) -> Self {
        self.with_quality(q).with_server_quality(qs)
    }

    /// Return a copy without `q` and `qs`.
    pub fn without_quality_parameters(&self) -> Self {
        Self {
            type_: self.type_.clone(),
            subtype: self.subtype.clone(),
            params: self
                .params
                .iter()
                .filter(|(k, _)| !is_reserved_parameter(k))
                .cloned()
                .collect(),
        }
    }

    /// Strict comparison that also takes `q` and `qs` into account.
    pub fn identical(&self, other: &MediaType) -> bool {
        self.type_ == other.type_
            && self.subtype == other.subtype
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .all(|(k, v)| other.param(k) == Some(v.as_str()))
    }

    fn sorted_parameters(&self) -> SmallVec<[(&str, &str); 2]> {
        let mut params: SmallVec<[(&str, &str); 2]> = self.parameters().collect();
        params.sort_unstable();
        params
    }
}

impl PartialEq for MediaType {
    fn eq(&self, other: &Self) -> bool {
        self.type_ == other.type_
            && self.subtype == other.subtype
            && self.sorted_parameters() == other.sorted_parameters()
    }
}

impl Eq for MediaType {}

impl Hash for MediaType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_.hash(state);
        self.subtype.hash(state);
        self.sorted_parameters().hash(state);
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        for (key, value) in &self.params {
            if needs_quotes(value) {
                write!(f, ";{}=\"", key)?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, "\"")?;
            } else {
                write!(f, ";{}={}", key, value)?;
            }
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        if input.is_empty() {
            return Err(invalid(s, "empty media type"));
        }

        let segments = split_unquoted(input, ';').map_err(|reason| invalid(s, reason))?;
        let mut segments = segments.into_iter();
        let essence = segments
            .next()
            .ok_or_else(|| invalid(s, "empty media type"))?;

        let (type_, subtype) = essence
            .split_once('/')
            .ok_or_else(|| invalid(s, "missing '/' between type and subtype"))?;
        let (type_, subtype) = (type_.trim(), subtype.trim());

        if !is_token(type_) || !is_token(subtype) {
            return Err(invalid(s, "type and subtype must be non-empty tokens"));
        }
        if type_ == WILDCARD && subtype != WILDCARD {
            return Err(invalid(s, "a wildcard type requires a wildcard subtype"));
        }

        let mut media_type = MediaType::new(type_, subtype);
        for segment in segments {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| invalid(s, "parameter without '='"))?;
            let key = key.trim();
            if !is_token(key) {
                return Err(invalid(s, "parameter name must be a non-empty token"));
            }

            let value = unquote(value.trim()).ok_or_else(|| invalid(s, "malformed parameter value"))?;
            if is_reserved_parameter(key) && parse_quality(&value).is_none() {
                return Err(invalid(s, "quality must be a number between 0 and 1"));
            }

            media_type = media_type.with_param(key, value);
        }

        Ok(media_type)
    }
}

impl Serialize for MediaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

fn invalid(input: &str, reason: &str) -> Error {
    Error::InvalidMediaType(format!("{:?}: {}", input, reason))
}

/// RFC 9110 `tchar`.
fn is_tchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_tchar)
}

fn needs_quotes(value: &str) -> bool {
    !is_token(value)
}

/// Split on `sep`, ignoring separators inside double-quoted strings.
pub(crate) fn split_unquoted(s: &str, sep: char) -> std::result::Result<Vec<&str>, &'static str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err("unterminated quoted string");
    }
    parts.push(&s[start..]);
    Ok(parts)
}

fn unquote(value: &str) -> Option<String> {
    if let Some(inner) = value.strip_prefix('"') {
        let inner = inner.strip_suffix('"')?;
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.push(chars.next()?),
                '"' => return None,
                c => out.push(c),
            }
        }
        return Some(out);
    }

    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '"') {
        return None;
    }
    Some(value.to_string())
}

fn parse_quality(value: &str) -> Option<f32> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|q| (0.0..=1.0).contains(q))
}

/// Format a weight with at most three decimals, as HTTP `qvalue` allows.
fn format_quality(q: f32) -> String {
    let q = if q.is_finite() { q.clamp(0.0, 1.0) } else { DEFAULT_QUALITY };
    let formatted = format!("{:.3}", q);
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}
