//! Content negotiation with profile-qualified media types.
//!
//! Selection pairs every acceptable media range with every producible media
//! type, merges each compatible pair into a [`Candidate`] and ranks the
//! candidates:
//!
//! 1. specificity of the client's request, highest first
//! 2. client quality `q`, highest first
//! 3. server quality `qs`, highest first
//! 4. order of the acceptable list, then of the producible list
//!
//! The first concrete candidate wins. A wildcard that can only be satisfied by
//! an arbitrary byte stream falls back to `application/octet-stream`.
//!
//! # Examples
//!
//! ```
//! use halcyon_core::negotiation::select;
//! use halcyon_core::MediaType;
//!
//! let producible = vec![
//!     MediaType::parse("application/hal+json;profile=v1;qs=0.2").unwrap(),
//!     MediaType::parse("application/hal+json;profile=v2;qs=0.7").unwrap(),
//!     MediaType::parse("application/x.orders-v2+json;qs=0.9").unwrap(),
//! ];
//!
//! let selected = select(&producible, &[MediaType::any()]).unwrap();
//! assert_eq!(selected, MediaType::new("application", "x.orders-v2+json"));
//!
//! let pinned = select(&producible, &[MediaType::hal_json_with_profile("v2")]).unwrap();
//! assert_eq!(pinned.profile(), Some("v2"));
//! ```

use crate::accept::Accept;
use crate::media_type::{MediaType, Specificity, WILDCARD, TYPE_APPLICATION};
use crate::{Error, Result};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::HeaderMap;
use std::cmp::Ordering;
use tracing::debug;

// ============================================================================
// Candidates
// ============================================================================

/// A compatible (acceptable, producible) pair merged into one media type.
///
/// Candidates only live for the duration of one negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    media_type: MediaType,
    specificity: u32,
    quality: f32,
    server_quality: f32,
    parameter_mismatch: bool,
}

impl Candidate {
    /// Merge an acceptable media range with a compatible producible media type.
    ///
    /// When both sides carry identity parameters, every client parameter the
    /// server lacks or declares with another value raises the client's
    /// specificity by one. The more specific side becomes the merged media
    /// type; on a tie the server's declaration is kept so its extra
    /// parameters survive.
    pub fn merge(acceptable: &MediaType, producible: &MediaType) -> Self {
        let server_specificity = u32::from(producible.specificity().level());
        let mut client_specificity = u32::from(acceptable.specificity().level());
        let mut parameter_mismatch = false;

        if client_specificity == u32::from(Specificity::ConcreteWithParameters.level())
            && server_specificity == u32::from(Specificity::ConcreteWithParameters.level())
        {
            for (key, value) in acceptable.parameters() {
                if producible.param(key) != Some(value) {
                    client_specificity = client_specificity.saturating_add(1);
                    parameter_mismatch = true;
                }
            }
        }

        let merged = if client_specificity > server_specificity {
            acceptable
        } else {
            producible
        };

        Self {
            media_type: merged.without_quality_parameters(),
            specificity: client_specificity,
            quality: acceptable.quality(),
            server_quality: producible.server_quality(),
            parameter_mismatch,
        }
    }

    /// The merged media type, without `q` and `qs`.
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    /// Effective specificity of the client's request for this pair.
    pub fn specificity(&self) -> u32 {
        self.specificity
    }

    /// Client quality taken from the acceptable side.
    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// Server quality taken from the producible side.
    pub fn server_quality(&self) -> f32 {
        self.server_quality
    }

    /// The client asked for identity parameters the server does not declare.
    ///
    /// Such a candidate describes a representation the server never offered
    /// and is never selected.
    pub fn has_parameter_mismatch(&self) -> bool {
        self.parameter_mismatch
    }

    /// The merged media type annotated with its `q` and `qs` weights.
    pub fn weighted_media_type(&self) -> MediaType {
        self.media_type
            .clone()
            .with_quality_parameters(self.quality, self.server_quality)
    }

    fn rank(&self, other: &Self) -> Ordering {
        other
            .specificity
            .cmp(&self.specificity)
            .then_with(|| other.quality.total_cmp(&self.quality))
            .then_with(|| other.server_quality.total_cmp(&self.server_quality))
    }
}

/// Merge every compatible pair and rank the result.
///
/// Acceptable entries form the outer loop and producible entries the inner
/// loop; the sort is stable so that order breaks remaining ties.
pub fn candidates(producible: &[MediaType], acceptable: &[MediaType]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = acceptable
        .iter()
        .flat_map(|a| {
            producible
                .iter()
                .filter(move |p| a.is_compatible(p))
                .map(move |p| Candidate::merge(a, p))
        })
        .collect();

    candidates.sort_by(Candidate::rank);
    candidates
}

// ============================================================================
// Selection
// ============================================================================

/// Select the single media type to respond with.
///
/// Returns [`Error::NotAcceptable`] when no producible media type satisfies
/// the client. The returned media type never carries `q` or `qs`.
pub fn select(producible: &[MediaType], acceptable: &[MediaType]) -> Result<MediaType> {
    select_with(producible, acceptable, true)
}

fn select_with(producible: &[MediaType], acceptable: &[MediaType], binary_fallback: bool) -> Result<MediaType> {
    let ranked = candidates(producible, acceptable);
    if ranked.is_empty() {
        debug!(
            producible = producible.len(),
            acceptable = acceptable.len(),
            "No compatible media type pair"
        );
        return Err(not_acceptable(producible, acceptable));
    }

    for candidate in &ranked {
        if candidate.has_parameter_mismatch() {
            continue;
        }

        let media_type = candidate.media_type();
        if media_type.is_concrete() {
            debug!(
                selected = %media_type,
                candidates = ranked.len(),
                "Selected media type"
            );
            return Ok(media_type.clone());
        }

        if binary_fallback
            && media_type.is_wildcard_subtype()
            && (media_type.type_() == WILDCARD || media_type.type_() == TYPE_APPLICATION)
        {
            debug!(matched = %media_type, "Falling back to application/octet-stream");
            return Ok(MediaType::octet_stream());
        }
    }

    debug!(
        candidates = ranked.len(),
        "No concrete media type among compatible candidates"
    );
    Err(not_acceptable(producible, acceptable))
}

fn not_acceptable(producible: &[MediaType], acceptable: &[MediaType]) -> Error {
    let join = |list: &[MediaType]| {
        list.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    Error::NotAcceptable(format!(
        "none of [{}] can be produced; available: [{}]",
        join(acceptable),
        join(producible)
    ))
}

// ============================================================================
// Negotiator
// ============================================================================

/// Knobs around the core selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationSettings {
    /// Let a plain `application/json` request match producible `+json` types.
    pub expand_json_suffix: bool,
    /// Answer `*/*` and `application/*` with `application/octet-stream` when
    /// nothing concrete matches.
    pub binary_fallback: bool,
}

impl Default for NegotiationSettings {
    fn default() -> Self {
        Self {
            expand_json_suffix: true,
            binary_fallback: true,
        }
    }
}

/// Request-facing negotiator.
///
/// # Example
///
/// ```
/// use halcyon_core::negotiation::Negotiator;
/// use halcyon_core::MediaType;
/// use http::header::{HeaderMap, HeaderValue, ACCEPT};
///
/// let producible = vec![
///     MediaType::hal_json_with_profile("https://example.com/orders/v1"),
///     MediaType::new("application", "x.orders-v1+json"),
/// ];
///
/// let mut headers = HeaderMap::new();
/// headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
///
/// let negotiation = Negotiator::new().negotiate_headers(&producible, &headers).unwrap();
/// assert_eq!(negotiation.media_type().subtype(), "x.orders-v1+json");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Negotiator {
    settings: NegotiationSettings,
}

impl Negotiator {
    /// Create a negotiator with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a negotiator with explicit settings.
    pub fn with_settings(settings: NegotiationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &NegotiationSettings {
        &self.settings
    }

    /// Select from raw media type lists, honoring the binary fallback setting.
    pub fn select(&self, producible: &[MediaType], acceptable: &[MediaType]) -> Result<MediaType> {
        select_with(producible, acceptable, self.settings.binary_fallback)
    }

    /// Negotiate against a parsed `Accept` header.
    pub fn negotiate(&self, producible: &[MediaType], accept: &Accept) -> Result<Negotiation> {
        let media_type = if self.settings.expand_json_suffix {
            let expanded = accept.expand_json_suffix(producible);
            self.select(producible, expanded.media_types())?
        } else {
            self.select(producible, accept.media_types())?
        };

        Ok(Negotiation { media_type })
    }

    /// Negotiate against the `Accept` headers of a request.
    pub fn negotiate_headers(&self, producible: &[MediaType], headers: &HeaderMap) -> Result<Negotiation> {
        let accept = Accept::from_headers(headers)?;
        self.negotiate(producible, &accept)
    }
}

/// Outcome of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    media_type: MediaType,
}

impl Negotiation {
    /// The selected media type.
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn into_media_type(self) -> MediaType {
        self.media_type
    }

    /// Check whether the client will receive profile-qualified HAL.
    pub fn is_hal(&self) -> bool {
        MediaType::hal_json().is_compatible(&self.media_type)
    }

    /// The selected media type as a `Content-Type` header value.
    pub fn content_type(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&self.media_type.to_string())
            .map_err(|e| Error::InvalidMediaType(format!("{}: {}", self.media_type, e)))
    }

    /// Set the `Content-Type` of an outgoing response.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        headers.insert(CONTENT_TYPE, self.content_type()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::ACCEPT;

    fn mt(s: &str) -> MediaType {
        MediaType::parse(s).unwrap()
    }

    #[test]
    fn test_merge_prefers_server_on_tie() {
        let candidate = Candidate::merge(
            &mt("application/hal+json;profile=v2;q=0.4"),
            &mt("application/hal+json;profile=v2;charset=UTF-8;qs=0.7"),
        );
        assert_eq!(candidate.media_type(), &mt("application/hal+json;profile=v2;charset=UTF-8"));
        assert_eq!(candidate.specificity(), 3);
        assert_eq!(candidate.quality(), 0.4);
        assert_eq!(candidate.server_quality(), 0.7);
        assert!(!candidate.has_parameter_mismatch());
    }

    #[test]
    fn test_merge_counts_parameter_mismatches() {
        let candidate = Candidate::merge(
            &mt("application/hal+json;profile=v1;charset=UTF-8"),
            &mt("application/hal+json;profile=v2"),
        );
        assert_eq!(candidate.specificity(), 5);
        assert!(candidate.has_parameter_mismatch());
        assert_eq!(candidate.media_type().profile(), Some("v1"));
    }

    #[test]
    fn test_merge_wildcard_takes_server_side() {
        let candidate = Candidate::merge(&MediaType::any(), &mt("application/json;qs=0.3"));
        assert_eq!(candidate.media_type(), &MediaType::json());
        assert_eq!(candidate.specificity(), 0);
        assert_eq!(candidate.server_quality(), 0.3);
        assert_eq!(candidate.weighted_media_type().param("qs"), Some("0.3"));
    }

    #[test]
    fn test_merge_client_parameters_over_generic_server_type() {
        let candidate = Candidate::merge(&mt("application/hal+json;profile=v3"), &MediaType::hal_json());
        assert_eq!(candidate.media_type().profile(), Some("v3"));
        assert!(!candidate.has_parameter_mismatch());
    }

    #[test]
    fn test_candidates_are_ranked() {
        let ranked = candidates(
            &[mt("text/html"), mt("application/json")],
            &[mt("*/*;q=0.1"), mt("application/json;q=0.9")],
        );
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].media_type(), &MediaType::json());
        assert_eq!(ranked[0].specificity(), 2);
        assert_eq!(ranked[1].media_type(), &mt("text/html"));
    }

    #[test]
    fn test_octet_stream_fallback() {
        let selected = select(&[MediaType::new("application", "*")], &[MediaType::any()]).unwrap();
        assert_eq!(selected, MediaType::octet_stream());

        let strict = Negotiator::with_settings(NegotiationSettings {
            binary_fallback: false,
            ..Default::default()
        });
        assert!(matches!(
            strict.select(&[MediaType::new("application", "*")], &[MediaType::any()]),
            Err(Error::NotAcceptable(_))
        ));
    }

    #[test]
    fn test_non_binary_wildcard_is_not_acceptable() {
        let result = select(&[MediaType::new("text", "*")], &[MediaType::any()]);
        assert!(matches!(result, Err(Error::NotAcceptable(_))));
    }

    #[test]
    fn test_empty_inputs_are_not_acceptable() {
        assert!(select(&[], &[MediaType::any()]).is_err());
        assert!(select(&[MediaType::json()], &[]).is_err());
    }

    #[test]
    fn test_negotiation_sets_content_type() {
        let mut request = HeaderMap::new();
        request.insert(ACCEPT, HeaderValue::from_static("application/hal+json"));

        let negotiation = Negotiator::new()
            .negotiate_headers(&[mt("application/hal+json;profile=v2;qs=0.5")], &request)
            .unwrap();
        assert!(negotiation.is_hal());

        let mut response = HeaderMap::new();
        negotiation.apply(&mut response).unwrap();
        assert_eq!(response.get(CONTENT_TYPE).unwrap(), "application/hal+json;profile=v2");
    }

    #[test]
    fn test_json_suffix_expansion_can_be_disabled() {
        let producible = [mt("application/x.orders-v1+json")];
        let accept = Accept::parse("application/json").unwrap();

        assert!(Negotiator::new().negotiate(&producible, &accept).is_ok());

        let strict = Negotiator::with_settings(NegotiationSettings {
            expand_json_suffix: false,
            ..Default::default()
        });
        assert!(matches!(
            strict.negotiate(&producible, &accept),
            Err(Error::NotAcceptable(_))
        ));
    }
}
