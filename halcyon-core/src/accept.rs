//! `Accept` header handling.
//!
//! The parsed list keeps the order in which the client listed its media
//! ranges. Weighting by `q` happens during negotiation, so the header order is
//! what breaks ties between otherwise equal candidates.

use crate::media_type::{split_unquoted, MediaType};
use crate::{Error, Result};
use http::header::ACCEPT;
use http::HeaderMap;
use std::str::FromStr;

/// Represents a parsed `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct Accept {
    media_types: Vec<MediaType>,
}

impl Accept {
    /// Accept anything (`*/*`). This is what a missing header means.
    pub fn any() -> Self {
        Self {
            media_types: vec![MediaType::any()],
        }
    }

    /// Build from already parsed media ranges.
    pub fn new(media_types: Vec<MediaType>) -> Self {
        Self { media_types }
    }

    /// Parse an `Accept` header value.
    ///
    /// A blank header is treated as `*/*`. Any malformed media range rejects
    /// the whole header.
    ///
    /// # Example
    ///
    /// ```
    /// use halcyon_core::accept::Accept;
    ///
    /// let accept = Accept::parse(
    ///     "application/hal+json; profile=\"https://example.com/orders/v2\", application/json;q=0.5",
    /// )
    /// .unwrap();
    /// assert_eq!(accept.media_types().len(), 2);
    /// assert_eq!(accept.media_types()[1].quality(), 0.5);
    /// ```
    pub fn parse(header: &str) -> Result<Self> {
        if header.trim().is_empty() {
            return Ok(Self::any());
        }

        let ranges = split_unquoted(header, ',')
            .map_err(|reason| Error::InvalidMediaType(format!("{:?}: {}", header, reason)))?;

        let media_types = ranges
            .into_iter()
            .map(str::trim)
            .filter(|range| !range.is_empty())
            .map(MediaType::parse)
            .collect::<Result<Vec<_>>>()?;

        if media_types.is_empty() {
            return Ok(Self::any());
        }

        Ok(Self { media_types })
    }

    /// Parse every `Accept` header present in a header map.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let mut values = Vec::new();
        for value in headers.get_all(ACCEPT) {
            let value = value
                .to_str()
                .map_err(|_| Error::InvalidMediaType("Accept header is not visible ASCII".to_string()))?;
            values.push(value);
        }

        Self::parse(&values.join(","))
    }

    /// The media ranges in header order.
    pub fn media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    /// Consume into the media ranges.
    pub fn into_media_types(self) -> Vec<MediaType> {
        self.media_types
    }

    /// Check if the client accepts anything and nothing else.
    pub fn is_any(&self) -> bool {
        self.media_types.len() == 1 && self.media_types[0].is_any()
    }

    /// Treat plain `application/json` as covering the `+json` types the
    /// server can produce.
    ///
    /// Every producible `+json` media type without identity parameters that
    /// the client did not already list is appended, carrying the `q` of the
    /// plain JSON entry when that is below 1.0. Parameterized types such as
    /// profile-qualified HAL are more specific than plain JSON and are left
    /// out.
    pub fn expand_json_suffix(&self, producible: &[MediaType]) -> Self {
        let plain_json = MediaType::json();
        let Some(json_entry) = self.media_types.iter().find(|mt| **mt == plain_json) else {
            return self.clone();
        };
        let quality = json_entry.quality();

        let mut media_types = self.media_types.clone();
        for custom in producible
            .iter()
            .filter(|mt| mt.is_json_suffixed() && !mt.has_parameters())
            .map(MediaType::without_quality_parameters)
        {
            if media_types.contains(&custom) {
                continue;
            }
            let custom = if quality < 1.0 {
                custom.with_quality(quality)
            } else {
                custom
            };
            media_types.push(custom);
        }

        Self { media_types }
    }
}

impl Default for Accept {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for Accept {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Vec<MediaType>> for Accept {
    fn from(media_types: Vec<MediaType>) -> Self {
        Self::new(media_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_accept_parse_keeps_header_order() {
        let accept = Accept::parse("text/html;q=0.5, application/json, */*;q=0.1").unwrap();
        let essences: Vec<String> = accept.media_types().iter().map(MediaType::essence).collect();
        assert_eq!(essences, vec!["text/html", "application/json", "*/*"]);
    }

    #[test]
    fn test_accept_parse_quoted_comma() {
        let accept = Accept::parse(r#"application/hal+json;profile="urn:a,b", text/plain"#).unwrap();
        assert_eq!(accept.media_types().len(), 2);
        assert_eq!(accept.media_types()[0].profile(), Some("urn:a,b"));
    }

    #[test]
    fn test_blank_accept_is_any() {
        assert!(Accept::parse("").unwrap().is_any());
        assert!(Accept::parse(" , ").unwrap().is_any());
        assert!(Accept::default().is_any());
    }

    #[test]
    fn test_malformed_range_rejects_header() {
        assert!(matches!(
            Accept::parse("application/json, nonsense"),
            Err(Error::InvalidMediaType(_))
        ));
    }

    #[test]
    fn test_from_headers_joins_values() {
        let mut headers = HeaderMap::new();
        headers.append(ACCEPT, HeaderValue::from_static("application/json"));
        headers.append(ACCEPT, HeaderValue::from_static("text/plain;q=0.2"));

        let accept = Accept::from_headers(&headers).unwrap();
        assert_eq!(accept.media_types().len(), 2);

        let empty = Accept::from_headers(&HeaderMap::new()).unwrap();
        assert!(empty.is_any());
    }

    #[test]
    fn test_expand_json_suffix() {
        let producible = vec![
            MediaType::parse("application/hal+json;profile=v2;qs=0.7").unwrap(),
            MediaType::parse("application/x.orders-v2+json;qs=0.9").unwrap(),
            MediaType::parse("application/xml").unwrap(),
        ];

        let accept = Accept::parse("application/json;q=0.8").unwrap();
        let expanded = accept.expand_json_suffix(&producible);

        assert_eq!(expanded.media_types().len(), 2);
        let custom = &expanded.media_types()[1];
        assert_eq!(custom.essence(), "application/x.orders-v2+json");
        assert_eq!(custom.quality(), 0.8);
        assert_eq!(custom.param("qs"), None);
    }

    #[test]
    fn test_expand_json_suffix_skips_listed_and_non_json_requests() {
        let producible = vec![MediaType::new("application", "x.orders-v2+json")];

        let listed = Accept::parse("application/json, application/x.orders-v2+json").unwrap();
        assert_eq!(listed.expand_json_suffix(&producible), listed);

        let unrelated = Accept::parse("text/html").unwrap();
        assert_eq!(unrelated.expand_json_suffix(&producible), unrelated);
    }
}
