use memchr::memmem::Finder;
use regex::Regex;

use crate::error::{Error, ExtractionErrorKind, Result};
use crate::input::LineStore;

/// Substring marking a geolocation lookup result.
pub const DEFAULT_MARKER: &str = "GEO response";

/// How many lines before a GEO response its timestamp line sits.
pub const DEFAULT_TIMESTAMP_OFFSET: usize = 5;

/// Literal that precedes the two-character country code.
pub const COUNTRY_CODE_MARKER: &str = r#""CountryCode":""#;

static IPV4_PATTERN: &str = r"[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}";

/// One GEO response sighting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeoEvent {
    /// 0-based index of the GEO response line.
    pub line: usize,
    /// Dotted-quad address exactly as it appears in the line.
    pub ip: String,
    pub country: String,
    pub timestamp: String,
}

/// Scans a [`LineStore`] for GEO response lines.
#[derive(Clone, Debug)]
pub struct Extractor {
    marker: Finder<'static>,
    ipv4: Regex,
    country: Regex,
    timestamp_offset: usize,
}

impl Extractor {
    /// Does this line carry the GEO response marker?
    #[inline(always)]
    pub fn qualifies(&self, line: &str) -> bool {
        self.marker.find(line.as_bytes()).is_some()
    }

    /// Extract the event for the qualifying line at `index`.
    pub fn extract(&self, lines: &LineStore, index: usize) -> Result<GeoEvent> {
        let fail = |kind| Error::Extraction { line: index, kind };
        let text = lines
            .get(index)
            .map(|l| l.content())
            .unwrap_or_default();

        let ip = self
            .ipv4
            .find(text)
            .ok_or_else(|| fail(ExtractionErrorKind::MissingAddress))?
            .as_str();

        let country = self
            .country
            .captures(text)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| fail(ExtractionErrorKind::MissingCountryCode))?
            .as_str();

        let timestamp_line = index.checked_sub(self.timestamp_offset).ok_or_else(|| {
            fail(ExtractionErrorKind::TimestampOutOfRange {
                offset: self.timestamp_offset,
            })
        })?;
        let timestamp = lines
            .get(timestamp_line)
            .and_then(|l| l.timestamp_field())
            .ok_or_else(|| fail(ExtractionErrorKind::MissingTimestamp { timestamp_line }))?;

        Ok(GeoEvent {
            line: index,
            ip: ip.to_string(),
            country: country.to_string(),
            timestamp: timestamp.to_string(),
        })
    }

    /// Lazily yield one result per qualifying line, in line order.
    pub fn events<'a>(
        &'a self,
        lines: &'a LineStore,
    ) -> impl Iterator<Item = Result<GeoEvent>> + 'a {
        lines
            .iter()
            .enumerate()
            .filter(move |(_, line)| self.qualifies(line.content()))
            .map(move |(index, _)| self.extract(lines, index))
    }
}

/// Builder for constructing an [`Extractor`] with custom layout settings.
#[derive(Clone, Debug)]
pub struct ExtractorBuilder {
    marker: String,
    timestamp_offset: usize,
}

impl Default for ExtractorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorBuilder {
    /// Create a new builder for the stock Delivery Optimization layout.
    #[inline]
    pub fn new() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            timestamp_offset: DEFAULT_TIMESTAMP_OFFSET,
        }
    }

    /// Substring a line must contain to be treated as a GEO response.
    #[inline(always)]
    pub fn marker(&mut self, marker: impl Into<String>) -> &mut Self {
        self.marker = marker.into();
        self
    }

    /// Distance back from a GEO response to its timestamp line.
    #[inline(always)]
    pub fn timestamp_offset(&mut self, offset: usize) -> &mut Self {
        self.timestamp_offset = offset;
        self
    }

    /// Build the extractor with the current settings.
    pub fn build(&self) -> Result<Extractor> {
        let country = format!(r"{}(\w{{2}})", regex::escape(COUNTRY_CODE_MARKER));
        Ok(Extractor {
            marker: Finder::new(self.marker.as_bytes()).into_owned(),
            ipv4: Regex::new(IPV4_PATTERN)?,
            country: Regex::new(&country)?,
            timestamp_offset: self.timestamp_offset,
        })
    }
}
