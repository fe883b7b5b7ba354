//! The dolgeo library for tallying GEO response addresses in Windows
//! Delivery Optimization logs.
//!
//! The log is the text produced by
//! `Get-DeliveryOptimizationLog | Out-File -FilePath .\DOL.txt -Encoding ascii`.
//! Every line containing `GEO response` carries the machine's external IPv4
//! address and a country code; the timestamp of that entry sits a fixed
//! number of lines earlier.
//!
//! # Examples
//!
//! ```rust
//! use dolgeo::{examine, ExtractorBuilder, LineStore, ScanPolicy};
//!
//! let log = "\
//! TimeCreated : 3/5/2021 10:00:00 AM
//! ProcessId   : 1234
//! ThreadId    : 5678
//! Level       : 4
//! LevelName   : Info
//! Message     : GEO response: {\"ExternalIpAddress\":\"8.8.8.8\",\"CountryCode\":\"US\"}
//! ";
//! let lines = LineStore::from_text(log);
//! let extractor = ExtractorBuilder::new().build()?;
//! let agg = examine(&lines, &extractor, ScanPolicy::Abort)?;
//!
//! let record = agg.record("8.8.8.8").unwrap();
//! assert_eq!(record.country, "US");
//! assert_eq!(agg.timestamps()[0].timestamp, "3/5/2021 10:00:00 AM");
//! # Ok::<(), dolgeo::Error>(())
//! ```

pub mod error;
pub mod extractor;
pub mod input;
pub mod logger;
pub mod report;
pub mod store;

pub use crate::error::{Error, ExtractionErrorKind, Result};
pub use crate::extractor::{Extractor, ExtractorBuilder, GeoEvent};
pub use crate::input::{LineStore, LogLine};
pub use crate::report::{write_report, JsonRenderer, PlainRenderer, Renderer, TableRenderer};
pub use crate::store::{Aggregation, IpRecord, TimestampEntry};

/// What to do with a GEO response line that cannot be extracted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Stop at the first malformed line.
    #[default]
    Abort,
    /// Log a warning for the line and keep scanning.
    Skip,
}

/// Run one extraction pass over `lines` into a fresh [`Aggregation`].
pub fn examine(
    lines: &LineStore,
    extractor: &Extractor,
    policy: ScanPolicy,
) -> Result<Aggregation> {
    let mut agg = Aggregation::new();
    let mut skipped = 0usize;

    for event in extractor.events(lines) {
        match event {
            Ok(event) => {
                log::debug!(
                    "line {}: {} {} at {}",
                    event.line,
                    event.ip,
                    event.country,
                    event.timestamp
                );
                agg.ingest(event);
            }
            Err(err @ Error::Extraction { .. }) if policy == ScanPolicy::Skip => {
                log::warn!("skipping malformed line: {err}");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    log::info!(
        "{} GEO responses, {} distinct addresses, {} skipped",
        agg.timestamps().len(),
        agg.len(),
        skipped
    );
    Ok(agg)
}
