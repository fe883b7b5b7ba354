use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use rustc_hash::FxHasher;
use serde::Serialize;

use crate::extractor::GeoEvent;

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Per-address tally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IpRecord {
    pub ip: String,
    /// Country code from the first sighting.
    pub country: String,
    pub occurrences: u64,
}

/// One sighting of an address, numbered across the whole run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimestampEntry {
    pub seq: u64,
    pub ip: String,
    pub timestamp: String,
}

/// In-memory aggregation of GEO response events.
///
/// Records keep first-sighting order. Every ingested event adds exactly one
/// [`TimestampEntry`], so the sum of all occurrence counts always equals
/// the number of entries.
#[derive(Clone, Debug, Default)]
pub struct Aggregation {
    records: FxIndexMap<String, IpRecord>,
    timestamps: Vec<TimestampEntry>,
    next_seq: u64,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the store.
    ///
    /// A repeat sighting only bumps the count; its country code is ignored.
    pub fn ingest(&mut self, event: GeoEvent) {
        self.next_seq += 1;
        let GeoEvent {
            ip,
            country,
            timestamp,
            ..
        } = event;

        match self.records.get_mut(&ip) {
            Some(record) => record.occurrences += 1,
            None => {
                self.records.insert(
                    ip.clone(),
                    IpRecord {
                        ip: ip.clone(),
                        country,
                        occurrences: 1,
                    },
                );
            }
        }

        self.timestamps.push(TimestampEntry {
            seq: self.next_seq,
            ip,
            timestamp,
        });
    }

    /// All records in first-sighting order.
    pub fn records(&self) -> impl Iterator<Item = &IpRecord> + '_ {
        self.records.values()
    }

    pub fn record(&self, ip: &str) -> Option<&IpRecord> {
        self.records.get(ip)
    }

    /// Sightings of `ip` in sequence order; empty if never seen.
    pub fn timestamps_for<'a>(
        &'a self,
        ip: &'a str,
    ) -> impl Iterator<Item = &'a TimestampEntry> + 'a {
        self.timestamps.iter().filter(move |entry| entry.ip == ip)
    }

    /// Every sighting in sequence order.
    pub fn timestamps(&self) -> &[TimestampEntry] {
        &self.timestamps
    }

    /// Sum of all occurrence counts.
    pub fn total_occurrences(&self) -> u64 {
        self.records.values().map(|r| r.occurrences).sum()
    }

    /// Number of distinct addresses.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Extend<GeoEvent> for Aggregation {
    fn extend<T: IntoIterator<Item = GeoEvent>>(&mut self, iter: T) {
        for event in iter {
            self.ingest(event);
        }
    }
}
