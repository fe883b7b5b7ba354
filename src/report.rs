//! Rendering of aggregation results.
//!
//! A [`Renderer`] decides how the primary listing (one row per address) and
//! the secondary listing (every sighting of one address) look. The banner
//! lines around them have default implementations on the trait so the text
//! renderers share them while [`JsonRenderer`] can suppress them.

use std::io;

use serde::Serialize;
use termcolor::{ColorSpec, WriteColor};

use crate::error::{Error, Result};
use crate::store::{Aggregation, IpRecord, TimestampEntry};

const RECORD_HEADERS: [&str; 3] = ["IP Address", "Country Code", "Occurrences"];
const TIMESTAMP_HEADERS: [&str; 3] = ["#", "IP Address", "Date/Time"];

/// Presentation of a report.
pub trait Renderer {
    /// Echo what the user asked for.
    fn begin(&mut self, out: &mut dyn WriteColor, source: &str) -> Result<()> {
        writeln!(out, "User Input")?;
        writeln!(out, "----------")?;
        writeln!(out, "File Selection:  {source}")?;
        Ok(())
    }

    /// Write the primary listing.
    fn records(&mut self, out: &mut dyn WriteColor, records: &[&IpRecord]) -> Result<()>;

    /// Write the sightings of `ip`, numbered from 1.
    fn timestamps(
        &mut self,
        out: &mut dyn WriteColor,
        ip: &str,
        entries: &[&TimestampEntry],
    ) -> Result<()>;

    fn finish(&mut self, out: &mut dyn WriteColor) -> Result<()> {
        writeln!(out, "Program Terminated Normally")?;
        Ok(())
    }
}

/// Render a full report for `agg` through `renderer`.
///
/// The secondary listing is written only when `address` is given; an
/// address that was never seen produces an empty listing.
pub fn write_report(
    out: &mut dyn WriteColor,
    renderer: &mut dyn Renderer,
    agg: &Aggregation,
    source: &str,
    address: Option<&str>,
) -> Result<()> {
    renderer.begin(out, source)?;

    let records: Vec<&IpRecord> = agg.records().collect();
    renderer.records(out, &records)?;

    if let Some(ip) = address {
        let entries: Vec<&TimestampEntry> = agg.timestamps_for(ip).collect();
        renderer.timestamps(out, ip, &entries)?;
    }

    renderer.finish(out)?;
    out.flush()?;
    Ok(())
}

fn write_header(out: &mut dyn WriteColor, text: &str) -> Result<()> {
    out.set_color(ColorSpec::new().set_bold(true))?;
    write!(out, "{text}")?;
    out.reset()?;
    Ok(())
}

/// A left-aligned, bordered table.
struct Table<'h> {
    headers: &'h [&'h str],
    rows: Vec<Vec<String>>,
}

impl<'h> Table<'h> {
    fn new(headers: &'h [&'h str]) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }

    fn write(&self, out: &mut dyn WriteColor) -> Result<()> {
        let widths = self.widths();
        let rule: String = widths
            .iter()
            .map(|w| format!("+{}", "-".repeat(w + 2)))
            .collect::<String>()
            + "+";

        writeln!(out, "{rule}")?;
        for (header, width) in self.headers.iter().zip(widths.iter().copied()) {
            write!(out, "| ")?;
            write_header(out, &format!("{header:<width$}"))?;
            write!(out, " ")?;
        }
        writeln!(out, "|")?;
        writeln!(out, "{rule}")?;

        if self.rows.is_empty() {
            return Ok(());
        }
        for row in &self.rows {
            for (cell, width) in row.iter().zip(widths.iter().copied()) {
                write!(out, "| {cell:<width$} ")?;
            }
            writeln!(out, "|")?;
        }
        writeln!(out, "{rule}")?;
        Ok(())
    }
}

/// Bordered tables.
#[derive(Debug, Default)]
pub struct TableRenderer;

impl Renderer for TableRenderer {
    fn records(&mut self, out: &mut dyn WriteColor, records: &[&IpRecord]) -> Result<()> {
        let mut table = Table::new(&RECORD_HEADERS);
        for record in records {
            table.push(vec![
                record.ip.clone(),
                record.country.clone(),
                itoa::Buffer::new().format(record.occurrences).to_string(),
            ]);
        }
        table.write(out)
    }

    fn timestamps(
        &mut self,
        out: &mut dyn WriteColor,
        ip: &str,
        entries: &[&TimestampEntry],
    ) -> Result<()> {
        writeln!(out, "Results for {ip}")?;
        let mut table = Table::new(&TIMESTAMP_HEADERS);
        let mut num = itoa::Buffer::new();
        for (i, entry) in entries.iter().enumerate() {
            table.push(vec![
                num.format(i + 1).to_string(),
                entry.ip.clone(),
                entry.timestamp.clone(),
            ]);
        }
        table.write(out)
    }
}

/// Borderless dump: one block per address, fixed-width sighting rows.
#[derive(Debug, Default)]
pub struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn records(&mut self, out: &mut dyn WriteColor, records: &[&IpRecord]) -> Result<()> {
        for record in records {
            writeln!(out, "{}", "=".repeat(45))?;
            writeln!(out, "{:<15} {}", "IP:", record.ip)?;
            writeln!(out, "{:<15} {}", "Country Code:", record.country)?;
            writeln!(out, "{:<15} {}", "Occurrences:", record.occurrences)?;
        }
        Ok(())
    }

    fn timestamps(
        &mut self,
        out: &mut dyn WriteColor,
        ip: &str,
        entries: &[&TimestampEntry],
    ) -> Result<()> {
        const RULE: &str = "+----+-----------------+--------------------------+";

        writeln!(out, "Results for {ip}")?;
        writeln!(out, "{RULE}")?;
        write!(out, "| ")?;
        write_header(
            out,
            &format!(
                "{:<2} | {:<15} | {:<24}",
                TIMESTAMP_HEADERS[0], TIMESTAMP_HEADERS[1], TIMESTAMP_HEADERS[2]
            ),
        )?;
        writeln!(out, " |")?;
        writeln!(out, "{RULE}")?;
        for (i, entry) in entries.iter().enumerate() {
            writeln!(
                out,
                "|{:>3} | {:<15} | {:>24} |",
                i + 1,
                entry.ip,
                entry.timestamp
            )?;
        }
        writeln!(out, "{RULE}")?;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize)]
struct JsonReport {
    source: String,
    records: Vec<IpRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamps: Option<Vec<TimestampEntry>>,
}

/// A single JSON document, written when the report finishes.
///
/// No banner lines are written, so stdout can be piped straight to `jq`.
#[derive(Debug, Default)]
pub struct JsonRenderer {
    report: JsonReport,
}

impl Renderer for JsonRenderer {
    fn begin(&mut self, _out: &mut dyn WriteColor, source: &str) -> Result<()> {
        self.report.source = source.to_string();
        Ok(())
    }

    fn records(&mut self, _out: &mut dyn WriteColor, records: &[&IpRecord]) -> Result<()> {
        self.report.records = records.iter().map(|&r| r.clone()).collect();
        Ok(())
    }

    fn timestamps(
        &mut self,
        _out: &mut dyn WriteColor,
        ip: &str,
        entries: &[&TimestampEntry],
    ) -> Result<()> {
        self.report.address = Some(ip.to_string());
        self.report.timestamps = Some(entries.iter().map(|&e| e.clone()).collect());
        Ok(())
    }

    fn finish(&mut self, out: &mut dyn WriteColor) -> Result<()> {
        // keep I/O failures as Error::Io so a closed pipe is recognizable
        serde_json::to_writer_pretty(&mut *out, &self.report).map_err(|e| {
            if e.is_io() {
                Error::Io(io::Error::from(e))
            } else {
                Error::Json(e)
            }
        })?;
        writeln!(out)?;
        Ok(())
    }
}
