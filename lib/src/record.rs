use async_trait::async_trait;
use eyre::Result;
use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};

use crate::sample::epoch_seconds;
use crate::{BadRecord, Sample};

/// ScanRecord is a single inventory observation: how many units of a product
/// were found on a shelf at a point in time.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub row_number: Option<u32>,
    #[serde(default)]
    pub shelf_number: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub scanned_at: SystemTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StockStatus>,
}

impl ScanRecord {
    /// Status as recorded, or derived from the quantity when none was recorded.
    pub fn effective_status(&self) -> Option<StockStatus> {
        self.status
            .or_else(|| self.quantity.map(StockStatus::from_quantity))
    }
}

// A record without a quantity has a NaN value and is rejected by the
// downsampler as malformed.
impl Sample for ScanRecord {
    fn timestamp(&self) -> f64 {
        epoch_seconds(self.scanned_at)
    }

    fn value(&self) -> f64 {
        self.quantity.map_or(f64::NAN, |q| q as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Ok,
    LowStock,
    Critical,
}

impl StockStatus {
    pub fn from_quantity(quantity: i64) -> Self {
        match quantity {
            q if q <= 5 => StockStatus::Critical,
            q if q <= 20 => StockStatus::LowStock,
            _ => StockStatus::Ok,
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            StockStatus::Ok => "OK",
            StockStatus::LowStock => "LOW_STOCK",
            StockStatus::Critical => "CRITICAL",
        })
    }
}

#[async_trait]
pub trait Codec {
    /// Decode the next record, or None at the end of the input. A line that
    /// doesn't hold a valid record fails with a [`BadRecord`] error.
    async fn decode<R: AsyncBufRead + Unpin + Send>(
        &self,
        reader: &mut R,
    ) -> Result<Option<ScanRecord>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Csv,
}

impl Format {
    /// Peek at the first non-blank byte of the input: JSON lines start with
    /// `{`, anything else is taken for CSV. Returns None on empty input.
    pub async fn detect<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Format>> {
        loop {
            let buf = reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(None);
            }
            let blanks = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            if blanks == buf.len() {
                reader.consume(blanks);
                continue;
            }
            let format = if buf[blanks] == b'{' {
                Format::Json
            } else {
                Format::Csv
            };
            reader.consume(blanks);
            return Ok(Some(format));
        }
    }

    pub async fn decode<R: AsyncBufRead + Unpin + Send>(
        &self,
        reader: &mut R,
    ) -> Result<Option<ScanRecord>> {
        match self {
            Format::Json => JsonCodec.decode(reader).await,
            Format::Csv => CsvCodec.decode(reader).await,
        }
    }
}

// Read the next line that isn't blank. Returns false at the end of the input.
async fn next_line<R: AsyncBufRead + Unpin + Send>(
    reader: &mut R,
    line: &mut String,
) -> Result<bool> {
    loop {
        line.clear();
        if reader.read_line(line).await? == 0 {
            return Ok(false);
        }
        if !line.trim().is_empty() {
            return Ok(true);
        }
    }
}

/// Robot scan history, one JSON object per line.
pub struct JsonCodec;

#[async_trait]
impl Codec for JsonCodec {
    async fn decode<R: AsyncBufRead + Unpin + Send>(
        &self,
        reader: &mut R,
    ) -> Result<Option<ScanRecord>> {
        let mut line = String::new();
        if !next_line(reader, &mut line).await? {
            return Ok(None);
        }
        serde_json::from_str(&line)
            .map(Some)
            .map_err(|e| bad_record(&line, e))
    }
}

/// CSV imports: `product_id;product_name;quantity;zone;date;row;shelf`,
/// with an optional header row.
pub struct CsvCodec;

type CsvRow = (String, String, i64, String, String, Option<u32>, Option<u32>);

#[async_trait]
impl Codec for CsvCodec {
    async fn decode<R: AsyncBufRead + Unpin + Send>(
        &self,
        reader: &mut R,
    ) -> Result<Option<ScanRecord>> {
        let mut line = String::new();
        loop {
            if !next_line(reader, &mut line).await? {
                return Ok(None);
            }
            if !is_csv_header(&line) {
                break;
            }
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b';')
            .trim(csv::Trim::All)
            .from_reader(line.as_bytes());
        let row: CsvRow = match rdr.deserialize::<CsvRow>().next() {
            Some(row) => row.map_err(|e| bad_record(&line, e))?,
            None => return Err(bad_record(&line, "no CSV record")),
        };
        let (product_id, product_name, quantity, zone, date, row_number, shelf_number) = row;
        let scanned_at = parse_scanned_at(&date).map_err(|e| bad_record(&line, e))?;

        Ok(Some(ScanRecord {
            product_id,
            product_name,
            quantity: Some(quantity),
            zone,
            row_number,
            shelf_number,
            scanned_at,
            status: Some(StockStatus::from_quantity(quantity)),
        }))
    }
}

fn bad_record(line: &str, reason: impl fmt::Display) -> eyre::Report {
    eyre::Report::new(BadRecord {
        line: line.trim().to_string(),
        reason: reason.to_string(),
    })
}

fn is_csv_header(line: &str) -> bool {
    line.split(';')
        .next()
        .map(|field| field.trim().trim_start_matches('\u{feff}') == "product_id")
        .unwrap_or(false)
}

/// Parse a scan date: RFC 3339, `YYYY-MM-DD HH:MM:SS` or a bare
/// `YYYY-MM-DD`, all in UTC. A bare date means midnight. Numeric offsets
/// other than UTC are rejected.
pub fn parse_scanned_at(s: &str) -> Result<SystemTime> {
    let s = s.trim();
    let parsed = if s.len() == 10 {
        humantime::parse_rfc3339_weak(&format!("{} 00:00:00", s))
    } else {
        humantime::parse_rfc3339_weak(s)
    };
    parsed.map_err(|e| eyre::eyre!("bad date '{}': {}", s, e))
}
