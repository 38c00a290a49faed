use clap::Args;
use eyre::Result;
use invtrend::{BadRecord, Format, Threshold, Trend};
use tokio::io::{AsyncBufRead, AsyncWriteExt};

use crate::io::{Input, Output};

/// How many rejected lines are quoted in the warning.
const REPORTED_REJECTS: usize = 5;

#[derive(Args, Debug)]
pub struct Opts {
    /// Maximum number of points per product (LTTB downsampling threshold)
    #[clap(
        long,
        env = "INVTREND_MAX_POINTS",
        default_value_t = Threshold::default(),
        allow_negative_numbers = true
    )]
    pub max_points: Threshold,

    /// Report type (json, text)
    #[clap(long = "type", default_value = "json")]
    pub report_type: String,

    /// Output file [default: stdout]
    #[clap(long, default_value = "stdout")]
    pub output: String,

    /// Scan record files, JSON lines or semicolon-separated CSV [default: stdin]
    pub files: Vec<String>,
}

impl Opts {
    fn sources(&self) -> Vec<String> {
        if self.files.is_empty() {
            vec!["stdin".to_string()]
        } else {
            self.files.clone()
        }
    }
}

// Lines that failed to decode, counted across all sources.
#[derive(Debug, Default)]
struct Rejects {
    count: u64,
    first: Vec<String>,
}

impl Rejects {
    fn add(&mut self, source: &str, bad: &BadRecord) {
        self.count += 1;
        if self.first.len() < REPORTED_REJECTS {
            self.first.push(format!("{}: {}", source, bad));
        }
    }
}

pub async fn trend(opts: &Opts) -> Result<()> {
    let mut trend = Trend::new();
    let mut rejects = Rejects::default();
    let mut records = 0u64;

    for source in &opts.sources() {
        let mut input = Input::from_filename(source).await?;
        let Some(format) = input.detect_format().await? else {
            log::warn!("{} is empty", source);
            continue;
        };
        log::debug!("reading {} as {:?}", source, format);
        records += read_source(source, format, &mut input, &mut trend, &mut rejects).await?;
    }

    if rejects.count > 0 {
        log::warn!(
            "skipped {} undecodable records, first {}:\n{}",
            rejects.count,
            rejects.first.len(),
            rejects.first.join("\n")
        );
    }
    if trend.skipped() > 0 {
        log::warn!("skipped {} records without a quantity", trend.skipped());
    }

    let report = trend.close(opts.max_points)?;
    log::info!(
        "{} records across {} products, at most {} points each",
        records,
        report.meta.total_products,
        opts.max_points
    );

    let mut buf = Vec::new();
    match opts.report_type.as_str() {
        "json" => invtrend::report_json(&report, &mut buf)?,
        "text" => invtrend::report_text(&report, &mut buf)?,
        other => eyre::bail!("unknown report type: {}", other),
    }

    let mut output = Output::from_filename(&opts.output).await?;
    output.write_all(&buf).await?;
    output.flush().await?;
    Ok(())
}

// Feed every record of one source into the trend. Bad lines are skipped and
// remembered; read errors abort.
async fn read_source<R: AsyncBufRead + Unpin + Send>(
    source: &str,
    format: Format,
    input: &mut R,
    trend: &mut Trend,
    rejects: &mut Rejects,
) -> Result<u64> {
    let mut records = 0u64;
    loop {
        match format.decode(input).await {
            Ok(Some(record)) => {
                trend.add(record);
                records += 1;
            }
            Ok(None) => return Ok(records),
            Err(e) => match e.downcast_ref::<BadRecord>() {
                Some(bad) => rejects.add(source, bad),
                None => eyre::bail!("decoding {}: {}", source, e),
            },
        }
    }
}
