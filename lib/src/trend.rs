use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::Serialize;

use crate::{downsample, DownsampleError, ScanRecord, StockStatus, Threshold};

/// Collects scan records per product and turns them into a quantity trend.
#[derive(Debug, Default)]
pub struct Trend {
    series: BTreeMap<String, Vec<ScanRecord>>,
    skipped: u64,
}

#[derive(Debug, Serialize)]
pub struct TrendReport {
    pub products: Vec<String>,
    pub data: BTreeMap<String, Vec<TrendPoint>>,
    pub meta: TrendMeta,
    #[serde(skip)]
    pub summaries: BTreeMap<String, SeriesSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    #[serde(with = "humantime_serde")]
    pub scanned_at: SystemTime,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendMeta {
    pub max_points_per_product: usize,
    pub total_products: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    /// Points before and after downsampling.
    pub points: usize,
    pub kept: usize,
    pub min: i64,
    pub max: i64,
    pub latest: i64,
    pub status: Option<StockStatus>,
}

impl Trend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: ScanRecord) {
        if record.quantity.is_none() {
            log::debug!(
                "skipping {} scan without quantity at {:?}",
                record.product_id,
                record.scanned_at
            );
            self.skipped += 1;
            return;
        }
        self.series
            .entry(record.product_id.clone())
            .or_default()
            .push(record);
    }

    /// Number of records dropped for lacking a quantity.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn close(self, max_points: Threshold) -> Result<TrendReport, DownsampleError> {
        let mut data = BTreeMap::new();
        let mut summaries = BTreeMap::new();

        for (product, mut records) in self.series {
            // Stable, so scans sharing a timestamp keep their input order.
            records.sort_by_key(|r| r.scanned_at);

            let points = records.len();
            let sampled = downsample(&records, max_points.get())?;
            if sampled.len() < points {
                log::debug!(
                    "downsampled {} from {} to {} points",
                    product,
                    points,
                    sampled.len()
                );
            }

            let quantities = records.iter().filter_map(|r| r.quantity);
            let (min, max) = quantities.fold((i64::MAX, i64::MIN), |(lo, hi), q| {
                (lo.min(q), hi.max(q))
            });
            let last = &records[points - 1];
            summaries.insert(
                product.clone(),
                SeriesSummary {
                    points,
                    kept: sampled.len(),
                    min,
                    max,
                    latest: last.quantity.unwrap_or_default(),
                    status: last.effective_status(),
                },
            );

            let trend = sampled
                .iter()
                .filter_map(|r| {
                    r.quantity.map(|quantity| TrendPoint {
                        scanned_at: r.scanned_at,
                        quantity,
                    })
                })
                .collect();
            data.insert(product, trend);
        }

        let products: Vec<String> = data.keys().cloned().collect();
        let meta = TrendMeta {
            max_points_per_product: max_points.get(),
            total_products: products.len(),
        };

        Ok(TrendReport {
            products,
            data,
            meta,
            summaries,
        })
    }
}
