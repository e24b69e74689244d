//! Accumulation and finalisation
//!
//! Categorisation is commutative over records, so the final report is
//! deterministic regardless of the order battles arrive in.
//! Finalisation computes ratios first (zero denominators become +inf),
//! then averages, then the battle share per bucket.

use std::collections::HashMap;

use super::categories::{Category, SortKey};
use super::fields::{FieldKind, ReportField};
use crate::replay::reader::BattleRecord;

#[derive(Debug, Clone, Default)]
struct BucketAccum {
    battles: u64,
    /// Per field: (numerator sum, denominator sum). Averages keep the
    /// contributing-record count in the denominator slot, so records
    /// without a value (e.g. a team side with no resolved players)
    /// stay out of the mean; counts and shares use neither.
    sums: Vec<(f64, f64)>,
}

impl BucketAccum {
    fn new(n_fields: usize) -> Self {
        Self {
            battles: 0,
            sums: vec![(0.0, 0.0); n_fields],
        }
    }

    fn add(&mut self, fields: &[ReportField], record: &BattleRecord) {
        self.battles += 1;
        for (i, field) in fields.iter().enumerate() {
            match field.kind {
                FieldKind::Count | FieldKind::Share => {}
                FieldKind::Average(source) => {
                    if let Some(v) = source.value(record) {
                        if v.is_finite() {
                            self.sums[i].0 += v;
                            self.sums[i].1 += 1.0;
                        }
                    }
                }
                FieldKind::Ratio(num, den) => {
                    if let Some(v) = num.value(record) {
                        if v.is_finite() {
                            self.sums[i].0 += v;
                        }
                    }
                    if let Some(v) = den.value(record) {
                        if v.is_finite() {
                            self.sums[i].1 += v;
                        }
                    }
                }
            }
        }
    }

    fn finalise(&self, fields: &[ReportField], category_battles: u64) -> Vec<f64> {
        fields
            .iter()
            .enumerate()
            .map(|(i, field)| match field.kind {
                FieldKind::Count => self.battles as f64,
                FieldKind::Share => {
                    if category_battles == 0 {
                        0.0
                    } else {
                        self.battles as f64 / category_battles as f64
                    }
                }
                FieldKind::Average(_) => {
                    let (sum, n) = self.sums[i];
                    if n == 0.0 {
                        f64::INFINITY
                    } else {
                        sum / n
                    }
                }
                FieldKind::Ratio(_, _) => {
                    let (num, den) = self.sums[i];
                    if den == 0.0 {
                        f64::INFINITY
                    } else {
                        num / den
                    }
                }
            })
            .collect()
    }
}

/// One finalised output row.
#[derive(Debug, Clone)]
pub struct Row {
    pub label: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub key: &'static str,
    pub name: &'static str,
    pub rows: Vec<Row>,
}

/// The finalised report: one block per selected category, rows in
/// category order, values aligned with the field list.
#[derive(Debug, Clone)]
pub struct Report {
    pub fields: Vec<ReportField>,
    pub categories: Vec<CategoryReport>,
    pub total_battles: u64,
}

pub struct Aggregator {
    fields: Vec<ReportField>,
    categories: Vec<&'static Category>,
    /// category index → sort key → accumulator + display label
    buckets: Vec<HashMap<SortKey, (String, BucketAccum)>>,
    total_battles: u64,
}

impl Aggregator {
    pub fn new(fields: &[ReportField], categories: Vec<&'static Category>) -> Self {
        let buckets = categories.iter().map(|_| HashMap::new()).collect();
        Self {
            fields: fields.to_vec(),
            categories,
            buckets,
            total_battles: 0,
        }
    }

    /// Fold one enriched record into every category it has a value for.
    pub fn add(&mut self, record: &BattleRecord) {
        self.total_battles += 1;
        for (idx, category) in self.categories.iter().enumerate() {
            let Some((sort_key, label)) = category.categorize(record) else {
                continue;
            };
            let n_fields = self.fields.len();
            let (_, accum) = self.buckets[idx]
                .entry(sort_key)
                .or_insert_with(|| (label, BucketAccum::new(n_fields)));
            accum.add(&self.fields, record);
        }
    }

    pub fn finalise(self) -> Report {
        let mut categories = Vec::with_capacity(self.categories.len());
        for (category, buckets) in self.categories.iter().zip(self.buckets) {
            let category_battles: u64 = buckets.values().map(|(_, a)| a.battles).sum();

            let mut entries: Vec<(SortKey, String, BucketAccum)> = buckets
                .into_iter()
                .map(|(key, (label, accum))| (key, label, accum))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let rows = entries
                .into_iter()
                .map(|(_, label, accum)| Row {
                    values: accum.finalise(&self.fields, category_battles),
                    label,
                })
                .collect();

            categories.push(CategoryReport {
                key: category.key,
                name: category.name,
                rows,
            });
        }

        Report {
            fields: self.fields,
            categories,
            total_battles: self.total_battles,
        }
    }
}
