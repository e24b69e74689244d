//! Report output: aligned text tables and a mirroring JSON form

use std::io::{self, Write};

use serde_json::{json, Value};

use crate::aggregate::engine::Report;
use crate::aggregate::histogram::Histogram;

const LABEL_MIN_WIDTH: usize = 12;

fn label_width(report_rows: impl Iterator<Item = usize>) -> usize {
    report_rows.max().unwrap_or(0).max(LABEL_MIN_WIDTH)
}

/// Render the aggregate report as aligned text tables, one block per
/// category with its header printed once.
pub fn render_text<W: Write>(
    report: &Report,
    histograms: Option<&[Histogram]>,
    out: &mut W,
) -> io::Result<()> {
    for category in &report.categories {
        let width = label_width(category.rows.iter().map(|r| r.label.len()));

        writeln!(out)?;
        writeln!(out, "{}", category.name)?;
        write!(out, "{:<width$}", "", width = width)?;
        for field in &report.fields {
            write!(out, " {:>w$}", field.name, w = field.width)?;
        }
        writeln!(out)?;

        for row in &category.rows {
            write!(out, "{:<width$}", row.label, width = width)?;
            for (field, value) in report.fields.iter().zip(&row.values) {
                write!(out, " {:>w$}", field.format.render(*value), w = field.width)?;
            }
            writeln!(out)?;
        }
    }

    if let Some(histograms) = histograms {
        for histogram in histograms {
            let width = label_width(histogram.rows.iter().map(|r| r.label.len()));
            writeln!(out)?;
            writeln!(out, "{} distribution", histogram.name)?;
            writeln!(
                out,
                "{:<width$} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
                "",
                "Allies",
                "A%",
                "Enemies",
                "E%",
                "Total",
                "T%",
                width = width
            )?;
            for row in &histogram.rows {
                writeln!(
                    out,
                    "{:<width$} {:>8} {:>7.1}% {:>8} {:>7.1}% {:>8} {:>7.1}%",
                    row.label,
                    row.allies,
                    row.allies_pct * 100.0,
                    row.enemies,
                    row.enemies_pct * 100.0,
                    row.total,
                    row.total_pct * 100.0,
                    width = width
                )?;
            }
        }
    }
    Ok(())
}

/// JSON mirror of the printed structure.
pub fn to_json(report: &Report, histograms: Option<&[Histogram]>) -> Value {
    let categories: Vec<Value> = report
        .categories
        .iter()
        .map(|category| {
            let rows: Vec<Value> = category
                .rows
                .iter()
                .map(|row| {
                    let mut object = serde_json::Map::new();
                    object.insert("label".to_string(), json!(row.label));
                    for (field, value) in report.fields.iter().zip(&row.values) {
                        let v = if value.is_finite() {
                            json!(value)
                        } else {
                            Value::Null
                        };
                        object.insert(field.key.to_string(), v);
                    }
                    Value::Object(object)
                })
                .collect();
            json!({
                "key": category.key,
                "name": category.name,
                "rows": rows,
            })
        })
        .collect();

    let mut root = json!({
        "total_battles": report.total_battles,
        "categories": categories,
    });

    if let Some(histograms) = histograms {
        let blocks: Vec<Value> = histograms
            .iter()
            .map(|h| {
                json!({
                    "name": h.name,
                    "rows": h.rows.iter().map(|r| json!({
                        "label": r.label,
                        "allies": r.allies,
                        "enemies": r.enemies,
                        "total": r.total,
                        "allies_pct": r.allies_pct,
                        "enemies_pct": r.enemies_pct,
                        "total_pct": r.total_pct,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        root["histograms"] = Value::Array(blocks);
    }

    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::categories::select_categories;
    use crate::aggregate::engine::Aggregator;
    use crate::aggregate::fields::{fields_for, FieldMode};
    use crate::refdata::{RefData, Tankopedia};
    use crate::replay::reader::ReplayReader;
    use crate::replay::types::ReplayDocument;
    use crate::RunContext;
    use std::sync::Arc;

    fn report() -> Report {
        let doc: ReplayDocument = serde_json::from_value(serde_json::json!({
            "status": "ok",
            "data": {"summary": {
                "battle_result": 1,
                "protagonist": 100,
                "allies": [100],
                "enemies": [200],
                "battle_start_timestamp": 1_700_000_000.0,
                "battle_duration": 300.0,
                "details": [
                    {"dbid": 100, "vehicle_descr": 1, "death_reason": -1,
                     "hitpoints_left": 10, "time_alive": 300.0,
                     "damage_made": 800.0, "damage_received": 400.0,
                     "shots_made": 10.0, "shots_hit": 7.0},
                    {"dbid": 200, "vehicle_descr": 1, "death_reason": 0, "time_alive": 100.0}
                ]
            }}
        }))
        .unwrap();
        let refdata = Arc::new(RefData {
            tankopedia: Tankopedia::default(),
            maps: Default::default(),
        });
        let record = ReplayReader::new(refdata, Arc::new(RunContext::default()), None, false)
            .read(&doc)
            .unwrap();
        let mut agg = Aggregator::new(
            fields_for(FieldMode::Default),
            select_categories(&[], false),
        );
        agg.add(&record);
        agg.finalise()
    }

    #[test]
    fn test_text_output_has_header_and_row() {
        let mut buffer = Vec::new();
        render_text(&report(), None, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Total"));
        assert!(text.contains("Battles"));
        assert!(text.contains("WR"));
    }

    #[test]
    fn test_json_mirrors_rows() {
        let value = to_json(&report(), None);
        assert_eq!(value["total_battles"], 1);
        let row = &value["categories"][0]["rows"][0];
        assert_eq!(row["label"], "Total");
        assert_eq!(row["battles"], 1.0);
        assert_eq!(row["win"], 1.0);
        // infinite ratios serialise as null, not as a JSON error
        assert!(row["kdr"].is_null());
    }
}
