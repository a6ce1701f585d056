//! Row assembly
//!
//! Resolved metric values are grouped into rows that follow the column order
//! of their series. Series with an instance column get one row per instance
//! name; `machine` collapses everything into a single row and sums numeric
//! values that land in the same cell.
//!
//! A row is only kept when every required column is filled: `time`,
//! `hostname`, the instance column and every column a configured metric
//! filled for at least one row of the batch. Columns nothing fed stay `null`.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::pcp::ResolvedMetric;
use crate::schema::{HOSTNAME, Series, TIME};

/// One output record, exactly as wide as its series' column list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }
}

/// Indices of the columns a row must have filled.
///
/// A configured metric only counts once at least one of its values landed in
/// this batch, so a metric that failed to resolve does not sink its siblings.
fn required_columns(
    series: Series,
    metrics: &[String],
    filled: &BTreeSet<usize>,
) -> BTreeSet<usize> {
    let keys = [Some(TIME), Some(HOSTNAME), series.instance_column()]
        .into_iter()
        .flatten()
        .filter_map(|column| series.column_index(column));

    let values = metrics
        .iter()
        .filter_map(|m| series.column_for_metric(m))
        .filter_map(|column| series.column_index(column))
        .filter(|index| filled.contains(index));

    keys.chain(values).collect()
}

fn accumulate(cell: &mut Value, value: Value) {
    if cell.is_null() {
        *cell = value;
        return;
    }

    let sum = match (cell.as_u64(), value.as_u64()) {
        (Some(a), Some(b)) => Some(Value::from(a.saturating_add(b))),
        _ => match (cell.as_f64(), value.as_f64()) {
            (Some(a), Some(b)) => Some(Value::from(a + b)),
            _ => None,
        },
    };

    *cell = sum.unwrap_or(value);
}

/// Build the rows of `series` for one poll cycle of `host`.
pub fn assemble(
    series: Series,
    metrics: &[String],
    host: &str,
    time: i64,
    resolved: &[ResolvedMetric],
) -> Vec<Row> {
    let width = series.columns().len();
    let instance_index = series
        .instance_column()
        .and_then(|c| series.column_index(c));
    let time_index = series.column_index(TIME);
    let host_index = series.column_index(HOSTNAME);

    let mut rows: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    let mut filled = BTreeSet::new();

    for metric in resolved {
        let Some(column) = series.column_for_metric(&metric.name) else {
            debug!("metric {} has no column in series {series}", metric.name);
            continue;
        };
        let Some(index) = series.column_index(column) else {
            continue;
        };

        for instance in &metric.instances {
            let key = match instance_index {
                Some(_) if instance.name.is_empty() => {
                    debug!(
                        "singular value of {} cannot be placed in series {series}",
                        metric.name
                    );
                    continue;
                }
                Some(_) => instance.name.clone(),
                None => String::new(),
            };

            let row = rows.entry(key).or_insert_with_key(|key| {
                let mut row = vec![Value::Null; width];
                if let Some(i) = time_index {
                    row[i] = Value::from(time);
                }
                if let Some(i) = host_index {
                    row[i] = Value::from(host);
                }
                if let Some(i) = instance_index {
                    row[i] = Value::from(key.as_str());
                }
                row
            });

            accumulate(&mut row[index], instance.value.clone());
            filled.insert(index);
        }
    }

    let required = required_columns(series, metrics, &filled);

    rows.into_iter()
        .filter_map(|(instance, values)| {
            let complete = required.iter().all(|i| !values[*i].is_null());
            if !complete {
                debug!("discarding incomplete {series} row for '{instance}'");
            }
            complete.then_some(Row(values))
        })
        .collect()
}
