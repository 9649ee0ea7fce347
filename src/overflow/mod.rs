//! Overflow pagination for table layers.
//!
//! A table layer with more rows than one page holds is exported once per
//! chunk of row identifiers, each export filtered by an `objectid IN (...)`
//! predicate.


use std::cmp::Ordering;

use serde_json::Value;

use crate::geometry::FeatureSet;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const OBJECT_ID_FIELD: &str = "objectid";
/// Row filter that shows every row.
pub const UNRESTRICTED: &str = "1=1";

/// One page worth of row identifiers and the filter selecting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowPage {
    pub ids: Vec<i64>,
    pub predicate: String,
}

impl OverflowPage {
    pub fn new(ids: Vec<i64>) -> Self {
        let predicate = id_predicate(&ids);
        Self { ids, predicate }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub fn id_predicate(ids: &[i64]) -> String {
    let list = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!("{} IN ({})", OBJECT_ID_FIELD, list)
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn as_sort_key(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Row identifiers of `source`, in display order.
///
/// Rows without an identifier are skipped and repeated identifiers are kept
/// once. With a sort field, rows are ordered by it descending (stable; rows
/// whose value is missing or not numeric go last).
pub fn read_rows(source: &FeatureSet, sort_field: Option<&str>) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    let mut rows: Vec<(i64, Option<f64>)> = source
        .features
        .iter()
        .filter_map(|feature| {
            let id = feature.attribute(OBJECT_ID_FIELD).and_then(as_id)?;
            let key = sort_field
                .and_then(|field| feature.attribute(field))
                .and_then(as_sort_key);
            Some((id, key))
        })
        .filter(|(id, _)| seen.insert(*id))
        .collect();

    if sort_field.is_some() {
        rows.sort_by(|a, b| match (a.1, b.1) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }

    rows.into_iter().map(|(id, _)| id).collect()
}

/// Split `ids` into consecutive pages of at most `page_size` identifiers.
///
/// Page `i` holds the identifiers at positions `[i * page_size, (i + 1) * page_size)`.
/// A page size of zero is treated as one.
pub fn paginate(ids: &[i64], page_size: usize) -> Vec<OverflowPage> {
    ids.chunks(page_size.max(1))
        .map(|chunk| OverflowPage::new(chunk.to_vec()))
        .collect()
}
