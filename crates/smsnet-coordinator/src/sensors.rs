// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Typed sensor values derived from a published snapshot
//!
//! The portal answers with loosely shaped JSON: numbers arrive either as JSON
//! numbers or as strings with a decimal comma, and several keys have
//! Portuguese and English spellings.

use crate::snapshot::{SnapshotKey, UpdateSnapshot};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

const DEBT_KEYS: [&str; 5] = [
    "totalDebt",
    "valorEmDivida",
    "debt",
    "TotalDebt",
    "ValorEmDivida",
];
const INVOICE_DEBT_KEYS: [&str; 3] = ["debt", "valor", "amount"];
const INVOICE_KEYS: [&str; 2] = ["nextInvoice", "proximaFatura"];
const DUE_DATE_KEYS: [&str; 2] = ["limitDate", "dataLimite"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorValues {
    /// Meter reading in m³
    pub last_reading_value: Option<f64>,
    pub last_reading_date: Option<NaiveDate>,
    pub consumption_current_month: Option<f64>,
    pub consumption_previous_month: Option<f64>,
    pub consumption_current_month_label: Option<String>,
    /// EUR
    pub billed_last_value: Option<f64>,
    pub billed_last_label: Option<String>,
    /// EUR
    pub debt_total: Option<f64>,
    pub next_due_date: Option<NaiveDate>,
}

impl SensorValues {
    pub fn from_snapshot(snapshot: &UpdateSnapshot) -> Self {
        let mut values = Self::default();

        if let Some(last) = snapshot.get(SnapshotKey::LastReading).and_then(Value::as_object) {
            values.last_reading_value = first_truthy(last, &["Value", "LastReadingValue"])
                .and_then(|v| parse_decimal("last_reading_value", v));
            values.last_reading_date = first_truthy(last, &["LastReadingDate", "Date"])
                .and_then(|v| parse_date("last_reading_date", v));
        }

        if let Some(points) = snapshot
            .get(SnapshotKey::Consumptions)
            .and_then(consumption_points)
        {
            if let Some(current) = points.last() {
                values.consumption_current_month =
                    point_number("consumption_current_month", current, &["FirstValue", "Value"]);
                values.consumption_current_month_label = Some(label(current));
            }
            if let Some(previous) = points.len().checked_sub(2).and_then(|i| points.get(i)) {
                values.consumption_previous_month =
                    point_number("consumption_previous_month", previous, &["FirstValue", "Value"]);
            }
        }

        if let Some(last) = snapshot
            .get(SnapshotKey::Billed)
            .and_then(Value::as_array)
            .and_then(|items| items.last())
        {
            values.billed_last_value = point_number("billed_last_value", last, &["Value"]);
            values.billed_last_label = Some(label(last));
        }

        if let Some(info) = snapshot.get(SnapshotKey::BillingInfo).and_then(Value::as_object) {
            let invoice = first_truthy(info, &INVOICE_KEYS).and_then(Value::as_object);
            values.debt_total = debt_total(info, invoice);
            values.next_due_date = invoice
                .and_then(|inv| first_truthy(inv, &DUE_DATE_KEYS))
                .or_else(|| first_truthy(info, &DUE_DATE_KEYS))
                .and_then(|v| parse_date("next_due_date", v));
        }

        values
    }
}

/// Graph points either wrapped in `{"Values": [...]}` or sent as a bare array
fn consumption_points(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get("Values").and_then(Value::as_array),
        _ => None,
    }
}

/// First key whose value is present, non-null and non-empty
fn first_truthy<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| is_truthy(v))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

/// Value of the first key present on a graph point
///
/// The portal omits the value for periods without consumption, so a point
/// lacking every key counts as zero.
fn point_number(field: &str, point: &Value, keys: &[&str]) -> Option<f64> {
    let map = point.as_object()?;
    match keys.iter().find_map(|k| map.get(*k)) {
        Some(value) => parse_decimal(field, value),
        None => Some(0.0),
    }
}

fn label(point: &Value) -> String {
    point
        .get("Label")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn debt_total(info: &Map<String, Value>, invoice: Option<&Map<String, Value>>) -> Option<f64> {
    if let Some(v) = DEBT_KEYS.iter().find_map(|k| info.get(*k)) {
        return parse_decimal("debt_total", v);
    }
    let invoice = invoice?;
    INVOICE_DEBT_KEYS
        .iter()
        .find_map(|k| invoice.get(*k))
        .and_then(|v| parse_decimal("debt_total", v))
}

/// Parse a JSON number or a string like `"1 234,56"`
pub fn parse_decimal(field: &str, value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    if parsed.is_none() {
        debug!("[SENSORS] Could not parse {} from {}", field, value);
    }
    parsed
}

/// Parse a `YYYY-MM-DD` date, ignoring any time part after `T`
pub fn parse_date(field: &str, value: &Value) -> Option<NaiveDate> {
    let parsed = value.as_str().and_then(|s| {
        let date = s.split('T').next().unwrap_or(s);
        NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()
    });
    if parsed.is_none() {
        debug!("[SENSORS] Could not parse {} from {}", field, value);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn snapshot(entries: Vec<(SnapshotKey, Value)>) -> UpdateSnapshot {
        UpdateSnapshot {
            fetched_at: Utc::now(),
            data: entries.into_iter().collect::<BTreeMap<_, _>>(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_full_snapshot() {
        let snap = snapshot(vec![
            (
                SnapshotKey::LastReading,
                json!({"Value": "1 234,5", "LastReadingDate": "2025-03-14"}),
            ),
            (
                SnapshotKey::Consumptions,
                json!({"Values": [
                    {"Label": "Jan", "FirstValue": 7},
                    {"Label": "Fev", "FirstValue": "8,25"},
                    {"Label": "Mar", "Value": 9.5}
                ]}),
            ),
            (
                SnapshotKey::Billed,
                json!([{"Label": "Fev", "Value": "20,1"}, {"Label": "Mar", "Value": "21,40"}]),
            ),
            (
                SnapshotKey::BillingInfo,
                json!({"nextInvoice": {"valor": "12,30", "limitDate": "2025-04-20"}}),
            ),
        ]);

        let values = SensorValues::from_snapshot(&snap);

        assert_eq!(values.last_reading_value, Some(1234.5));
        assert_eq!(values.last_reading_date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(values.consumption_current_month, Some(9.5));
        assert_eq!(values.consumption_previous_month, Some(8.25));
        assert_eq!(values.consumption_current_month_label.as_deref(), Some("Mar"));
        assert_eq!(values.billed_last_value, Some(21.4));
        assert_eq!(values.billed_last_label.as_deref(), Some("Mar"));
        assert_eq!(values.debt_total, Some(12.3));
        assert_eq!(values.next_due_date, NaiveDate::from_ymd_opt(2025, 4, 20));
    }

    #[test]
    fn test_missing_datasets_yield_none() {
        let snap = snapshot(vec![(SnapshotKey::Billed, json!([]))]);

        assert_eq!(SensorValues::from_snapshot(&snap), SensorValues::default());
    }

    #[test]
    fn test_bare_consumption_array_with_single_point() {
        let snap = snapshot(vec![(
            SnapshotKey::Consumptions,
            json!([{"Label": "Abr", "FirstValue": 0}]),
        )]);

        let values = SensorValues::from_snapshot(&snap);

        assert_eq!(values.consumption_current_month, Some(0.0));
        assert_eq!(values.consumption_previous_month, None);
    }

    #[test]
    fn test_graph_points_without_value_count_as_zero() {
        let snap = snapshot(vec![
            (
                SnapshotKey::Consumptions,
                json!({"Values": [{"Label": "Jan", "Value": "3,5"}, {"Label": "Fev"}]}),
            ),
            (SnapshotKey::Billed, json!([{"Label": "Fev"}])),
        ]);

        let values = SensorValues::from_snapshot(&snap);

        assert_eq!(values.consumption_current_month, Some(0.0));
        assert_eq!(values.consumption_current_month_label.as_deref(), Some("Fev"));
        assert_eq!(values.consumption_previous_month, Some(3.5));
        assert_eq!(values.billed_last_value, Some(0.0));
        assert_eq!(values.billed_last_label.as_deref(), Some("Fev"));
    }

    #[test]
    fn test_debt_prefers_top_level_keys_and_portuguese_invoice() {
        let top = snapshot(vec![(
            SnapshotKey::BillingInfo,
            json!({"valorEmDivida": "45,00", "proximaFatura": {"valor": 1, "dataLimite": "2025-05-02"}}),
        )]);
        let values = SensorValues::from_snapshot(&top);
        assert_eq!(values.debt_total, Some(45.0));
        assert_eq!(values.next_due_date, NaiveDate::from_ymd_opt(2025, 5, 2));

        let fallback = snapshot(vec![(
            SnapshotKey::BillingInfo,
            json!({"dataLimite": "2025-06-01T00:00:00"}),
        )]);
        let values = SensorValues::from_snapshot(&fallback);
        assert_eq!(values.debt_total, None);
        assert_eq!(values.next_due_date, NaiveDate::from_ymd_opt(2025, 6, 1));
    }

    #[test]
    fn test_unparseable_values() {
        assert_eq!(parse_decimal("x", &json!("n/a")), None);
        assert_eq!(parse_decimal("x", &Value::Null), None);
        assert_eq!(parse_date("x", &json!("14/03/2025")), None);
        assert_eq!(parse_date("x", &json!(20250314)), None);
    }
}
