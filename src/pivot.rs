use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::parser::dates::parse_flexible_date;
use crate::parser::records::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideRow {
    pub participant_id: String,
    pub date: NaiveDate,
    /// Aligned with [`WideTable::parameters`]; `None` where nothing was recorded.
    pub values: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideTable {
    pub parameters: Vec<String>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    #[cfg(test)]
    pub fn get(&self, row: usize, parameter: &str) -> Option<&str> {
        let col = self.parameters.iter().position(|p| p == parameter)?;
        self.rows.get(row)?.values.get(col)?.as_deref()
    }
}

/// Cells observed under one raw date label, first value per parameter.
struct LabelGroup<'a> {
    participant_id: &'a str,
    date_label: &'a str,
    cells: BTreeMap<&'a str, &'a str>,
    records: usize,
}

/// Long → wide: one row per (participant, parsed date), one column per parameter.
///
/// Labels are visited in the order they first appear in `records`, so when two
/// labels land on the same calendar day the earlier one fills the cell.
pub fn pivot(records: &[Record], dayfirst: bool) -> Result<WideTable> {
    if records.is_empty() {
        return Err(PipelineError::NoRecords);
    }

    let mut parameters: BTreeSet<&str> = BTreeSet::new();
    let mut groups: Vec<LabelGroup> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for r in records {
        parameters.insert(&r.parameter);
        let key = (r.participant_id.as_str(), r.date_label.as_str());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(LabelGroup {
                participant_id: key.0,
                date_label: key.1,
                cells: BTreeMap::new(),
                records: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.records += 1;
        group.cells.entry(&r.parameter).or_insert(&r.value);
    }

    let mut parsed: HashMap<&str, Option<NaiveDate>> = HashMap::new();
    let mut rows: BTreeMap<(&str, NaiveDate), BTreeMap<&str, &str>> = BTreeMap::new();
    let mut dropped = 0usize;

    for group in &groups {
        let date = *parsed
            .entry(group.date_label)
            .or_insert_with(|| parse_flexible_date(group.date_label, dayfirst));
        let Some(date) = date else {
            warn!(
                participant = group.participant_id,
                label = group.date_label,
                records = group.records,
                "dropping block with unparseable date"
            );
            dropped += group.records;
            continue;
        };
        let row = rows.entry((group.participant_id, date)).or_default();
        for (&parameter, &value) in &group.cells {
            row.entry(parameter).or_insert(value);
        }
    }

    let parameters: Vec<String> = parameters.into_iter().map(str::to_string).collect();
    let rows: Vec<WideRow> = rows
        .into_iter()
        .map(|((participant_id, date), cells)| WideRow {
            participant_id: participant_id.to_string(),
            date,
            values: parameters
                .iter()
                .map(|p| cells.get(p.as_str()).map(|v| v.to_string()))
                .collect(),
        })
        .collect();

    debug!(
        rows = rows.len(),
        columns = parameters.len(),
        labels = groups.len(),
        dropped,
        "pivoted records"
    );

    Ok(WideTable { parameters, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pid: &str, label: &str, parameter: &str, value: &str) -> Record {
        Record {
            participant_id: pid.into(),
            date_label: label.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_input_is_fatal() {
        assert!(matches!(pivot(&[], true), Err(PipelineError::NoRecords)));
    }

    #[test]
    fn all_dates_unparseable_leaves_no_rows() {
        let records = vec![rec("p1", "someday", "Mood", "ok")];
        let table = pivot(&records, true).unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.parameters, vec!["Mood".to_string()]);
    }

    #[test]
    fn first_value_wins_for_same_date() {
        let records = vec![
            rec("p1", "Monday 13/07/2020", "Focus level", "7 / 10"),
            rec("p1", "Monday 13/07/2020", "Mood", "good"),
            rec("p1", "Monday 13/07/2020", "Focus level", "3 / 10"),
        ];
        let table = pivot(&records, true).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.get(0, "Focus level"), Some("7 / 10"));
        assert_eq!(table.get(0, "Mood"), Some("good"));
    }

    #[test]
    fn different_labels_same_day_merge_in_stream_order() {
        let records = vec![
            rec("p1", "monday 13/07/2020", "Focus level", "5 / 10"),
            rec("p1", "Monday 13/07/2020", "Focus level", "9 / 10"),
            rec("p1", "Monday 13/07/2020", "Mood", "tired"),
        ];
        let table = pivot(&records, true).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].date, ymd(2020, 7, 13));
        assert_eq!(table.get(0, "Focus level"), Some("5 / 10"));
        assert_eq!(table.get(0, "Mood"), Some("tired"));
    }

    #[test]
    fn drops_unparseable_rows_and_sorts() {
        let records = vec![
            rec("p2", "14/07/2020", "Mood", "ok"),
            rec("p1", "someday", "Mood", "lost"),
            rec("p1", "15/07/2020", "Energy", "6"),
            rec("p1", "13/07/2020", "Mood", "fine"),
        ];
        let table = pivot(&records, true).unwrap();
        assert_eq!(table.parameters, vec!["Energy".to_string(), "Mood".to_string()]);
        let keys: Vec<_> = table
            .rows
            .iter()
            .map(|r| (r.participant_id.as_str(), r.date))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("p1", ymd(2020, 7, 13)),
                ("p1", ymd(2020, 7, 15)),
                ("p2", ymd(2020, 7, 14)),
            ]
        );
        // Absent cells stay empty rather than defaulted.
        assert_eq!(table.get(0, "Energy"), None);
        assert_eq!(table.get(1, "Mood"), None);
        assert!(table.rows.iter().all(|r| r.values.iter().all(|v| v.as_deref() != Some("lost"))));
    }

    #[test]
    fn dayfirst_controls_reparse() {
        let records = vec![rec("p1", "03/04/2020", "Mood", "ok")];
        assert_eq!(pivot(&records, true).unwrap().rows[0].date, ymd(2020, 4, 3));
        assert_eq!(pivot(&records, false).unwrap().rows[0].date, ymd(2020, 3, 4));
    }

    #[test]
    fn every_record_survives_reshaping() {
        let records = vec![
            rec("p1", "13/07/2020", "Energy", "5 / 10"),
            rec("p1", "13/07/2020", "Tasks", "Drafted proposal, Sorted project files"),
            rec("p1", "14/07/2020", "Energy", "7 / 10"),
            rec("p2", "13/07/2020", "Notes", "Felt productive overall."),
        ];
        let table = pivot(&records, true).unwrap();
        for r in &records {
            let date = parse_flexible_date(&r.date_label, true).unwrap();
            let row = table
                .rows
                .iter()
                .position(|w| w.participant_id == r.participant_id && w.date == date)
                .unwrap();
            assert_eq!(table.get(row, &r.parameter), Some(r.value.as_str()));
        }
    }
}
