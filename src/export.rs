use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use rust_xlsxwriter::{Workbook, XlsxError};
use tracing::info;

use crate::db::{self, DATE_COLUMN, PARTICIPANT_COLUMN};
use crate::error::Result;
use crate::pivot::{WideRow, WideTable};
use crate::settings::{DateStyle, GroupingMode};

const FILE_PREFIX: &str = "timeseries_data";

/// Partition rows by calendar period. Every group keeps the full column set.
pub fn group_rows(table: &WideTable, mode: GroupingMode) -> Vec<(String, WideTable)> {
    let mut groups: BTreeMap<String, Vec<WideRow>> = BTreeMap::new();
    for row in &table.rows {
        let key = match mode {
            GroupingMode::Month => row.date.format("%Y-%m").to_string(),
            GroupingMode::Week => row.date.format("W%U_%Y").to_string(),
            GroupingMode::Ungrouped => "All".to_string(),
        };
        groups.entry(key).or_default().push(row.clone());
    }
    groups
        .into_iter()
        .map(|(key, rows)| {
            (
                key,
                WideTable {
                    parameters: table.parameters.clone(),
                    rows,
                },
            )
        })
        .collect()
}

pub fn output_file_name(group: &str, style: DateStyle, stamp: &str, ext: &str) -> String {
    format!("{FILE_PREFIX}_{group}_{style}_{stamp}.{ext}")
}

pub trait TableWriter {
    /// Persist one group; returns a description of where it went.
    fn write_group(&mut self, group: &str, table: &WideTable) -> Result<String>;
}

/// One CSV file per group inside the output folder.
pub struct CsvWriter {
    folder: PathBuf,
    style: DateStyle,
    stamp: String,
}

impl CsvWriter {
    pub fn new(folder: &Path, style: DateStyle, stamp: &str) -> Result<Self> {
        fs::create_dir_all(folder)?;
        Ok(CsvWriter {
            folder: folder.to_path_buf(),
            style,
            stamp: stamp.to_string(),
        })
    }
}

impl TableWriter for CsvWriter {
    fn write_group(&mut self, group: &str, table: &WideTable) -> Result<String> {
        let path = self
            .folder
            .join(output_file_name(group, self.style, &self.stamp, "csv"));
        let mut wtr = csv::Writer::from_path(&path)?;

        let mut header = vec![PARTICIPANT_COLUMN, DATE_COLUMN];
        header.extend(table.parameters.iter().map(String::as_str));
        wtr.write_record(&header)?;

        for row in &table.rows {
            let date = row.date.format("%Y-%m-%d").to_string();
            let mut record = vec![row.participant_id.as_str(), date.as_str()];
            record.extend(row.values.iter().map(|v| v.as_deref().unwrap_or("")));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;

        info!(path = %path.display(), rows = table.rows.len(), "wrote csv");
        Ok(path.display().to_string())
    }
}

/// One workbook per group, a single sheet with the same layout as the CSV.
pub struct XlsxWriter {
    folder: PathBuf,
    style: DateStyle,
    stamp: String,
}

impl XlsxWriter {
    pub fn new(folder: &Path, style: DateStyle, stamp: &str) -> Result<Self> {
        fs::create_dir_all(folder)?;
        Ok(XlsxWriter {
            folder: folder.to_path_buf(),
            style,
            stamp: stamp.to_string(),
        })
    }
}

fn cell(row: usize, col: usize) -> std::result::Result<(u32, u16), XlsxError> {
    let row = u32::try_from(row).map_err(|_| XlsxError::RowColumnLimitError)?;
    let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
    Ok((row, col))
}

impl TableWriter for XlsxWriter {
    fn write_group(&mut self, group: &str, table: &WideTable) -> Result<String> {
        let path = self
            .folder
            .join(output_file_name(group, self.style, &self.stamp, "xlsx"));
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();

        let header = [PARTICIPANT_COLUMN, DATE_COLUMN]
            .into_iter()
            .chain(table.parameters.iter().map(String::as_str));
        for (col, name) in header.enumerate() {
            let (r, c) = cell(0, col)?;
            sheet.write_string(r, c, name)?;
        }

        for (i, row) in table.rows.iter().enumerate() {
            let (r, _) = cell(i + 1, 0)?;
            sheet.write_string(r, 0, row.participant_id.as_str())?;
            sheet.write_string(r, 1, row.date.format("%Y-%m-%d").to_string())?;
            for (j, value) in row.values.iter().enumerate() {
                // Absent cells stay blank.
                if let Some(value) = value {
                    let (_, c) = cell(0, j + 2)?;
                    sheet.write_string(r, c, value.as_str())?;
                }
            }
        }
        workbook.save(&path)?;

        info!(path = %path.display(), rows = table.rows.len(), "wrote xlsx");
        Ok(path.display().to_string())
    }
}

/// All groups as tables `timeseries_<group>` of one SQLite file.
pub struct SqliteWriter {
    conn: Connection,
    path: PathBuf,
}

impl SqliteWriter {
    pub fn new(folder: &Path, style: DateStyle, stamp: &str) -> Result<Self> {
        fs::create_dir_all(folder)?;
        let path = folder.join(format!("{FILE_PREFIX}_{style}_{stamp}.sqlite"));
        let conn = db::connect(&path)?;
        Ok(SqliteWriter { conn, path })
    }
}

impl TableWriter for SqliteWriter {
    fn write_group(&mut self, group: &str, table: &WideTable) -> Result<String> {
        let table_name = format!("timeseries_{group}");
        let rows = db::write_table(&self.conn, &table_name, table)?;
        info!(path = %self.path.display(), table = %table_name, rows, "wrote sqlite table");
        Ok(format!("{}#{}", self.path.display(), table_name))
    }
}

/// Split `table` per `mode` and hand every group to `writer`, in group order.
pub fn export(table: &WideTable, mode: GroupingMode, writer: &mut dyn TableWriter) -> Result<Vec<String>> {
    group_rows(table, mode)
        .iter()
        .map(|(group, part)| writer.write_group(group, part))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(pid: &str, y: i32, m: u32, d: u32, values: Vec<Option<&str>>) -> WideRow {
        WideRow {
            participant_id: pid.into(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            values: values.into_iter().map(|v| v.map(str::to_string)).collect(),
        }
    }

    fn sample() -> WideTable {
        WideTable {
            parameters: vec!["Energy".into(), "Mood".into()],
            rows: vec![
                row("p1", 2020, 6, 30, vec![Some("5 / 10"), None]),
                row("p1", 2020, 7, 1, vec![Some("6 / 10"), Some("ok")]),
                row("p2", 2020, 7, 6, vec![None, Some("tired")]),
            ],
        }
    }

    #[test]
    fn group_by_month() {
        let groups = group_rows(&sample(), GroupingMode::Month);
        let keys: Vec<_> = groups.iter().map(|(k, t)| (k.as_str(), t.rows.len())).collect();
        assert_eq!(keys, vec![("2020-06", 1), ("2020-07", 2)]);
        assert!(groups.iter().all(|(_, t)| t.parameters.len() == 2));
    }

    #[test]
    fn group_by_sunday_week() {
        // 2020-06-30 and 2020-07-01 share the week starting Sunday 28 June;
        // 2020-07-06 (a Monday) falls in the next one.
        let groups = group_rows(&sample(), GroupingMode::Week);
        let keys: Vec<_> = groups.iter().map(|(k, t)| (k.as_str(), t.rows.len())).collect();
        assert_eq!(keys, vec![("W26_2020", 2), ("W27_2020", 1)]);
    }

    #[test]
    fn ungrouped_is_single_all() {
        let groups = group_rows(&sample(), GroupingMode::Ungrouped);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, "All");
        assert_eq!(groups[0].1, sample());
    }

    #[test]
    fn file_name_layout() {
        assert_eq!(
            output_file_name("2020-07", DateStyle::Eu, "20250701_120000", "csv"),
            "timeseries_data_2020-07_EU_20250701_120000.csv"
        );
    }

    #[test]
    fn csv_leaves_absent_cells_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = CsvWriter::new(dir.path(), DateStyle::Us, "stamp").unwrap();
        let written = export(&sample(), GroupingMode::Ungrouped, &mut writer).unwrap();
        assert_eq!(written.len(), 1);

        let text = std::fs::read_to_string(dir.path().join("timeseries_data_All_US_stamp.csv")).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Participant ID,Date,Energy,Mood");
        assert_eq!(lines[1], "p1,2020-06-30,5 / 10,");
        assert_eq!(lines[3], "p2,2020-07-06,,tired");
    }

    #[test]
    fn xlsx_one_workbook_per_group() {
        use calamine::{open_workbook_auto, Data, Reader};

        let dir = tempfile::tempdir().unwrap();
        let mut writer = XlsxWriter::new(dir.path(), DateStyle::Eu, "stamp").unwrap();
        let written = export(&sample(), GroupingMode::Month, &mut writer).unwrap();
        assert_eq!(written.len(), 2);

        let mut workbook =
            open_workbook_auto(dir.path().join("timeseries_data_2020-07_EU_stamp.xlsx")).unwrap();
        let sheet = workbook.sheet_names()[0].clone();
        let range = workbook.worksheet_range(&sheet).unwrap();
        let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], Data::String("Participant ID".into()));
        assert_eq!(rows[0][3], Data::String("Mood".into()));
        assert_eq!(rows[1][1], Data::String("2020-07-01".into()));
        assert_eq!(rows[2][2], Data::Empty);
        assert_eq!(rows[2][3], Data::String("tired".into()));
        assert!(dir.path().join("timeseries_data_2020-06_EU_stamp.xlsx").exists());
    }

    #[test]
    fn sqlite_one_table_per_group() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SqliteWriter::new(dir.path(), DateStyle::Eu, "stamp").unwrap();
        let written = export(&sample(), GroupingMode::Month, &mut writer).unwrap();
        assert_eq!(written.len(), 2);

        let conn = Connection::open(dir.path().join("timeseries_data_EU_stamp.sqlite")).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM \"timeseries_2020-07\"", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);
    }
}
