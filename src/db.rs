use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::pivot::WideTable;

pub const PARTICIPANT_COLUMN: &str = "Participant ID";
pub const DATE_COLUMN: &str = "Date";

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Replace `table_name` with the contents of `table`: every column is TEXT,
/// dates are ISO `YYYY-MM-DD` and absent cells are NULL.
pub fn write_table(conn: &Connection, table_name: &str, table: &WideTable) -> Result<usize> {
    let columns: Vec<String> = [PARTICIPANT_COLUMN, DATE_COLUMN]
        .into_iter()
        .chain(table.parameters.iter().map(String::as_str))
        .map(quote_ident)
        .collect();
    let name = quote_ident(table_name);

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {name};
         CREATE TABLE {name} ({});",
        columns
            .iter()
            .map(|c| format!("{c} TEXT"))
            .collect::<Vec<_>>()
            .join(", ")
    ))?;

    let mut count = 0;
    {
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {name} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        ))?;
        for row in &table.rows {
            let mut values: Vec<Option<String>> = Vec::with_capacity(columns.len());
            values.push(Some(row.participant_id.clone()));
            values.push(Some(row.date.format("%Y-%m-%d").to_string()));
            values.extend(row.values.iter().cloned());
            count += stmt.execute(rusqlite::params_from_iter(values))?;
        }
    }
    tx.commit()?;
    Ok(count)
}
