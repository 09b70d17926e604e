//! Fuse bonus values from the item spreadsheet export.
//!
//! The first worksheet holds one item per row after a header:
//! item name, price, fuse bonus.

use std::{fmt::Debug, path::Path};

use anyhow::{anyhow, Context};
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info};

use crate::tables::PrimaryFuseTable;

#[derive(Clone, PartialEq, Debug)]
pub struct SpreadsheetRow {
    pub item_name: Option<String>,
    pub price: Option<i64>,
    pub fuse_bonus: Option<i64>,
}

impl SpreadsheetRow {
    pub fn from_cells(cells: [Option<&Data>; 3]) -> Self {
        let [name, price, fuse_bonus] = cells;
        Self {
            item_name: name.and_then(cell_text),
            price: price.and_then(cell_integer),
            fuse_bonus: fuse_bonus.and_then(cell_integer),
        }
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Integer value of a cell; floats are truncated and text must parse as a whole number.
fn cell_integer(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(n) => Some(*n),
        Data::Float(n) if n.is_finite() => Some(n.trunc() as i64),
        Data::String(s) => s.trim().parse().ok(),
        Data::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

/// Every row of the first worksheet below the header.
pub fn read_rows(path: impl AsRef<Path>) -> anyhow::Result<Vec<SpreadsheetRow>> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("While trying to open {path:?} as a spreadsheet"))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("{path:?} contains no worksheet"))?
        .with_context(|| format!("While trying to read the first worksheet of {path:?}"))?;

    let Some((start_row, start_col)) = range.start() else {
        return Ok(vec![]);
    };
    let (end_row, _) = range.end().unwrap_or((start_row, start_col));
    let rows = (start_row.max(1)..=end_row)
        .map(|row| {
            let cell = |col: u32| range.get_value((row, col));
            SpreadsheetRow::from_cells([cell(0), cell(1), cell(2)])
        })
        .collect::<Vec<_>>();
    debug!("Read {} rows from {path:?}", rows.len());
    Ok(rows)
}

/// Normalized item name to fuse bonus. Rows without a name or a whole-number bonus are skipped.
pub fn fuse_table_from_rows(rows: impl IntoIterator<Item = SpreadsheetRow>) -> PrimaryFuseTable {
    let mut table = PrimaryFuseTable::default();
    for row in rows {
        match (row.item_name, row.fuse_bonus) {
            (Some(name), Some(bonus)) if !name.trim().is_empty() => table.insert(&name, bonus),
            (name, _) => debug!("Skipping spreadsheet row {name:?}"),
        }
    }
    table
}

pub fn load_fuse_table(path: impl AsRef<Path> + Debug) -> anyhow::Result<PrimaryFuseTable> {
    let table = fuse_table_from_rows(read_rows(&path)?);
    info!("Loaded {} entries from {path:?}.", table.len());
    Ok(table)
}
