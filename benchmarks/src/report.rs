// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! One table out of the collections produced by the runners.

use std::fmt;
use std::io::Write;

use crate::record::{Record, ResultCollection, Value};
use crate::{Error, Result};

static MISSING: Value = Value::Missing;

#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Report {
    /// Concatenates `collections` in order. Columns are the union of every
    /// record's columns, in first-seen order.
    pub fn new<I: IntoIterator<Item = ResultCollection>>(collections: I) -> Result<Self> {
        let mut collections = collections.into_iter().peekable();
        if collections.peek().is_none() {
            return Err(Error::MissingResults);
        }

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        for record in collections.flatten() {
            for column in record.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
            rows.push(record);
        }

        Ok(Report { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// The value at `row`/`column`, `Missing` where the record has none.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows
            .get(row)
            .map(|r| r.get(column).unwrap_or(&MISSING))
    }

    fn row_strings<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = String> + 'a {
        self.columns
            .iter()
            .map(move |c| record.get(c).map(Value::to_string).unwrap_or_default())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns).map_err(Error::ReportCsv)?;
        for record in &self.rows {
            wtr.write_record(self.row_strings(record))
                .map_err(Error::ReportCsv)?;
        }
        wtr.flush().map_err(Error::ReportIo)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| self.row_strings(r).collect())
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                cells
                    .iter()
                    .map(|row| row[i].len())
                    .chain(std::iter::once(c.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |f: &mut fmt::Formatter, row: &[String]| -> fmt::Result {
            let padded: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{cell:<width$}"))
                .collect();
            writeln!(f, "{}", padded.join("  ").trim_end())
        };

        line(f, &self.columns)?;
        for row in &cells {
            line(f, row)?;
        }
        Ok(())
    }
}
