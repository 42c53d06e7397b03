//! Uploaded tables and strict batch reconciliation.
//!
//! A [`Table`] keeps every cell and header exactly as read so a batch can
//! be written back with one appended prediction column and otherwise
//! unchanged content. Column lookups use the trimmed header names.

use std::io::{Read, Write};
use std::path::Path;

use urgency_call_models::{InputColumns, RawCallRecord};

use crate::FeatureError;

/// A delimited-text table with a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Trimmed names used for lookups.
    headers: Vec<String>,
    /// Header cells as read, used when writing.
    raw_headers: Vec<String>,
    rows: Vec<Vec<String>>,
    delimiter: u8,
}

impl Table {
    /// Creates a comma-delimited table. Short rows are padded with empty
    /// cells to the header width.
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let raw_headers = headers.clone();
        let headers: Vec<String> = headers.iter().map(|h| h.trim().to_owned()).collect();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();

        Self {
            headers,
            raw_headers,
            rows,
            delimiter: b',',
        }
    }

    /// Sets the field delimiter used when writing.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Reads a table from delimited text whose first row is the header.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Csv`] if the text is not valid delimited
    /// data, or [`FeatureError::Parse`] if it has no header row.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self, FeatureError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();

        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(FeatureError::Parse {
                field: "uploaded table".to_owned(),
                value: String::new(),
                message: "file contains no header row".to_owned(),
            });
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.iter().map(str::to_owned).collect());
        }

        log::info!(
            "Read {} rows with {} columns from uploaded table",
            rows.len(),
            headers.len()
        );

        Ok(Self::new(headers, rows).with_delimiter(delimiter))
    }

    /// Reads a table from a file.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Io`] if the file cannot be opened, or any
    /// error from [`Self::from_reader`].
    pub fn from_path(path: &Path, delimiter: u8) -> Result<Self, FeatureError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, delimiter)
    }

    /// Writes the table, header first, with the table's delimiter. Headers
    /// are written as they were read.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Io`] if writing fails.
    pub fn write<W: Write>(&self, writer: W) -> Result<(), FeatureError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_writer(writer);

        writer.write_record(&self.raw_headers).map_err(write_error)?;
        for row in &self.rows {
            writer.write_record(row).map_err(write_error)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Writes the table to a file, replacing it if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Io`] if the file cannot be created, or any
    /// error from [`Self::write`].
    pub fn write_to_path(&self, path: &Path) -> Result<(), FeatureError> {
        let file = std::fs::File::create(path)?;
        self.write(std::io::BufWriter::new(file))
    }

    /// Returns the header row, trimmed.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Returns the data rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Returns the field delimiter.
    #[must_use]
    pub const fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Returns the number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the index of a column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Converts every data row into a [`RawCallRecord`].
    #[must_use]
    pub fn records(&self, columns: &InputColumns) -> Vec<RawCallRecord> {
        self.rows
            .iter()
            .map(|row| {
                RawCallRecord::from_row(
                    columns,
                    self.headers
                        .iter()
                        .map(String::as_str)
                        .zip(row.iter().map(String::as_str)),
                )
            })
            .collect()
    }

    /// Sets a column's values, appending the column if it does not exist
    /// and overwriting it if it does.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Configuration`] if `values` does not have
    /// one entry per data row.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<(), FeatureError> {
        if values.len() != self.rows.len() {
            return Err(FeatureError::configuration(format!(
                "column {name} has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }

        let index = self.column(name).unwrap_or_else(|| {
            self.headers.push(name.to_owned());
            self.raw_headers.push(name.to_owned());
            self.headers.len() - 1
        });

        for (row, value) in self.rows.iter_mut().zip(values) {
            if row.len() <= index {
                row.resize(index + 1, String::new());
            }
            row[index] = value;
        }

        Ok(())
    }
}

/// Failing to write output is a deployment problem, not bad input.
fn write_error(e: csv::Error) -> FeatureError {
    FeatureError::Io(e.into())
}

/// Checks that an uploaded table carries every required column.
///
/// Returns the table unchanged when it does, regardless of column order or
/// extra columns. Nothing is defaulted on this path.
///
/// # Errors
///
/// Returns [`FeatureError::SchemaMismatch`] naming every missing column, in
/// required order, so the file can be fixed in one pass.
pub fn reconcile_batch<'t, S: AsRef<str>>(
    table: &'t Table,
    required_columns: &[S],
) -> Result<&'t Table, FeatureError> {
    let missing: Vec<String> = required_columns
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter(|name| table.column(name).is_none())
        .map(str::to_owned)
        .collect();

    if missing.is_empty() {
        Ok(table)
    } else {
        Err(FeatureError::SchemaMismatch { missing })
    }
}

#[cfg(test)]
mod tests {
    use urgency_call_models::FieldValue;

    use super::*;

    const CSV: &str = "\
YEAR,NOTES,INITIAL_CALL_TYPE,INCIDENT_DURATION
2024,first,MVA,600
2025,\"second, quoted\",EDP,1200
";

    fn table() -> Table {
        Table::from_reader(CSV.as_bytes(), b',').unwrap()
    }

    #[test]
    fn reads_headers_and_rows() {
        let table = table();
        assert_eq!(
            table.headers(),
            ["YEAR", "NOTES", "INITIAL_CALL_TYPE", "INCIDENT_DURATION"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1][1], "second, quoted");
    }

    #[test]
    fn reconcile_is_identity_when_columns_present() {
        let table = table();
        let required = ["INCIDENT_DURATION", "YEAR"];
        let reconciled = reconcile_batch(&table, &required).unwrap();
        assert!(std::ptr::eq(reconciled, &table));
    }

    #[test]
    fn reconcile_lists_every_missing_column() {
        let table = table();
        let required = ["YEAR", "HOUR", "INCIDENT_DURATION", "DISPATCH_RESPONSE_SECONDS_QY"];
        let err = reconcile_batch(&table, &required).unwrap_err();
        match err {
            FeatureError::SchemaMismatch { missing } => {
                assert_eq!(missing, ["HOUR", "DISPATCH_RESPONSE_SECONDS_QY"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn records_split_configured_columns() {
        let records = table().records(&InputColumns::default());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].call_type(), Some("MVA"));
        assert_eq!(records[1].fields()["INCIDENT_DURATION"], FieldValue::from("1200"));
        assert!(!records[0].fields().contains_key("INITIAL_CALL_TYPE"));
    }

    #[test]
    fn appends_and_overwrites_columns() {
        let mut table = table();
        table
            .set_column("Predicted Urgency", vec!["Low".to_owned(), "High".to_owned()])
            .unwrap();
        assert_eq!(table.headers().last().unwrap(), "Predicted Urgency");
        assert_eq!(table.rows()[1][4], "High");

        table
            .set_column("Predicted Urgency", vec!["Medium".to_owned(), "Low".to_owned()])
            .unwrap();
        assert_eq!(table.headers().len(), 5);
        assert_eq!(table.rows()[0][4], "Medium");

        assert!(table.set_column("X", vec![String::new()]).is_err());
    }

    #[test]
    fn writes_back_with_same_delimiter() {
        let input = "A;B\n1;x y\n";
        let mut table = Table::from_reader(input.as_bytes(), b';').unwrap();
        table.set_column("P", vec!["High Urgency".to_owned()]).unwrap();

        let mut out = Vec::new();
        table.write(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "A;B;P\n1;x y;High Urgency\n");
    }

    #[test]
    fn headers_match_trimmed_and_write_as_read() {
        let mut table = Table::from_reader(" YEAR ,B\n2024,x\n".as_bytes(), b',').unwrap();
        assert_eq!(table.headers(), ["YEAR", "B"]);
        assert_eq!(table.column("YEAR"), Some(0));

        table.set_column("P", vec!["Low".to_owned()]).unwrap();
        let mut out = Vec::new();
        table.write(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), " YEAR ,B,P\n2024,x,Low\n");
    }

    #[test]
    fn write_failure_is_not_a_user_error() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let table = table();
        let err = table.write(Broken).unwrap_err();
        assert!(matches!(err, FeatureError::Io(_)));
        assert!(!err.is_user_error());
    }

    #[test]
    fn pads_short_rows() {
        let table = Table::from_reader("A,B,C\n1,2\n".as_bytes(), b',').unwrap();
        assert_eq!(table.rows()[0], ["1", "2", ""]);
    }

    #[test]
    fn rejects_missing_header() {
        assert!(Table::from_reader("".as_bytes(), b',').is_err());
    }
}
