//! Stripe to Paddle identifier remapping.
//!
//! Once prices and discounts exist in Paddle, the extracted CSV still refers
//! to Stripe IDs. A reference file pairs each Stripe ID with its Paddle
//! counterpart:
//!
//! ```text
//! stripe_price_id,paddle_price_id,stripe_discount_id,paddle_discount_id
//! price_1Nabc,pri_01h8x,Q1,dsc_01h8y
//! ```
//!
//! [`CsvTable`] rewrites every `price_id_*` cell and the `discount_id` cell
//! through an [`IdMapping`], leaving unknown IDs untouched.

use std::{collections::HashMap, fs::File, io, path::Path};

use tracing::{debug, instrument};

use crate::{
    error::{MigrationError, Result},
    extract::{DISCOUNT_ID_COLUMN, PRICE_ID_PREFIX},
};

/// Which identifier family a mapping step rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// Price IDs in the `price_id_*` columns.
    Prices,
    /// Discount IDs in the `discount_id` column.
    Discounts,
}

impl MappingKind {
    /// Returns the `(stripe, paddle)` column names in the reference file.
    #[must_use]
    pub const fn reference_columns(self) -> (&'static str, &'static str) {
        match self {
            Self::Prices => ("stripe_price_id", "paddle_price_id"),
            Self::Discounts => ("stripe_discount_id", "paddle_discount_id"),
        }
    }
}

/// Lookup table from Stripe IDs to Paddle IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping(HashMap<String, String>);

impl IdMapping {
    /// Reads one mapping from reference CSV data.
    ///
    /// Rows with an empty Stripe ID are ignored, so blank cells in the
    /// extracted file are never rewritten. Later rows win over earlier
    /// rows with the same Stripe ID.
    ///
    /// # Examples
    ///
    /// ```
    /// use paddle_migration::remap::{IdMapping, MappingKind};
    ///
    /// let reference = "stripe_price_id,paddle_price_id,stripe_discount_id,paddle_discount_id\n\
    ///                  price_1,pri_01,,\n";
    /// let mapping = IdMapping::from_reader(reference.as_bytes(), MappingKind::Prices)?;
    /// assert_eq!(mapping.get("price_1"), Some("pri_01"));
    /// assert_eq!(mapping.len(), 1);
    /// # Ok::<(), paddle_migration::MigrationError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::InvalidInput`] if either column is missing and
    /// [`MigrationError::CsvError`] if the data is not valid CSV.
    pub fn from_reader<R: io::Read>(reader: R, kind: MappingKind) -> Result<Self> {
        let (key_column, value_column) = kind.reference_columns();
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let key_index = column_index(&headers, key_column)?;
        let value_index = column_index(&headers, value_column)?;

        let mut map = HashMap::new();
        for row in csv_reader.records() {
            let row = row?;
            let key = row.get(key_index).unwrap_or_default();
            if key.is_empty() {
                continue;
            }
            let value = row.get(value_index).unwrap_or_default();
            map.insert(key.to_owned(), value.to_owned());
        }

        Ok(Self(map))
    }

    /// Reads one mapping from a reference file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or parsed, see
    /// [`from_reader`](Self::from_reader).
    pub fn load<P: AsRef<Path>>(path: P, kind: MappingKind) -> Result<Self> {
        let mapping = Self::from_reader(File::open(path.as_ref())?, kind)?;
        debug!(path = %path.as_ref().display(), ?kind, entries = mapping.len(), "Loaded mapping");
        Ok(mapping)
    }

    /// Returns the Paddle ID for a Stripe ID.
    #[must_use]
    pub fn get(&self, stripe_id: &str) -> Option<&str> {
        self.0.get(stripe_id).map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rewrites one cell, returning `true` if it was mapped.
    fn apply(&self, cell: &mut String) -> bool {
        if cell.is_empty() {
            return false;
        }
        match self.0.get(cell.as_str()) {
            Some(mapped) => {
                cell.clone_from(mapped);
                true
            }
            None => false,
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IdMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .filter(|(k, _)| !k.is_empty())
                .collect(),
        )
    }
}

/// An extracted CSV held in memory for rewriting.
///
/// Column order and row order are preserved, so a table read and saved
/// without any mapping reproduces the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Reads a table from CSV data with a header row.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::CsvError`] if the data is not valid CSV or
    /// rows have differing lengths.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.iter().map(str::to_owned).collect();
        let rows = csv_reader
            .records()
            .map(|row| row.map(|r| r.iter().map(str::to_owned).collect::<Vec<_>>()))
            .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
        Ok(Self { headers, rows })
    }

    /// Reads a table from a file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or parsed.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let table = Self::from_reader(io::BufReader::new(File::open(path.as_ref())?))?;
        debug!(rows = table.rows.len(), columns = table.headers.len(), "Read table");
        Ok(table)
    }

    /// Writes the table as CSV.
    ///
    /// # Errors
    ///
    /// Returns error if writing fails.
    pub fn write<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.headers)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the table to a file, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write(io::BufWriter::new(File::create(path.as_ref())?))
    }

    /// Column names in file order.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows in file order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Rewrites every `price_id_*` cell, returning how many were mapped.
    pub fn map_prices(&mut self, mapping: &IdMapping) -> usize {
        let columns: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, name)| name.starts_with(PRICE_ID_PREFIX))
            .map(|(i, _)| i)
            .collect();
        self.map_columns(&columns, mapping)
    }

    /// Rewrites the `discount_id` column, returning how many cells were mapped.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::InvalidInput`] if the table has no
    /// `discount_id` column.
    pub fn map_discounts(&mut self, mapping: &IdMapping) -> Result<usize> {
        let column = self
            .headers
            .iter()
            .position(|name| name == DISCOUNT_ID_COLUMN)
            .ok_or_else(|| missing_column(DISCOUNT_ID_COLUMN))?;
        Ok(self.map_columns(&[column], mapping))
    }

    fn map_columns(&mut self, columns: &[usize], mapping: &IdMapping) -> usize {
        let mut mapped = 0;
        for row in &mut self.rows {
            for &column in columns {
                if let Some(cell) = row.get_mut(column)
                    && mapping.apply(cell)
                {
                    mapped += 1;
                }
            }
        }
        mapped
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers.iter().position(|h| h == name).ok_or_else(|| missing_column(name))
}

fn missing_column(name: &str) -> MigrationError {
    MigrationError::InvalidInput(format!("missing column '{name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTRACTED: &str = "\
customer_email,discount_id,price_id_1,quantity_1,price_id_2,quantity_2
a@example.com,Q1,price_a,1,price_b,2
b@example.com,,price_b,1,,
c@example.com,SUMMER,price_x,3,,
";

    const REFERENCE: &str = "\
stripe_price_id,paddle_price_id,stripe_discount_id,paddle_discount_id
price_a,pri_01a,Q1,dsc_01q
price_b,pri_01b,,
,pri_orphan,,dsc_orphan
";

    fn table() -> CsvTable {
        CsvTable::from_reader(EXTRACTED.as_bytes()).unwrap()
    }

    fn render(table: &CsvTable) -> String {
        let mut out = Vec::new();
        table.write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_unchanged_table_round_trips() {
        assert_eq!(render(&table()), EXTRACTED);
    }

    #[test]
    fn test_map_prices_rewrites_every_price_column() {
        let mapping = IdMapping::from_reader(REFERENCE.as_bytes(), MappingKind::Prices).unwrap();
        let mut table = table();

        let mapped = table.map_prices(&mapping);

        assert_eq!(mapped, 3);
        assert_eq!(table.rows()[0][2], "pri_01a");
        assert_eq!(table.rows()[0][4], "pri_01b");
        assert_eq!(table.rows()[1][2], "pri_01b");
        // Unmapped and blank cells pass through
        assert_eq!(table.rows()[2][2], "price_x");
        assert_eq!(table.rows()[1][4], "");
        // Discount column untouched
        assert_eq!(table.rows()[0][1], "Q1");
    }

    #[test]
    fn test_map_discounts() {
        let mapping = IdMapping::from_reader(REFERENCE.as_bytes(), MappingKind::Discounts).unwrap();
        let mut table = table();

        let mapped = table.map_discounts(&mapping).unwrap();

        assert_eq!(mapped, 1);
        assert_eq!(table.rows()[0][1], "dsc_01q");
        assert_eq!(table.rows()[1][1], "");
        assert_eq!(table.rows()[2][1], "SUMMER");
        assert_eq!(table.rows()[0][2], "price_a");
    }

    #[test]
    fn test_empty_reference_keys_are_ignored() {
        let prices = IdMapping::from_reader(REFERENCE.as_bytes(), MappingKind::Prices).unwrap();
        let discounts =
            IdMapping::from_reader(REFERENCE.as_bytes(), MappingKind::Discounts).unwrap();

        assert_eq!(prices.len(), 2);
        assert_eq!(prices.get(""), None);
        assert_eq!(discounts.len(), 1);
    }

    #[test]
    fn test_missing_reference_column() {
        let reference = "stripe_price_id,paddle_price_id\nprice_a,pri_01a\n";

        let result = IdMapping::from_reader(reference.as_bytes(), MappingKind::Discounts);

        match result {
            Err(MigrationError::InvalidInput(message)) => {
                assert!(message.contains("stripe_discount_id"));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        assert!(IdMapping::from_reader(reference.as_bytes(), MappingKind::Prices).is_ok());
    }

    #[test]
    fn test_missing_discount_column() {
        let mut table = CsvTable::from_reader("price_id_1,quantity_1\nprice_a,1\n".as_bytes())
            .unwrap();
        let mapping: IdMapping = [("Q1", "dsc_01q")].into_iter().collect();

        let result = table.map_discounts(&mapping);

        assert!(matches!(result, Err(MigrationError::InvalidInput(_))));
    }

    #[test]
    fn test_quoted_cells_survive() {
        let data = "customer_email,paused_at\nx@example.com,\"Enrich, or delete\"\n";
        let table = CsvTable::from_reader(data.as_bytes()).unwrap();

        assert_eq!(table.rows()[0][1], "Enrich, or delete");
        assert_eq!(render(&table), data);
    }

    #[test]
    fn test_from_iter_skips_empty_keys() {
        let mapping: IdMapping = [("", "pri_x"), ("price_a", "pri_a")].into_iter().collect();
        assert_eq!(mapping.len(), 1);
        assert!(!mapping.is_empty());
    }

    #[test]
    fn test_save_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapped.csv");
        let mut table = table();
        let mapping: IdMapping = [("price_x", "pri_0x")].into_iter().collect();
        table.map_prices(&mapping);

        table.save(&path).unwrap();
        let reread = CsvTable::read(&path).unwrap();

        assert_eq!(reread, table);
        assert_eq!(reread.rows()[2][2], "pri_0x");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = CsvTable::read("/nonexistent/paddle_migration_output.csv");
        assert!(matches!(result, Err(MigrationError::IoError(_))));
    }
}
