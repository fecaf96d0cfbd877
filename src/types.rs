use crate::error::{EtlError, Result};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use std::fmt;

/// One cell of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a SQLite value, rejecting blobs.
    pub fn from_sql_ref(value: ValueRef<'_>, column: &str) -> Result<Self> {
        match value {
            ValueRef::Null => Ok(Scalar::Null),
            ValueRef::Integer(i) => Ok(Scalar::Integer(i)),
            ValueRef::Real(f) => Ok(Scalar::Real(f)),
            ValueRef::Text(bytes) => Ok(Scalar::Text(String::from_utf8_lossy(bytes).into_owned())),
            ValueRef::Blob(_) => Err(EtlError::UnsupportedValue {
                column: column.to_string(),
            }),
        }
    }
}

impl fmt::Display for Scalar {
    /// Flat-file rendering: null is the empty string, reals keep a decimal point.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Real(r) => f.write_str(&format_real(*r)),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Shortest round-trip form with a decimal point, exponents padded to two
/// digits with an explicit sign (`2.35e-05`, `1e+16`).
fn format_real(value: f64) -> String {
    let repr = format!("{value:?}");
    match repr.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => {
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.abs())
            }
            Err(_) => repr,
        },
        None => repr,
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<Option<String>> for Scalar {
    fn from(s: Option<String>) -> Self {
        s.map(Scalar::Text).unwrap_or(Scalar::Null)
    }
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(Value::Null),
            Scalar::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Scalar::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            Scalar::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// Ordered rows sharing one column list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordBatch {
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

/// Borrowed view of one row that resolves values by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [Scalar],
}

impl<'a> RowRef<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Scalar> {
        let values = self.values;
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &values[i])
    }

    /// Like `get`, but a column the batch does not have is an error.
    pub fn require(&self, column: &str) -> Result<&'a Scalar> {
        self.get(column)
            .ok_or_else(|| EtlError::MissingField(column.to_string()))
    }

    pub fn values(&self) -> &'a [Scalar] {
        self.values
    }
}

impl RecordBatch {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Scalar>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EtlError::Shape(format!(
                "row has {} values but batch has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |values| RowRef {
            columns: &self.columns,
            values,
        })
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&Scalar>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| EtlError::MissingField(name.to_string()))?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Append a computed column, evaluated once per row.
    pub fn with_column<F>(mut self, name: &str, mut derive: F) -> Result<Self>
    where
        F: FnMut(RowRef<'_>) -> Result<Scalar>,
    {
        let mut derived = Vec::with_capacity(self.rows.len());
        for values in &self.rows {
            derived.push(derive(RowRef {
                columns: &self.columns,
                values,
            })?);
        }
        for (row, value) in self.rows.iter_mut().zip(derived) {
            row.push(value);
        }
        self.columns.push(name.to_string());
        Ok(self)
    }

    /// Project onto `names`, in that order.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n)
                    .ok_or_else(|| EtlError::MissingField(n.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }
}

/// One edge of a many-to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRow {
    pub left: String,
    pub right: String,
}

impl JoinRow {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordBatch {
        let mut batch = RecordBatch::new(["uri", "plays"]);
        batch
            .push_row(vec!["spotify:track:a".into(), Scalar::Integer(3)])
            .unwrap();
        batch
            .push_row(vec!["spotify:track:b".into(), Scalar::Null])
            .unwrap();
        batch
    }

    #[test]
    fn rejects_rows_with_wrong_width() {
        let mut batch = RecordBatch::new(["a", "b"]);
        let err = batch.push_row(vec![Scalar::Null]).unwrap_err();
        assert!(matches!(err, EtlError::Shape(_)));
        assert!(err.to_string().starts_with("Row shape mismatch"));
        assert!(batch.is_empty());
    }

    #[test]
    fn with_column_appends_derived_values() {
        let batch = sample()
            .with_column("doubled", |row| {
                Ok(match row.require("plays")? {
                    Scalar::Integer(p) => Scalar::Integer(p * 2),
                    _ => Scalar::Null,
                })
            })
            .unwrap();

        assert_eq!(batch.columns(), ["uri", "plays", "doubled"]);
        let doubled = batch.column("doubled").unwrap();
        assert_eq!(doubled, vec![&Scalar::Integer(6), &Scalar::Null]);
    }

    #[test]
    fn select_reorders_and_prunes() {
        let batch = sample().select(&["plays", "uri"]).unwrap();
        assert_eq!(batch.columns(), ["plays", "uri"]);
        let first = batch.rows().next().unwrap();
        assert_eq!(first.values()[0], Scalar::Integer(3));

        assert!(matches!(
            sample().select(&["missing"]),
            Err(EtlError::MissingField(_))
        ));
    }

    #[test]
    fn display_renders_flat_file_fields() {
        assert_eq!(Scalar::Null.to_string(), "");
        assert_eq!(Scalar::Integer(42).to_string(), "42");
        assert_eq!(Scalar::Real(0.5).to_string(), "0.5");
        assert_eq!(Scalar::Real(1.0).to_string(), "1.0");
        assert_eq!(Scalar::Real(0.0001).to_string(), "0.0001");
        assert_eq!(Scalar::Real(2.35e-5).to_string(), "2.35e-05");
        assert_eq!(Scalar::Real(1e16).to_string(), "1e+16");
        assert_eq!(Scalar::Real(-3.1e-120).to_string(), "-3.1e-120");
        assert_eq!(Scalar::from("x").to_string(), "x");
    }
}
