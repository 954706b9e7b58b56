// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::fmt::{Display, Formatter};

#[cfg(feature = "aws")]
use crate::aws::S3Object;
#[cfg(feature = "aws")]
use crate::common::Error;

/// Bytes fetched when reading a CSV header from S3.
#[cfg(feature = "aws")]
const HEADER_READ_BYTES: usize = 64 * 1024;

/// What `LOAD DATA` does with rows that duplicate a unique key.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DuplicateRows {
    /// Keep the existing row.
    #[default]
    Ignore,
    /// Overwrite the existing row.
    Replace,
}

impl Display for DuplicateRows {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DuplicateRows::Ignore => "IGNORE",
            DuplicateRows::Replace => "REPLACE",
        })
    }
}

/// Delimited text layout shared by loads and unloads.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TextFormat {
    /// Column separator.
    pub fields_delimiter: String,
    /// Row separator.
    pub lines_delimiter: String,
    /// Character set name, e.g. `utf8`.
    pub encoding: String,
}

impl Default for TextFormat {
    fn default() -> Self {
        Self {
            fields_delimiter: ";".to_string(),
            lines_delimiter: "\n".to_string(),
            encoding: "utf8".to_string(),
        }
    }
}

impl TextFormat {
    fn write_clauses(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CHARACTER SET {} FIELDS TERMINATED BY '{}' LINES TERMINATED BY '{}'",
            self.encoding,
            escape(&self.fields_delimiter),
            escape(&self.lines_delimiter)
        )
    }
}

/// `LOAD DATA FROM S3` statement (Aurora MySQL) loading a delimited file into a table.
///
/// ```
/// # use oob::S3LoadStatement;
/// let statement = S3LoadStatement::new("bucket", "in/users.csv", "users")
///     .header("id;name");
/// assert!(statement.to_string().ends_with("IGNORE 1 LINES (id,name);"));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct S3LoadStatement {
    url: String,
    table: String,
    columns: Vec<String>,
    ignore_lines: u32,
    duplicates: DuplicateRows,
    format: TextFormat,
}

impl S3LoadStatement {
    /// Loads `s3://bucket/key` into `table`, skipping one header line.
    pub fn new(bucket: &str, key: &str, table: &str) -> Self {
        Self {
            url: format!("s3://{bucket}/{key}"),
            table: table.to_string(),
            columns: Vec::new(),
            ignore_lines: 1,
            duplicates: DuplicateRows::default(),
            format: TextFormat::default(),
        }
    }

    /// Like `new`, with the column list read from the object's header line.
    #[cfg(feature = "aws")]
    pub async fn from_object(object: &S3Object, table: &str) -> Result<Self, Error> {
        let header = object.first_line(HEADER_READ_BYTES).await?;
        Ok(Self::new(object.bucket_name(), object.key(), table).header(&header))
    }

    /// Target columns in file order.
    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Target columns taken from a header line split on the fields delimiter.
    pub fn header(mut self, header: &str) -> Self {
        self.columns = split_header(header, &self.format.fields_delimiter);
        self
    }

    /// Leading lines to skip.
    pub fn ignore_lines(mut self, ignore_lines: u32) -> Self {
        self.ignore_lines = ignore_lines;
        self
    }

    /// Handling of duplicate keys.
    pub fn duplicates(mut self, duplicates: DuplicateRows) -> Self {
        self.duplicates = duplicates;
        self
    }

    /// Text layout. Set it before `header` so the header is split with the same delimiter.
    pub fn format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }
}

impl Display for S3LoadStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LOAD DATA FROM S3 '{}' {} INTO TABLE {} ",
            escape(&self.url),
            self.duplicates,
            self.table
        )?;
        self.format.write_clauses(f)?;
        write!(f, " IGNORE {} LINES", self.ignore_lines)?;
        if !self.columns.is_empty() {
            write!(f, " ({})", self.columns.join(","))?;
        }
        f.write_str(";")
    }
}

/// `SELECT ... INTO OUTFILE S3` statement (Aurora MySQL) exporting a table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct S3UnloadStatement {
    url: String,
    table: String,
    format: TextFormat,
}

impl S3UnloadStatement {
    /// Exports every row of `table` to `s3://bucket/key`, overwriting existing files.
    pub fn new(bucket: &str, key: &str, table: &str) -> Self {
        Self {
            url: format!("s3://{bucket}/{key}"),
            table: table.to_string(),
            format: TextFormat::default(),
        }
    }

    /// Text layout.
    pub fn format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }
}

impl Display for S3UnloadStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SELECT * FROM {} INTO OUTFILE S3 '{}' ",
            self.table,
            escape(&self.url)
        )?;
        self.format.write_clauses(f)?;
        f.write_str(" OVERWRITE ON;")
    }
}

pub(crate) fn split_header(header: &str, delimiter: &str) -> Vec<String> {
    header
        .trim_start_matches('\u{feff}')
        .trim_end_matches(['\r', '\n'])
        .split(delimiter)
        .map(|column| column.trim().to_string())
        .filter(|column| !column.is_empty())
        .collect()
}

/// Quote a value for a single-quoted SQL string literal.
fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
