use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, WsdError};
use crate::extractor::LineRecord;
use crate::registry::WordId;
use crate::source::DataLines;

/// Marker written for a feature slot with no word.
pub const MISSING: &str = "?";

const COMMENT: &str = "#";

/// One numeric row: the feature slots followed by the class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub features: Vec<Option<WordId>>,
    pub class: u32,
}

impl IndexRow {
    /// Renders every column as text, class last.
    pub fn cells(&self) -> Vec<String> {
        let mut cells: Vec<String> = self
            .features
            .iter()
            .map(|slot| match slot {
                Some(id) => id.to_string(),
                None => MISSING.to_string(),
            })
            .collect();
        cells.push(self.class.to_string());
        cells
    }
}

/// Intermediate numeric form of the extracted records.
///
/// The text layout is a feature count line, a class count line, then one row
/// per record. Lines starting with `#` are comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFile {
    pub feature_count: usize,
    pub class_count: u32,
    pub rows: Vec<IndexRow>,
}

impl IndexFile {
    /// Builds the index of `records` for a window of `radius` words per side.
    /// The class count is the largest class label among the records.
    ///
    /// # Errors
    /// Returns [`WsdError::InvalidSense`] if a record's class label is not a
    /// positive integer.
    pub fn from_records(records: &[LineRecord], radius: usize) -> Result<Self> {
        let rows = records
            .iter()
            .map(|record| {
                Ok(IndexRow {
                    features: record.feature_vector(radius),
                    class: record.class_label()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let class_count = rows.iter().map(|row| row.class).max().unwrap_or(0);

        Ok(IndexFile {
            feature_count: radius * 2,
            class_count,
            rows,
        })
    }

    /// Declares `class_count` classes instead of the largest label seen, so
    /// that files built from different corpora share one class attribute.
    ///
    /// # Errors
    /// Returns [`WsdError::InvalidIndex`] if a row's class exceeds `class_count`.
    pub fn with_class_count(mut self, class_count: u32) -> Result<Self> {
        if let Some(row) = self.rows.iter().find(|row| row.class > class_count) {
            return Err(WsdError::InvalidIndex(format!(
                "class {} exceeds the declared class count {}",
                row.class, class_count
            )));
        }
        self.class_count = class_count;
        Ok(self)
    }

    /// Writes the index to `path`, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{} feature count", COMMENT)?;
        writeln!(writer, "{}", self.feature_count)?;
        writeln!(writer, "{} class count", COMMENT)?;
        writeln!(writer, "{}", self.class_count)?;
        writeln!(writer, "{} data", COMMENT)?;
        for row in &self.rows {
            writeln!(writer, "{}", row.cells().join(" "))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads an index file.
    ///
    /// # Errors
    /// Returns [`WsdError::InvalidIndex`] if a count is missing or not a
    /// number, a row has the wrong number of columns, a feature is neither an
    /// id nor `?`, or a class lies outside `1..=class_count`.
    pub fn read(path: &Path) -> Result<Self> {
        let mut lines = DataLines::open(path, Some(COMMENT))?;

        let feature_count: usize = parse_count(lines.next().transpose()?, "feature count")?;
        let class_count: u32 = parse_count(lines.next().transpose()?, "class count")?;

        let mut rows = Vec::new();
        for (number, line) in lines.enumerate() {
            let line = line?;
            let cells: Vec<&str> = line.split_whitespace().collect();
            if cells.len() != feature_count + 1 {
                return Err(WsdError::InvalidIndex(format!(
                    "row {} has {} columns, expected {}",
                    number + 1,
                    cells.len(),
                    feature_count + 1
                )));
            }

            let class_cell = cells[feature_count];
            let features = cells[..feature_count]
                .iter()
                .map(|cell| parse_feature(cell))
                .collect::<Result<Vec<_>>>()?;
            let class = class_cell
                .parse::<u32>()
                .ok()
                .filter(|class| (1..=class_count).contains(class))
                .ok_or_else(|| {
                    WsdError::InvalidIndex(format!(
                        "row {} has class {:?} outside 1..={}",
                        number + 1,
                        class_cell,
                        class_count
                    ))
                })?;

            rows.push(IndexRow { features, class });
        }

        Ok(IndexFile {
            feature_count,
            class_count,
            rows,
        })
    }
}

fn parse_count<T: std::str::FromStr>(line: Option<String>, what: &str) -> Result<T> {
    let line = line.ok_or_else(|| WsdError::InvalidIndex(format!("missing {what}")))?;
    line.parse::<T>()
        .map_err(|_| WsdError::InvalidIndex(format!("{what} {line:?} is not a number")))
}

fn parse_feature(cell: &str) -> Result<Option<WordId>> {
    if cell == MISSING {
        return Ok(None);
    }
    match cell.parse::<WordId>() {
        Ok(id) if id > 0 => Ok(Some(id)),
        _ => Err(WsdError::InvalidIndex(format!(
            "feature {cell:?} is not a word id"
        ))),
    }
}
