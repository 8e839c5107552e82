use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{Result, WsdError};
use crate::index::IndexFile;

/// Relation name used when none is given.
pub const DEFAULT_RELATION: &str = "wsd";

/// Writes the ARFF header: comment, relation, one numeric attribute per
/// feature, the nominal class attribute over `1..=class_count`, and the
/// start of the data section.
///
/// # Example
/// ```
/// use wsdprep::arff::write_header;
///
/// let mut out = Vec::new();
/// write_header(&mut out, 2, 2, "Comment", "wsd").unwrap();
/// assert_eq!(
///     String::from_utf8(out).unwrap(),
///     "% Comment\n@RELATION wsd\n@ATTRIBUTE f1 NUMERIC\n@ATTRIBUTE f2 NUMERIC\n@ATTRIBUTE class {1, 2}\n\n@DATA\n"
/// );
/// ```
pub fn write_header<W: Write>(
    writer: &mut W,
    feature_count: usize,
    class_count: u32,
    comment: &str,
    relation: &str,
) -> std::io::Result<()> {
    writeln!(writer, "% {}", comment)?;
    writeln!(writer, "@RELATION {}", relation)?;
    for index in 1..=feature_count {
        writeln!(writer, "@ATTRIBUTE f{} NUMERIC", index)?;
    }

    let classes: Vec<String> = (1..=class_count).map(|class| class.to_string()).collect();
    writeln!(writer, "@ATTRIBUTE class {{{}}}", classes.join(", "))?;

    writeln!(writer)?;
    writeln!(writer, "@DATA")?;
    Ok(())
}

/// Writes one data row, cells separated by commas.
pub fn write_row<W: Write, S: AsRef<str>>(writer: &mut W, cells: &[S]) -> std::io::Result<()> {
    let cells: Vec<&str> = cells.iter().map(|cell| cell.as_ref()).collect();
    writeln!(writer, "{}", cells.join(", "))
}

/// Writes a whole index as an ARFF document.
pub fn write_index<W: Write>(
    writer: &mut W,
    index: &IndexFile,
    comment: &str,
    relation: &str,
) -> std::io::Result<()> {
    write_header(
        writer,
        index.feature_count,
        index.class_count,
        comment,
        relation,
    )?;
    for row in &index.rows {
        write_row(writer, &row.cells())?;
    }
    Ok(())
}

/// Writes `index` to the ARFF file at `path`, replacing any existing file.
pub fn write_arff_file(path: &Path, index: &IndexFile, comment: &str, relation: &str) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_index(&mut writer, index, comment, relation)?;
    writer.flush()?;
    Ok(())
}

/// Reads the number of classes declared by the `class` attribute of an ARFF
/// file written by this crate, i.e. `{1, 2, ..., n}`.
///
/// # Errors
/// Returns [`WsdError::InvalidArff`] if the attribute is missing or its labels
/// are not `1..=n` in order.
pub fn read_class_count(path: &Path) -> Result<u32> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        let mut parts = line.trim().splitn(3, char::is_whitespace);
        let is_class = matches!(
            (parts.next(), parts.next()),
            (Some(keyword), Some("class")) if keyword.eq_ignore_ascii_case("@ATTRIBUTE")
        );
        if !is_class {
            continue;
        }

        let labels = parts
            .next()
            .map(str::trim)
            .and_then(|rest| rest.strip_prefix('{'))
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| WsdError::InvalidArff(format!("class attribute is not nominal: {line:?}")))?;
        let mut count = 0u32;
        for label in labels.split(',').map(str::trim) {
            count += 1;
            if label.parse::<u32>().ok() != Some(count) {
                return Err(WsdError::InvalidArff(format!(
                    "class label {label:?} where {count} was expected"
                )));
            }
        }
        return Ok(count);
    }

    Err(WsdError::InvalidArff(format!(
        "no class attribute in {}",
        path.display()
    )))
}

/// Converts an index file into an ARFF file.
///
/// # Arguments
/// * `index_path` - The path to the index file.
/// * `arff_path` - The path to the ARFF file to write.
/// * `comment` - The comment placed in the header.
/// * `relation` - The relation name.
///
/// # Errors
/// Returns an error if the index file is invalid or a file cannot be accessed.
pub fn convert_index_to_arff(
    index_path: &Path,
    arff_path: &Path,
    comment: &str,
    relation: &str,
) -> Result<IndexFile> {
    let index = IndexFile::read(index_path)?;
    write_arff_file(arff_path, &index, comment, relation)?;
    info!(
        "converted {} rows from {} to {}",
        index.rows.len(),
        index_path.display(),
        arff_path.display()
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::io::Write;

    use tempfile::NamedTempFile;

    #[test]
    fn test_write_header() {
        let mut out = Vec::new();
        write_header(&mut out, 2, 2, "Comment", "wsd").unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "% Comment",
                "@RELATION wsd",
                "@ATTRIBUTE f1 NUMERIC",
                "@ATTRIBUTE f2 NUMERIC",
                "@ATTRIBUTE class {1, 2}",
                "",
                "@DATA",
            ]
        );
    }

    #[test]
    fn test_write_row() {
        let mut out = Vec::new();
        write_row(&mut out, &["41", "42", "2"]).unwrap();
        assert_eq!(out, b"41, 42, 2\n");
    }

    #[test]
    fn test_convert_index_to_arff() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut index_file = NamedTempFile::new()?;
        write!(
            index_file,
            "\n# Feature Count\n2\n# Class count\n2\n\n# Data\n1 2 1\n2 3 2\n"
        )?;
        index_file.as_file().sync_all()?;

        let arff_file = NamedTempFile::new()?;
        let index = convert_index_to_arff(index_file.path(), arff_file.path(), "", DEFAULT_RELATION)?;
        assert_eq!(index.rows.len(), 2);

        let output = fs::read_to_string(arff_file.path())?;
        let expected = "% \n@RELATION wsd\n@ATTRIBUTE f1 NUMERIC\n@ATTRIBUTE f2 NUMERIC\n\
                        @ATTRIBUTE class {1, 2}\n\n@DATA\n1, 2, 1\n2, 3, 2\n";
        assert_eq!(output, expected);
        Ok(())
    }

    #[test]
    fn test_read_class_count() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut arff_file = NamedTempFile::new()?;
        write_header(&mut arff_file, 4, 3, "bank", DEFAULT_RELATION)?;
        write_row(&mut arff_file, &["1", "2", "3", "4", "3"])?;
        arff_file.as_file().sync_all()?;
        assert_eq!(read_class_count(arff_file.path())?, 3);

        let mut other = NamedTempFile::new()?;
        write!(other, "@relation wsd\n@attribute class {{1, 3}}\n@data\n")?;
        other.as_file().sync_all()?;
        assert!(matches!(
            read_class_count(other.path()),
            Err(WsdError::InvalidArff(_))
        ));

        let mut no_class = NamedTempFile::new()?;
        write!(no_class, "@RELATION wsd\n@ATTRIBUTE f1 NUMERIC\n@DATA\n")?;
        no_class.as_file().sync_all()?;
        assert!(matches!(
            read_class_count(no_class.path()),
            Err(WsdError::InvalidArff(_))
        ));
        Ok(())
    }

    #[test]
    fn test_missing_values_are_kept() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut index_file = NamedTempFile::new()?;
        write!(index_file, "2\n1\n? 7 1\n")?;
        index_file.as_file().sync_all()?;

        let arff_file = NamedTempFile::new()?;
        convert_index_to_arff(index_file.path(), arff_file.path(), "bank", "bank")?;

        let output = fs::read_to_string(arff_file.path())?;
        assert!(output.starts_with("% bank\n@RELATION bank\n"));
        assert!(output.contains("@ATTRIBUTE class {1}\n"));
        assert!(output.ends_with("@DATA\n?, 7, 1\n"));
        Ok(())
    }
}
