use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;

/// Iterator over the data lines of a text file.
///
/// Lines are trimmed; empty lines and lines starting with the comment marker
/// are skipped. The file is closed when the iterator is dropped.
pub struct DataLines {
    lines: Lines<BufReader<File>>,
    comment: Option<String>,
}

impl DataLines {
    /// Opens `path` for reading. Pass `None` as `comment` to keep every
    /// non-empty line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path, comment: Option<&str>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(DataLines {
            lines: BufReader::new(file).lines(),
            comment: comment.map(str::to_string),
        })
    }

    fn is_data(&self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        match &self.comment {
            Some(marker) => !line.starts_with(marker.as_str()),
            None => true,
        }
    }
}

impl Iterator for DataLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err)),
            };
            let line = line.trim();
            if self.is_data(line) {
                return Some(Ok(line.to_string()));
            }
        }
    }
}

/// Reads every data line of `path` into memory.
///
/// # Errors
/// Returns the first I/O error encountered.
pub fn read_data_lines(path: &Path, comment: Option<&str>) -> io::Result<Vec<String>> {
    DataLines::open(path, comment)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::NamedTempFile;

    #[test]
    fn test_skips_blank_and_comment_lines() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "1")?;
        writeln!(file)?;
        writeln!(file, "   %23")?;
        writeln!(file, "  2  ")?;
        writeln!(file, "3%")?;
        file.as_file().sync_all()?;

        let lines = read_data_lines(file.path(), Some("%"))?;
        assert_eq!(lines, vec!["1", "2", "3%"]);
        Ok(())
    }

    #[test]
    fn test_without_comment_marker() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "# kept")?;
        writeln!(file, "bank.n 1 @ the river @bank@ was wide")?;
        file.as_file().sync_all()?;

        let lines = read_data_lines(file.path(), None)?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "# kept");
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = DataLines::open(Path::new("/nonexistent/corpus.txt"), None);
        assert!(result.is_err());
    }
}
