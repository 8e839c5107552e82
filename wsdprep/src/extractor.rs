use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{ExtractorConfig, MalformedPolicy};
use crate::error::{Result, WsdError};
use crate::index::IndexFile;
use crate::registry::{WordId, WordRegistry};
use crate::source::read_data_lines;

/// Words surrounding the marked target token, split at the removed target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollocationWindow {
    pub left: Vec<String>,
    pub right: Vec<String>,
}

impl CollocationWindow {
    /// Iterates over the window words in corpus order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.left.iter().chain(self.right.iter()).map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.words().map(str::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

/// One parsed corpus line.
///
/// `collocation_ids` runs parallel to `collocation.words()`; it stays empty
/// until the window has been encoded against a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    pub word: String,
    pub pos: String,
    pub senses: Vec<String>,
    pub context: String,
    pub collocation: CollocationWindow,
    pub collocation_ids: Vec<WordId>,
}

impl LineRecord {
    /// The class written for this record: the first sense label as a
    /// positive integer.
    ///
    /// # Errors
    /// Returns [`WsdError::InvalidSense`] if the label is not a positive integer.
    pub fn class_label(&self) -> Result<u32> {
        let label = self.senses.first().map(String::as_str).unwrap_or_default();
        match label.parse::<u32>() {
            Ok(class) if class > 0 => Ok(class),
            _ => Err(WsdError::InvalidSense {
                label: label.to_string(),
            }),
        }
    }

    /// Lays the encoded window out as `2 * radius` slots. Left ids are
    /// right-aligned against the target, right ids left-aligned; slots with
    /// no word are `None`.
    pub fn feature_vector(&self, radius: usize) -> Vec<Option<WordId>> {
        let split = self.collocation.left.len().min(self.collocation_ids.len());
        let (left, right) = self.collocation_ids.split_at(split);
        let left = &left[left.len().saturating_sub(radius)..];
        let right = &right[..right.len().min(radius)];

        let mut slots = Vec::with_capacity(radius * 2);
        slots.extend(std::iter::repeat(None).take(radius - left.len()));
        slots.extend(left.iter().copied().map(Some));
        slots.extend(right.iter().copied().map(Some));
        slots.extend(std::iter::repeat(None).take(radius - right.len()));
        slots
    }
}

/// Returns the lemma of a raw corpus line: the text before the first `.`.
pub fn lemma_of(line: &str) -> Option<&str> {
    line.find('.').map(|dot| &line[..dot])
}

/// Collects the distinct lemmas of `lines`, skipping lines without one.
pub fn distinct_lemmas<I, S>(lines: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            lemma_of(line.as_ref())
                .filter(|lemma| !lemma.is_empty())
                .map(str::to_string)
        })
        .collect()
}

/// Cuts at most `radius` tokens on each side of `pos` out of `tokens`, where
/// `pos` is the index the removed target used to occupy. Bounds are clamped
/// to the sequence so a target near either end yields a shorter side.
pub fn clamp_window(tokens: &[&str], pos: usize, radius: usize) -> CollocationWindow {
    let pos = pos.min(tokens.len());
    let lo = pos.saturating_sub(radius);
    let hi = pos.saturating_add(radius).min(tokens.len());

    CollocationWindow {
        left: tokens[lo..pos].iter().map(|t| t.to_string()).collect(),
        right: tokens[pos..hi].iter().map(|t| t.to_string()).collect(),
    }
}

/// Maps every window word to its registry id, inserting unseen words.
pub fn encode_window(window: &CollocationWindow, registry: &mut WordRegistry) -> Vec<WordId> {
    window
        .words()
        .map(|word| registry.lookup_or_insert(word))
        .collect()
}

/// Extractor parses sense-tagged corpus lines of the form
/// `word.pos senses @ left context @target@ right context`
/// and encodes the collocation window around the target with its own
/// [`WordRegistry`].
pub struct Extractor {
    config: ExtractorConfig,
    target: Regex,
    registry: WordRegistry,
}

impl Extractor {
    /// Creates a new instance of [`Extractor`] with an empty registry.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the target pattern
    /// does not compile.
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        Self::with_registry(config, WordRegistry::new())
    }

    /// Creates an extractor that keeps assigning ids from an existing registry.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the target pattern
    /// does not compile.
    pub fn with_registry(config: ExtractorConfig, registry: WordRegistry) -> Result<Self> {
        config.validate()?;
        let target = Regex::new(&config.target_pattern)?;
        Ok(Extractor {
            config,
            target,
            registry,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn registry(&self) -> &WordRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WordRegistry {
        &mut self.registry
    }

    /// Consumes the extractor and hands its registry back to the caller.
    pub fn into_registry(self) -> WordRegistry {
        self.registry
    }

    /// Splits a corpus line into its fields and cuts out the collocation
    /// window. The returned record carries no ids yet.
    ///
    /// Fields are located by the first occurrence of `.`, space and `@`.
    ///
    /// # Errors
    /// Returns [`WsdError::MalformedLine`] if the line does not follow the
    /// grammar or its context has no marked target.
    ///
    /// # Example
    /// ```
    /// use wsdprep::config::ExtractorConfig;
    /// use wsdprep::extractor::Extractor;
    ///
    /// let extractor = Extractor::new(ExtractorConfig::default()).unwrap();
    /// let record = extractor.parse_line("bank.n 1 @ the river @bank@ was wide").unwrap();
    /// assert_eq!(record.word, "bank");
    /// assert_eq!(record.pos, "n");
    /// assert_eq!(record.collocation.to_vec(), vec!["the", "river", "was", "wide"]);
    /// ```
    pub fn parse_line(&self, line: &str) -> Result<LineRecord> {
        let dot = line
            .find('.')
            .ok_or_else(|| WsdError::malformed(line, "missing '.' after the lemma"))?;
        let space = line
            .find(' ')
            .ok_or_else(|| WsdError::malformed(line, "missing space after the part of speech"))?;
        if dot > space {
            return Err(WsdError::malformed(line, "no '.' before the first space"));
        }
        let at = line
            .find('@')
            .ok_or_else(|| WsdError::malformed(line, "missing '@' context delimiter"))?;
        if at < space {
            return Err(WsdError::malformed(line, "'@' precedes the sense labels"));
        }

        let word = &line[..dot];
        if word.is_empty() {
            return Err(WsdError::malformed(line, "empty lemma"));
        }
        let pos = &line[dot + 1..space];
        if pos.is_empty() {
            return Err(WsdError::malformed(line, "empty part of speech"));
        }
        let senses: Vec<String> = line[space + 1..at]
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if senses.is_empty() {
            return Err(WsdError::malformed(line, "no sense labels"));
        }

        let context = &line[at + 1..];
        let collocation = self
            .extract_collocation_window(context, self.config.radius)
            .ok_or_else(|| WsdError::malformed(line, "no marked target token in context"))?;

        Ok(LineRecord {
            word: word.to_string(),
            pos: pos.to_string(),
            senses,
            context: context.to_string(),
            collocation,
            collocation_ids: Vec::new(),
        })
    }

    /// Finds the first token matching the target pattern, drops it, and
    /// returns up to `radius` words on each side. Returns `None` when the
    /// context has no marked target. [`Extractor::parse_line`] passes the
    /// configured radius.
    ///
    /// # Example
    /// ```
    /// use wsdprep::config::ExtractorConfig;
    /// use wsdprep::extractor::Extractor;
    ///
    /// let extractor = Extractor::new(ExtractorConfig::default()).unwrap();
    /// let window = extractor.extract_collocation_window("@target@ a b c d", 2).unwrap();
    /// assert_eq!(window.to_vec(), vec!["a", "b"]);
    /// ```
    pub fn extract_collocation_window(
        &self,
        context: &str,
        radius: usize,
    ) -> Option<CollocationWindow> {
        let mut tokens: Vec<&str> = context.split_whitespace().collect();
        let pos = tokens.iter().position(|token| self.target.is_match(token))?;
        tokens.remove(pos);
        Some(clamp_window(&tokens, pos, radius))
    }

    /// Encodes a window against this extractor's registry.
    pub fn encode_window(&mut self, window: &CollocationWindow) -> Vec<WordId> {
        encode_window(window, &mut self.registry)
    }

    /// Parses a line and encodes its collocation window.
    ///
    /// # Errors
    /// Returns [`WsdError::MalformedLine`] if the line cannot be parsed.
    pub fn extract_line(&mut self, line: &str) -> Result<LineRecord> {
        let mut record = self.parse_line(line)?;
        record.collocation_ids = self.encode_window(&record.collocation);
        Ok(record)
    }

    /// Extracts the records of every line whose raw lemma equals
    /// `target_word` exactly (case-sensitive, not normalized).
    ///
    /// A line is rejected when it is malformed or its first sense is not a
    /// positive integer class. Rejected lines never touch the registry.
    ///
    /// # Errors
    /// With [`MalformedPolicy::Fail`] the first rejected line is returned as
    /// an error. With [`MalformedPolicy::Skip`] it is logged and skipped.
    pub fn extract_records_for_word<I, S>(
        &mut self,
        lines: I,
        target_word: &str,
    ) -> Result<Vec<LineRecord>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (number, line) in lines.into_iter().enumerate() {
            let line = line.as_ref();
            if lemma_of(line) != Some(target_word) {
                continue;
            }
            let parsed = self
                .parse_line(line)
                .and_then(|record| record.class_label().map(|_| record));
            match parsed {
                Ok(mut record) => {
                    record.collocation_ids = self.encode_window(&record.collocation);
                    records.push(record);
                }
                Err(err @ (WsdError::MalformedLine { .. } | WsdError::InvalidSense { .. }))
                    if self.config.on_malformed == MalformedPolicy::Skip =>
                {
                    warn!("skipping line {}: {}", number + 1, err);
                    skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        debug!(
            "extracted {} records for {:?} ({} skipped, {} words registered)",
            records.len(),
            target_word,
            skipped,
            self.registry.len()
        );
        Ok(records)
    }

    /// Extracts the records of `target_word` from a corpus file and writes
    /// them to an index file.
    ///
    /// # Arguments
    /// * `corpus_path` - The path to the sense-tagged corpus.
    /// * `target_word` - The lemma to extract.
    /// * `index_path` - The path to the index file to write.
    ///
    /// # Returns
    /// Returns the index that was written.
    pub fn extract(
        &mut self,
        corpus_path: &Path,
        target_word: &str,
        index_path: &Path,
    ) -> Result<IndexFile> {
        let lines = read_data_lines(corpus_path, None)?;

        let records = self.extract_records_for_word(&lines, target_word)?;
        let index = IndexFile::from_records(&records, self.config.radius)?;
        index.write(index_path)?;

        info!(
            "wrote {} rows for {:?} to {}",
            index.rows.len(),
            target_word,
            index_path.display()
        );
        Ok(index)
    }
}
