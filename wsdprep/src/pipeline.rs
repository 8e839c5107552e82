use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::arff::{read_class_count, write_arff_file, DEFAULT_RELATION};
use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::extractor::{distinct_lemmas, Extractor};
use crate::index::IndexFile;
use crate::registry::WordRegistry;
use crate::source::read_data_lines;

const REGISTRY_SUFFIX: &str = "registry.json";

/// How the class attribute of each written file is sized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClassCount {
    /// The largest class label among the word's own records.
    #[default]
    Observed,
    /// The same count for every word.
    Fixed(u32),
    /// The count declared by `<word>.<suffix>.arff` in the reference
    /// directory, e.g. the training file when writing test files.
    FromArff(String),
}

/// The path of `word`'s registry inside `dir`.
pub fn registry_path(dir: &Path, word: &str) -> PathBuf {
    dir.join(format!("{}.{}", word, REGISTRY_SUFFIX))
}

/// Whether `word` can be used as a file name stem inside an output directory.
pub fn is_safe_file_stem(word: &str) -> bool {
    !word.is_empty()
        && word != "."
        && word != ".."
        && !word.contains(['/', '\\', std::path::MAIN_SEPARATOR, '\0'])
}

/// An ARFF file written for one target word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenWord {
    pub word: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub written: Vec<WrittenWord>,
    /// Words that had no records or were not reached before an interrupt.
    pub skipped: Vec<String>,
}

enum Outcome {
    Written(WrittenWord),
    Skipped(String),
}

/// Pipeline extracts many target words from one corpus and writes one ARFF
/// file per word.
///
/// Words are processed in parallel. Every word gets its own [`WordRegistry`],
/// so no registry is shared between threads and the ids of one word's file
/// never depend on another's. A word's registry starts empty unless
/// [`Pipeline::with_registries`] points at the registries saved by an earlier
/// run, which keeps the ids of a test file aligned with its training file.
///
/// Words that cannot be used as a file name (see [`is_safe_file_stem`]) are
/// skipped.
pub struct Pipeline {
    config: ExtractorConfig,
    num_threads: usize,
    suffix: Option<String>,
    relation: String,
    save_registries: bool,
    registry_dir: Option<PathBuf>,
    class_count: ClassCount,
}

impl Pipeline {
    /// Creates a new instance of [`Pipeline`].
    ///
    /// # Arguments
    /// * `config` - The extractor settings applied to every word.
    /// * `num_threads` - The number of worker threads, 0 lets rayon decide.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ExtractorConfig, num_threads: usize) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline {
            config,
            num_threads,
            suffix: None,
            relation: DEFAULT_RELATION.to_string(),
            save_registries: false,
            registry_dir: None,
            class_count: ClassCount::Observed,
        })
    }

    /// Names output files `<word>.<suffix>.arff`, e.g. `train` or `test`.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = Some(suffix.to_string()).filter(|s| !s.is_empty());
        self
    }

    pub fn with_relation(mut self, relation: &str) -> Self {
        self.relation = relation.to_string();
        self
    }

    /// Also writes each word's registry as `<word>.registry.json`.
    pub fn with_saved_registries(mut self, save: bool) -> Self {
        self.save_registries = save;
        self
    }

    /// Seeds each word's registry from `<dir>/<word>.registry.json` when that
    /// file exists. Ids already in it are kept and new words continue after
    /// its last id.
    pub fn with_registries(mut self, dir: &Path) -> Self {
        self.registry_dir = Some(dir.to_path_buf());
        self
    }

    pub fn with_class_count(mut self, class_count: ClassCount) -> Self {
        self.class_count = class_count;
        self
    }

    /// The ARFF path of `word` inside `out_dir`.
    pub fn output_path(&self, out_dir: &Path, word: &str) -> PathBuf {
        match &self.suffix {
            Some(suffix) => out_dir.join(format!("{}.{}.arff", word, suffix)),
            None => out_dir.join(format!("{}.arff", word)),
        }
    }

    /// Runs the batch.
    ///
    /// # Arguments
    /// * `corpus_path` - The path to the sense-tagged corpus.
    /// * `words` - The target words; every lemma of the corpus when empty.
    /// * `out_dir` - The directory receiving the ARFF files, created if missing.
    /// * `running` - Cleared to stop before the next word is started.
    ///
    /// # Errors
    /// Returns the first error raised by any word, or an error if the corpus
    /// cannot be read. A record whose class exceeds a fixed or reference
    /// class count is an error.
    pub fn run(
        &self,
        corpus_path: &Path,
        words: &[String],
        out_dir: &Path,
        running: Arc<AtomicBool>,
    ) -> Result<BatchReport> {
        let lines = read_data_lines(corpus_path, None)?;
        let targets: Vec<String> = if words.is_empty() {
            distinct_lemmas(&lines).into_iter().collect()
        } else {
            words
                .iter()
                .cloned()
                .collect::<BTreeSet<String>>()
                .into_iter()
                .collect()
        };
        info!(
            "processing {} words from {} ({} lines)",
            targets.len(),
            corpus_path.display(),
            lines.len()
        );

        fs::create_dir_all(out_dir)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()?;
        let outcomes: Vec<Outcome> = pool.install(|| {
            targets
                .par_iter()
                .map(|word| self.run_word(&lines, word, out_dir, &running))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Written(written) => report.written.push(written),
                Outcome::Skipped(word) => report.skipped.push(word),
            }
        }
        info!(
            "wrote {} files, skipped {} words",
            report.written.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn run_word(
        &self,
        lines: &[String],
        word: &str,
        out_dir: &Path,
        running: &AtomicBool,
    ) -> Result<Outcome> {
        if !running.load(Ordering::SeqCst) {
            debug!("interrupted before {:?}", word);
            return Ok(Outcome::Skipped(word.to_string()));
        }

        if !is_safe_file_stem(word) {
            warn!("{:?} cannot be used as a file name, skipping", word);
            return Ok(Outcome::Skipped(word.to_string()));
        }

        let mut extractor = Extractor::with_registry(self.config.clone(), self.seed_registry(word)?)?;
        let records = extractor.extract_records_for_word(lines, word)?;
        if records.is_empty() {
            warn!("no records for {:?}", word);
            return Ok(Outcome::Skipped(word.to_string()));
        }

        let mut index = IndexFile::from_records(&records, self.config.radius)?;
        if let Some(class_count) = self.class_count_for(word, out_dir)? {
            index = index.with_class_count(class_count)?;
        }
        let path = self.output_path(out_dir, word);
        write_arff_file(&path, &index, word, &self.relation)?;

        if self.save_registries {
            extractor.registry().save(&registry_path(out_dir, word))?;
        }

        debug!(
            "{:?}: {} rows, {} classes, {} words",
            word,
            index.rows.len(),
            index.class_count,
            extractor.registry().len()
        );
        Ok(Outcome::Written(WrittenWord {
            word: word.to_string(),
            path,
            rows: index.rows.len(),
        }))
    }

    fn seed_registry(&self, word: &str) -> Result<WordRegistry> {
        let Some(dir) = &self.registry_dir else {
            return Ok(WordRegistry::new());
        };
        let path = registry_path(dir, word);
        if path.exists() {
            let registry = WordRegistry::load(&path)?;
            debug!("{:?}: continuing from {} registered words", word, registry.len());
            Ok(registry)
        } else {
            warn!("no registry for {:?} in {}, ids start at 1", word, dir.display());
            Ok(WordRegistry::new())
        }
    }

    /// The reference files are looked up in the registry directory if one is
    /// set, otherwise in `out_dir`.
    fn class_count_for(&self, word: &str, out_dir: &Path) -> Result<Option<u32>> {
        match &self.class_count {
            ClassCount::Observed => Ok(None),
            ClassCount::Fixed(class_count) => Ok(Some(*class_count)),
            ClassCount::FromArff(suffix) => {
                let dir = self.registry_dir.as_deref().unwrap_or(out_dir);
                let path = dir.join(format!("{}.{}.arff", word, suffix));
                if path.exists() {
                    read_class_count(&path).map(Some)
                } else {
                    warn!("no {} for {:?}, using the observed class count", path.display(), word);
                    Ok(None)
                }
            }
        }
    }
}
