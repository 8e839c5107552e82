use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;

/// Classifier command used when none is given. It must accept
/// `train <arff> <model>` and `test <model> <arff> <output>`.
pub const DEFAULT_CLASSIFIER: &str = "java Learn";

pub const TRAIN_SUFFIX: &str = ".train.arff";
pub const TEST_SUFFIX: &str = ".test.arff";

/// Train/test files found for one target word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptJob {
    pub word: String,
    pub train: PathBuf,
    pub test: Option<PathBuf>,
}

impl ScriptJob {
    fn sibling(&self, extension: &str) -> PathBuf {
        let dir = self.train.parent().unwrap_or_else(|| Path::new(""));
        dir.join(format!("{}.{}", self.word, extension))
    }

    /// Where the trained model of this word is written.
    pub fn model_path(&self) -> PathBuf {
        self.sibling("model")
    }

    /// Where the predictions on the test file are written.
    pub fn output_path(&self) -> PathBuf {
        self.sibling("out")
    }
}

/// Scans `dir` for `<word>.train.arff` files and pairs each with the
/// `<word>.test.arff` beside it, if any. Jobs are sorted by word.
///
/// # Errors
/// Returns an error if the directory cannot be read.
pub fn collect_jobs(dir: &Path) -> Result<Vec<ScriptJob>> {
    let mut jobs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(word) = name.strip_suffix(TRAIN_SUFFIX) else {
            continue;
        };
        if word.is_empty() {
            continue;
        }

        let test = dir.join(format!("{}{}", word, TEST_SUFFIX));
        let test = if test.is_file() {
            Some(test)
        } else {
            warn!("no test file for {:?}, only training will be scripted", word);
            None
        };

        jobs.push(ScriptJob {
            word: word.to_string(),
            train: path.clone(),
            test,
        });
    }

    jobs.sort_by(|a, b| a.word.cmp(&b.word));
    Ok(jobs)
}

/// Quotes `path` for a POSIX shell.
pub fn shell_quote(path: &Path) -> String {
    let text = path.to_string_lossy();
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Renders a POSIX shell script that trains, and where possible tests, one
/// model per job.
pub fn render_script(jobs: &[ScriptJob], classifier: &str) -> String {
    let mut script = String::from("#!/bin/sh\nset -e\n");

    for job in jobs {
        let model = shell_quote(&job.model_path());
        script.push_str(&format!("\n# {}\n", job.word));
        script.push_str(&format!(
            "{} train {} {}\n",
            classifier,
            shell_quote(&job.train),
            model
        ));
        if let Some(test) = &job.test {
            script.push_str(&format!(
                "{} test {} {} {}\n",
                classifier,
                model,
                shell_quote(test),
                shell_quote(&job.output_path())
            ));
        }
    }

    script
}

/// Builds the script for every job in `arff_dir` and writes it to
/// `script_path`, executable on unix.
///
/// # Returns
/// Returns the jobs that were scripted.
pub fn write_script(arff_dir: &Path, script_path: &Path, classifier: &str) -> Result<Vec<ScriptJob>> {
    let jobs = collect_jobs(arff_dir)?;
    fs::write(script_path, render_script(&jobs, classifier))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(script_path, fs::Permissions::from_mode(0o755))?;
    }

    info!("scripted {} words into {}", jobs.len(), script_path.display());
    Ok(jobs)
}
