use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WsdError};

/// Default number of words kept on each side of the marked target.
pub const DEFAULT_RADIUS: usize = 2;

/// Default pattern for the marked target token, e.g. `@bank@` or `bank@`.
pub const DEFAULT_TARGET_PATTERN: &str = r"^@?[a-zA-Z]+@";

/// What to do with a corpus line that does not follow the line grammar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Return the error to the caller and stop.
    #[default]
    Fail,
    /// Log the line and continue with the next one.
    Skip,
}

/// Settings shared by the extractor and the batch pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub radius: usize,
    pub target_pattern: String,
    pub on_malformed: MalformedPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            radius: DEFAULT_RADIUS,
            target_pattern: DEFAULT_TARGET_PATTERN.to_string(),
            on_malformed: MalformedPolicy::Fail,
        }
    }
}

impl ExtractorConfig {
    /// Loads a configuration from a JSON file. Missing fields take their
    /// default values.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds a radius of zero.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: ExtractorConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that deserialization alone cannot rule out.
    pub fn validate(&self) -> Result<()> {
        if self.radius == 0 {
            return Err(WsdError::InvalidConfig(
                "radius must be at least 1".to_string(),
            ));
        }
        if self.target_pattern.is_empty() {
            return Err(WsdError::InvalidConfig(
                "target pattern must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of feature columns a record produces.
    pub fn feature_count(&self) -> usize {
        self.radius * 2
    }
}
