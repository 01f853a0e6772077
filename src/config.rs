//! Compiler configuration
//!
//! ```json
//! { "cores": 8, "row_capacity": 256, "annotate": true, "parallel": true }
//! ```
//!
//! Every field is optional in JSON; missing fields take the defaults below.

use crate::error::{PimError, Result};
use crate::isa::MAX_CORES;
use crate::layout::RowCapacity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of cores to spread rows over
pub const DEFAULT_CORES: usize = 4;

/// Code generation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Requested core count (clamped to M at partition time)
    pub cores: usize,
    /// Elements per physical memory row
    pub row_capacity: RowCapacity,
    /// Interleave `#` annotation lines with instructions
    pub annotate: bool,
    /// Generate core programs on the rayon pool
    pub parallel: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            cores: DEFAULT_CORES,
            row_capacity: RowCapacity::DEFAULT,
            annotate: true,
            parallel: true,
        }
    }
}

impl CompilerConfig {
    pub fn with_cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    pub fn with_row_capacity(mut self, row_capacity: RowCapacity) -> Self {
        self.row_capacity = row_capacity;
        self
    }

    pub fn with_annotations(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check settings before compiling
    ///
    /// More than 64 cores is accepted: core pointers wrap in the encoding.
    pub fn validate(&self) -> Result<()> {
        if self.cores == 0 {
            return Err(PimError::InvalidCoreCount(self.cores));
        }
        if self.cores > MAX_CORES {
            log::warn!(
                "{} cores requested; core pointers above {} wrap in the 6-bit field",
                self.cores,
                MAX_CORES - 1
            );
        }
        Ok(())
    }

    /// Parse from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.cores, 4);
        assert_eq!(config.row_capacity.get(), 512);
        assert!(config.annotate);
        assert!(config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_cores_rejected() {
        let config = CompilerConfig::default().with_cores(0);
        assert!(matches!(config.validate(), Err(PimError::InvalidCoreCount(0))));
    }

    #[test]
    fn test_partial_json() {
        let config = CompilerConfig::from_json_str(r#"{"cores": 2, "annotate": false}"#).unwrap();
        assert_eq!(config.cores, 2);
        assert!(!config.annotate);
        assert_eq!(config.row_capacity, RowCapacity::DEFAULT);
    }

    #[test]
    fn test_json_rejects_zero_capacity() {
        let err = CompilerConfig::from_json_str(r#"{"row_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, PimError::Json(_)));
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pimgen.json");
        let config = CompilerConfig::default()
            .with_cores(16)
            .with_row_capacity(RowCapacity::new(64).unwrap());
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        assert_eq!(CompilerConfig::from_json_file(&path).unwrap(), config);
    }
}
