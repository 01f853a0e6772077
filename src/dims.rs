//! Dimensions - validated matrix shapes and the versioned dimension contract
//!
//! The compiler never guesses shapes from source code. Callers hand it a
//! [`Dimensions`] directly or a contract file:
//!
//! ```json
//! { "version": 1, "name": "attention_proj", "m": 64, "n": 32, "k": 128 }
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use pimgen::dims::load_contract;
//!
//! let contract = load_contract("shapes/attention_proj.json")?;
//! let dims = contract.dimensions()?;
//! ```

use crate::error::{PimError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Current dimension contract version
pub const CONTRACT_VERSION: u32 = 1;

/// Shape of `C[M x N] = A[M x K] * B[K x N]`
///
/// Deserialization goes through [`Dimensions::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDimensions")]
pub struct Dimensions {
    /// Rows of A and C
    pub m: usize,
    /// Columns of B and C
    pub n: usize,
    /// Columns of A, rows of B
    pub k: usize,
}

impl Dimensions {
    /// Create validated dimensions (all positive, all matrix sizes addressable)
    pub fn new(m: usize, n: usize, k: usize) -> Result<Self> {
        if m == 0 || n == 0 || k == 0 {
            return Err(PimError::InvalidDimensions(format!(
                "{}x{} * {}x{}: every dimension must be positive",
                m, k, k, n
            )));
        }
        let dims = Self { m, n, k };
        for (name, a, b) in [("A", m, k), ("B", k, n), ("C", m, n)] {
            if a.checked_mul(b).is_none() {
                return Err(PimError::InvalidDimensions(format!(
                    "matrix {} ({}x{}) overflows the element count",
                    name, a, b
                )));
            }
        }
        Ok(dims)
    }

    /// Elements in A
    pub const fn size_a(&self) -> usize {
        self.m * self.k
    }

    /// Elements in B
    pub const fn size_b(&self) -> usize {
        self.k * self.n
    }

    /// Elements in C
    pub const fn size_c(&self) -> usize {
        self.m * self.n
    }

    /// Multiply-accumulate steps in the full product
    pub fn mac_count(&self) -> usize {
        self.m.saturating_mul(self.n).saturating_mul(self.k)
    }
}

#[derive(Deserialize)]
struct RawDimensions {
    m: usize,
    n: usize,
    k: usize,
}

impl TryFrom<RawDimensions> for Dimensions {
    type Error = PimError;

    fn try_from(raw: RawDimensions) -> Result<Self> {
        Self::new(raw.m, raw.n, raw.k)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} * {}x{}", self.m, self.k, self.k, self.n)
    }
}

/// Versioned dimension record exchanged with shape producers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionContract {
    /// Contract format version
    pub version: u32,
    /// Optional kernel name, used in listing headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl DimensionContract {
    /// Build a current-version contract from dimensions
    pub fn new(dims: Dimensions) -> Self {
        Self {
            version: CONTRACT_VERSION,
            name: None,
            m: dims.m,
            n: dims.n,
            k: dims.k,
        }
    }

    /// Attach a kernel name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parse and check a JSON contract
    pub fn from_json_str(json: &str) -> Result<Self> {
        let contract: Self = serde_json::from_str(json)?;
        contract.check_version()?;
        Ok(contract)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validated dimensions carried by this contract
    pub fn dimensions(&self) -> Result<Dimensions> {
        self.check_version()?;
        Dimensions::new(self.m, self.n, self.k)
            .map_err(|e| PimError::Contract(e.to_string()))
    }

    fn check_version(&self) -> Result<()> {
        if self.version != CONTRACT_VERSION {
            return Err(PimError::Contract(format!(
                "unsupported contract version {} (expected {})",
                self.version, CONTRACT_VERSION
            )));
        }
        Ok(())
    }
}

/// Load a dimension contract from a JSON file
pub fn load_contract<P: AsRef<Path>>(path: P) -> Result<DimensionContract> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let contract = DimensionContract::from_json_str(&json)?;
    log::debug!(
        "Loaded dimension contract M={} N={} K={} from {}",
        contract.m, contract.n, contract.k, path.display()
    );
    Ok(contract)
}

/// Save a dimension contract as JSON
pub fn save_contract<P: AsRef<Path>>(contract: &DimensionContract, path: P) -> Result<()> {
    std::fs::write(path, contract.to_json_string()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_zero() {
        assert!(Dimensions::new(0, 1, 1).is_err());
        assert!(Dimensions::new(1, 0, 1).is_err());
        assert!(Dimensions::new(1, 1, 0).is_err());
        assert!(Dimensions::new(1, 1, 1).is_ok());
    }

    #[test]
    fn test_new_rejects_overflow() {
        let err = Dimensions::new(usize::MAX, 1, 2).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_sizes() {
        let dims = Dimensions::new(4, 3, 2).unwrap();
        assert_eq!(dims.size_a(), 8);
        assert_eq!(dims.size_b(), 6);
        assert_eq!(dims.size_c(), 12);
        assert_eq!(dims.mac_count(), 24);
        assert_eq!(dims.to_string(), "4x2 * 2x3");
    }

    #[test]
    fn test_deserialize_goes_through_new() {
        let dims: Dimensions = serde_json::from_str(r#"{"m": 4, "n": 3, "k": 2}"#).unwrap();
        assert_eq!(dims, Dimensions::new(4, 3, 2).unwrap());
        assert!(serde_json::from_str::<Dimensions>(r#"{"m": 0, "n": 3, "k": 2}"#).is_err());

        let huge = format!(r#"{{"m": {}, "n": 1, "k": 2}}"#, usize::MAX);
        assert!(serde_json::from_str::<Dimensions>(&huge).is_err());
    }

    #[test]
    fn test_contract_parse() {
        let contract = DimensionContract::from_json_str(
            r#"{"version": 1, "name": "proj", "m": 10, "n": 5, "k": 7}"#,
        )
        .unwrap();
        assert_eq!(contract.name.as_deref(), Some("proj"));
        assert_eq!(contract.dimensions().unwrap(), Dimensions::new(10, 5, 7).unwrap());
    }

    #[test]
    fn test_contract_name_optional() {
        let contract =
            DimensionContract::from_json_str(r#"{"version": 1, "m": 1, "n": 2, "k": 3}"#).unwrap();
        assert!(contract.name.is_none());
    }

    #[test]
    fn test_contract_rejects_unknown_version() {
        let err = DimensionContract::from_json_str(r#"{"version": 2, "m": 1, "n": 1, "k": 1}"#)
            .unwrap_err();
        assert!(matches!(err, PimError::Contract(_)));
    }

    #[test]
    fn test_contract_rejects_zero_dims() {
        let contract =
            DimensionContract::from_json_str(r#"{"version": 1, "m": 0, "n": 1, "k": 1}"#).unwrap();
        assert!(matches!(contract.dimensions(), Err(PimError::Contract(_))));
    }

    #[test]
    fn test_contract_rejects_negative() {
        let err = DimensionContract::from_json_str(r#"{"version": 1, "m": -4, "n": 1, "k": 1}"#)
            .unwrap_err();
        assert!(matches!(err, PimError::Json(_)));
    }

    #[test]
    fn test_contract_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shape.json");

        let contract = DimensionContract::new(Dimensions::new(8, 4, 2).unwrap()).with_name("t");
        save_contract(&contract, &path).unwrap();

        let loaded = load_contract(&path).unwrap();
        assert_eq!(loaded, contract);
    }
}
