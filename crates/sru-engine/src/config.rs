//! Configuration for the recurrence engine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use sru_core::{Device, Result, SruError};

/// Largest CUDA block the launcher will request.
pub const MAX_BLOCK_SIZE: usize = 1024;

/// Configuration for a `RecurrenceEngine`.
///
/// Every field has a default, so a JSON file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Pass the cell state through tanh before it mixes into the hidden
    /// state. `false` uses the cell state unchanged.
    pub use_tanh: bool,

    /// Where the column scan runs.
    pub device: Device,

    /// Below this many columns the CPU scan stays on the calling thread.
    pub min_parallel_columns: usize,

    /// Size of a dedicated rayon pool for CPU scans. `None` uses the
    /// global pool.
    pub num_threads: Option<usize>,

    /// CUDA threads per block (capped by the column count at launch).
    pub block_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            use_tanh: true,
            device: Device::Cpu,
            min_parallel_columns: sru_kernels::cpu_scan::PAR_COLUMN_THRESHOLD,
            num_threads: None,
            block_size: 512,
        }
    }
}

impl ScanConfig {
    /// Default configuration on the given device.
    pub fn on(device: Device) -> Self {
        Self {
            device,
            ..Self::default()
        }
    }

    pub fn with_tanh(mut self, use_tanh: bool) -> Self {
        self.use_tanh = use_tanh;
        self
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(SruError::InvalidConfig(format!(
                "block_size must be in 1..={}, got {}",
                MAX_BLOCK_SIZE, self.block_size
            )));
        }
        if self.num_threads == Some(0) {
            return Err(SruError::InvalidConfig(
                "num_threads must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| SruError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SruError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SruError::Json(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ScanConfig::default();
        assert!(c.use_tanh);
        assert_eq!(c.device, Device::Cpu);
        assert_eq!(c.block_size, 512);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let c = ScanConfig::from_json_str(r#"{ "use_tanh": false, "device": { "Cuda": 1 } }"#)
            .unwrap();
        assert!(!c.use_tanh);
        assert_eq!(c.device, Device::Cuda(1));
        assert_eq!(c.block_size, 512);
        assert_eq!(c.num_threads, None);
    }

    #[test]
    fn test_json_roundtrip() {
        let c = ScanConfig {
            num_threads: Some(4),
            ..ScanConfig::on(Device::Cuda(0)).with_tanh(false)
        };
        let back = ScanConfig::from_json_str(&c.to_json().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_invalid_ranges() {
        let c = ScanConfig {
            block_size: 0,
            ..ScanConfig::default()
        };
        assert!(matches!(c.validate(), Err(SruError::InvalidConfig(_))));
        let c = ScanConfig {
            block_size: 2048,
            ..ScanConfig::default()
        };
        assert!(c.validate().is_err());
        let c = ScanConfig {
            num_threads: Some(0),
            ..ScanConfig::default()
        };
        assert!(c.validate().is_err());
        assert!(matches!(
            ScanConfig::from_json_str(r#"{ "block_size": 0 }"#),
            Err(SruError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(ScanConfig::from_json_str("{ nope"), Err(SruError::Json(_))));
        assert!(matches!(
            ScanConfig::from_json_file(Path::new("/nonexistent/sru.json")),
            Err(SruError::Io(_))
        ));
    }
}
