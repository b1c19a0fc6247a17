use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SruError;

/// Execution substrate for the column scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Device {
    /// CPU, columns fanned out over rayon workers
    #[default]
    Cpu,
    /// CUDA GPU with device index, one thread per column
    Cuda(usize),
}

impl Device {
    /// Whether this is a CUDA device.
    pub fn is_cuda(&self) -> bool {
        matches!(self, Device::Cuda(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(idx) => write!(f, "cuda:{idx}"),
        }
    }
}

/// Parses `cpu`, `cuda` (index 0) or `cuda:N`.
impl FromStr for Device {
    type Err = SruError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            _ => s
                .strip_prefix("cuda:")
                .and_then(|idx| idx.parse::<usize>().ok())
                .map(Device::Cuda)
                .ok_or_else(|| SruError::UnsupportedBackend(format!("unknown device '{s}'"))),
        }
    }
}
