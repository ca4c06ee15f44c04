//! Host GPU capacity discovery.

use std::process::Command;

use crate::error::ProbeError;

/// Reports total addressable GPU memory in MiB.
pub trait CapacityProbe: Send + Sync {
    fn probe(&self) -> Result<u64, ProbeError>;
}

/// Sums `memory.total` over every GPU listed by `nvidia-smi`.
pub struct NvidiaSmiProbe {
    binary: String,
}

impl NvidiaSmiProbe {
    pub fn new() -> Self {
        Self::with_binary("nvidia-smi")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CapacityProbe for NvidiaSmiProbe {
    fn probe(&self) -> Result<u64, ProbeError> {
        let output = Command::new(&self.binary)
            .arg("--query-gpu=memory.total")
            .arg("--format=csv,noheader,nounits")
            .output()
            .map_err(|e| ProbeError::Unavailable(format!("{}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(ProbeError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_memory_totals(&String::from_utf8_lossy(&output.stdout))
    }
}

/// A fixed capacity, for hosts without a GPU query tool and for tests.
pub struct StaticProbe(pub u64);

impl CapacityProbe for StaticProbe {
    fn probe(&self) -> Result<u64, ProbeError> {
        if self.0 == 0 {
            return Err(ProbeError::Empty);
        }
        Ok(self.0)
    }
}

/// Parse one MiB figure per line and sum them.
pub fn parse_memory_totals(output: &str) -> Result<u64, ProbeError> {
    let mut total = 0u64;
    let mut gpus = 0usize;
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        // Some driver versions append the unit even with `nounits`
        let figure = line.trim_end_matches("MiB").trim();
        let mib: f64 = figure
            .parse()
            .map_err(|_| ProbeError::Parse(line.to_string()))?;
        total += mib.max(0.0) as u64;
        gpus += 1;
    }
    if gpus == 0 || total == 0 {
        return Err(ProbeError::Empty);
    }
    Ok(total)
}

/// Probe once, falling back to `fallback` (with a warning) on any failure.
pub fn probe_or_default(probe: &dyn CapacityProbe, fallback: u64) -> u64 {
    match probe.probe() {
        Ok(total) => {
            tracing::debug!(total_mib = total, "GPU capacity probed");
            total
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback_mib = fallback,
                "GPU capacity probe failed, using configured default"
            );
            fallback
        }
    }
}
