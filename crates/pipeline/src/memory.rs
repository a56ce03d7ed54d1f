//! Device memory probing

use std::path::PathBuf;
use std::sync::Arc;

use voice_synth_core::{Error, MemoryProbe, MemoryUsage, Result};

const MEMINFO: &str = "/proc/meminfo";

/// Host memory from `/proc/meminfo`, used when models run on the CPU
#[derive(Debug, Clone)]
pub struct SystemMemoryProbe {
    path: PathBuf,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(MEMINFO),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn usage(&self) -> Result<MemoryUsage> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Resource(format!("failed to read {}: {}", self.path.display(), e)))?;
        parse_meminfo(&content)
            .ok_or_else(|| Error::Resource(format!("unrecognized format in {}", self.path.display())))
    }
}

/// `used = MemTotal - MemAvailable`, both reported in kB
pub fn parse_meminfo(content: &str) -> Option<MemoryUsage> {
    let field = |name: &str| -> Option<u64> {
        content
            .lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kb| kb.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };
    let total = field("MemTotal")?;
    let available = field("MemAvailable").or_else(|| field("MemFree"))?;
    Some(MemoryUsage {
        used: total.saturating_sub(available),
        total,
    })
}

pub fn create_memory_probe() -> Arc<dyn MemoryProbe> {
    Arc::new(SystemMemoryProbe::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "MemTotal:       16000000 kB\nMemFree:         1000000 kB\nMemAvailable:    4000000 kB\nBuffers:          200000 kB\n";

    #[test]
    fn test_parse_meminfo() {
        let usage = parse_meminfo(SAMPLE).unwrap();
        assert_eq!(usage.total, 16_000_000 * 1024);
        assert_eq!(usage.used, 12_000_000 * 1024);
        assert!((usage.ratio() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_falls_back_to_mem_free() {
        let usage = parse_meminfo("MemTotal: 100 kB\nMemFree: 10 kB\n").unwrap();
        assert_eq!(usage.used, 90 * 1024);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_meminfo("nothing here").is_none());
    }

    #[test]
    fn test_probe_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meminfo");
        std::fs::write(&path, SAMPLE).unwrap();
        let usage = SystemMemoryProbe::with_path(&path).usage().unwrap();
        assert_eq!(usage.total, 16_000_000 * 1024);

        let missing = SystemMemoryProbe::with_path(dir.path().join("absent"));
        assert!(matches!(missing.usage(), Err(Error::Resource(_))));
    }
}
