//! Host resource probe.

use docflow_core::{ResourceHints, ResourceProbe};
use tracing::debug;

const MEMINFO_PATH: &str = "/proc/meminfo";

/// Reads parallelism and available memory from the running host.
#[derive(Debug, Default)]
pub struct SystemResources;

impl ResourceProbe for SystemResources {
    fn resource_hints(&self) -> ResourceHints {
        let parallelism = std::thread::available_parallelism()
            .ok()
            .map(|n| n.get());
        let memory_gb = std::fs::read_to_string(MEMINFO_PATH)
            .ok()
            .and_then(|contents| parse_meminfo(&contents));

        debug!("Host resources: parallelism={:?} memory_gb={:?}", parallelism, memory_gb);
        ResourceHints {
            memory_gb,
            parallelism,
        }
    }
}

/// Extracts `MemAvailable` in GiB from `/proc/meminfo` contents.
pub(crate) fn parse_meminfo(contents: &str) -> Option<f64> {
    contents.lines().find_map(|line| {
        let rest = line.strip_prefix("MemAvailable:")?;
        let kib: f64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
        Some(kib / (1024.0 * 1024.0))
    })
}
