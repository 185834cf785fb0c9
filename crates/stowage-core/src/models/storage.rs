//! Per-owner storage usage.

use serde::{Deserialize, Serialize};

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub used_space: i64,
    pub total_space: i64,
    pub used_space_formatted: String,
    pub total_space_formatted: String,
    pub usage_percent: i64,
}

impl StorageInfo {
    pub fn new(used_space: i64, total_space: i64) -> Self {
        let usage_percent = if total_space > 0 {
            ((used_space as f64 / total_space as f64) * 100.0) as i64
        } else {
            0
        };

        Self {
            used_space,
            total_space,
            used_space_formatted: format_storage_size(used_space),
            total_space_formatted: format_storage_size(total_space),
            usage_percent,
        }
    }

    /// Bytes still available; never negative.
    pub fn remaining(&self) -> i64 {
        (self.total_space - self.used_space).max(0)
    }
}

/// Human-readable size in base-1024 units with one decimal (`"1.5 KB"`); whole bytes below 1 KB.
pub fn format_storage_size(size: i64) -> String {
    if size < 1024 {
        return format!("{} B", size);
    }

    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_storage_size() {
        assert_eq!(format_storage_size(0), "0 B");
        assert_eq!(format_storage_size(1023), "1023 B");
        assert_eq!(format_storage_size(1536), "1.5 KB");
        assert_eq!(format_storage_size(20 * 1024 * 1024), "20.0 MB");
        assert_eq!(format_storage_size(3 * 1024 * 1024 * 1024), "3.0 GB");
        assert_eq!(format_storage_size(1024_i64.pow(5) * 2), "2.0 PB");
    }

    #[test]
    fn test_usage_percent() {
        let info = StorageInfo::new(50, 200);
        assert_eq!(info.usage_percent, 25);
        assert_eq!(info.remaining(), 150);

        // A zero limit allows nothing; the percentage is reported as 0
        let zero_limit = StorageInfo::new(500, 0);
        assert_eq!(zero_limit.usage_percent, 0);
        assert_eq!(zero_limit.remaining(), 0);
    }
}
