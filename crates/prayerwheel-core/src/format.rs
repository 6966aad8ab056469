//! Display helpers for counts and offline durations.

use chrono::Duration;

/// Myriad units, largest first. `u64` tops out below 10^20.
const UNITS: [(u64, &str); 4] = [
    (10_000_000_000_000_000, "京"),
    (1_000_000_000_000, "兆"),
    (100_000_000, "億"),
    (10_000, "万"),
];

/// Split a count into a rounded number and its unit, e.g. `(123, "万")`.
/// Counts below 10 000 have an empty unit.
pub fn count_parts(n: u64) -> (u64, &'static str) {
    for (threshold, unit) in UNITS {
        if n >= threshold {
            let rounded = (u128::from(n) + u128::from(threshold / 2)) / u128::from(threshold);
            return (rounded as u64, unit);
        }
    }
    (n, "")
}

/// `9999` → `"9999"`, `1_234_567` → `"123万"`, `250_000_000` → `"3億"`.
pub fn format_count(n: u64) -> String {
    let (value, unit) = count_parts(n);
    format!("{value}{unit}")
}

/// Human-readable offline time: `45秒`, `3.5分钟`, `2.0小时`, `1.5天`.
/// Negative durations read as zero.
pub fn format_offline_duration(d: Duration) -> String {
    let secs = d.num_milliseconds().max(0) as f64 / 1000.0;
    if secs < 60.0 {
        format!("{secs:.0}秒")
    } else if secs < 3600.0 {
        format!("{:.1}分钟", secs / 60.0)
    } else if secs < 86_400.0 {
        format!("{:.1}小时", secs / 3600.0)
    } else {
        format!("{:.1}天", secs / 86_400.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_counts_are_plain() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(9_999), "9999");
    }

    #[test]
    fn large_counts_use_largest_unit() {
        assert_eq!(format_count(10_000), "1万");
        assert_eq!(format_count(1_234_567), "123万");
        assert_eq!(format_count(19_999), "2万");
        assert_eq!(format_count(250_000_000), "3億");
        assert_eq!(format_count(5_000_000_000_000), "5兆");
        assert_eq!(format_count(u64::MAX), "1845京");
    }

    #[test]
    fn durations_pick_unit_by_magnitude() {
        assert_eq!(format_offline_duration(Duration::seconds(45)), "45秒");
        assert_eq!(format_offline_duration(Duration::seconds(210)), "3.5分钟");
        assert_eq!(format_offline_duration(Duration::hours(2)), "2.0小时");
        assert_eq!(format_offline_duration(Duration::hours(36)), "1.5天");
        assert_eq!(format_offline_duration(Duration::seconds(-5)), "0秒");
    }
}
