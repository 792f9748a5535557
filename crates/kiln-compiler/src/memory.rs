//! Process resident-set sampling for the memory field of a result.

/// Resident set size in KiB, from `/proc/self/status`.
pub fn resident_kib() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kib| kib.parse().ok())
}

/// Growth between two samples in whole MiB.
pub fn delta_mib(before: Option<u64>, after: Option<u64>) -> Option<f64> {
    let (before, after) = (before?, after?);
    Some(((after as i64 - before as i64) / 1024) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tkiln\nVmPeak:\t  9000 kB\nVmRSS:\t  4096 kB\n";
        assert_eq!(parse_vm_rss(status), Some(4096));
        assert_eq!(parse_vm_rss("Name:\tkiln\n"), None);
    }

    #[test]
    fn test_delta_truncates_to_whole_mib() {
        assert_eq!(delta_mib(Some(1024), Some(4096)), Some(3.0));
        assert_eq!(delta_mib(Some(1024), Some(2000)), Some(0.0));
        assert_eq!(delta_mib(Some(4096), Some(1024)), Some(-3.0));
        assert_eq!(delta_mib(None, Some(1024)), None);
    }
}
