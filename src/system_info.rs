//! Host description attached to every report

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Identity and capacity of the machine the probes ran on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    /// Kernel name and release, e.g. `Linux 6.8.0`
    pub platform: String,
    pub hostname: String,
    pub machine: String,
    pub kernel_version: String,
    pub cpu_count: usize,
    /// Physical memory in bytes (0 when unknown)
    pub total_memory: u64,
    /// First `cpu MHz` entry of /proc/cpuinfo (0 when unknown)
    pub cpu_freq_mhz: u64,
    /// Seconds since the unix epoch when the info was gathered
    pub timestamp: u64,
}

impl SystemInfo {
    /// Query the running host; missing pieces stay empty or zero
    pub fn gather() -> Self {
        let mut info = SystemInfo {
            cpu_count: cpu_count(),
            total_memory: total_memory(),
            cpu_freq_mhz: cpu_freq_mhz(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            ..SystemInfo::default()
        };

        match nix::sys::utsname::uname() {
            Ok(uts) => {
                info.platform = format!(
                    "{} {}",
                    uts.sysname().to_string_lossy(),
                    uts.release().to_string_lossy()
                );
                info.hostname = uts.nodename().to_string_lossy().into_owned();
                info.kernel_version = uts.version().to_string_lossy().into_owned();
                info.machine = uts.machine().to_string_lossy().into_owned();
            }
            Err(errno) => {
                debug!("uname failed: {}", errno);
                info.platform = std::env::consts::OS.to_string();
                info.machine = std::env::consts::ARCH.to_string();
            }
        }

        info
    }
}

fn cpu_count() -> usize {
    // SAFETY: sysconf has no preconditions
    let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if online > 0 {
        return online as usize;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(target_os = "linux")]
fn total_memory() -> u64 {
    match nix::sys::sysinfo::sysinfo() {
        Ok(info) => info.ram_total(),
        Err(errno) => {
            debug!("sysinfo failed: {}", errno);
            0
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn total_memory() -> u64 {
    // SAFETY: sysconf has no preconditions
    let (pages, page_size) = unsafe {
        (
            libc::sysconf(libc::_SC_PHYS_PAGES),
            libc::sysconf(libc::_SC_PAGESIZE),
        )
    };
    if pages > 0 && page_size > 0 {
        (pages as u64).saturating_mul(page_size as u64)
    } else {
        0
    }
}

fn cpu_freq_mhz() -> u64 {
    std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|text| parse_cpu_mhz(&text))
        .unwrap_or(0)
}

/// First `cpu MHz` value in /proc/cpuinfo text, truncated to whole MHz
pub fn parse_cpu_mhz(cpuinfo: &str) -> Option<u64> {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("cpu MHz"))
        .find_map(|line| {
            let (_, value) = line.split_once(':')?;
            let mhz: f64 = value.trim().parse().ok()?;
            (mhz.is_finite() && mhz >= 0.0).then_some(mhz as u64)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_mhz_first_entry() {
        let text = "processor\t: 0\ncpu MHz\t\t: 2399.998\nprocessor\t: 1\ncpu MHz\t\t: 3100.000\n";
        assert_eq!(parse_cpu_mhz(text), Some(2399));
    }

    #[test]
    fn test_parse_cpu_mhz_missing() {
        assert_eq!(parse_cpu_mhz("processor\t: 0\nmodel name\t: ARMv8\n"), None);
    }

    #[test]
    fn test_parse_cpu_mhz_garbage_value() {
        assert_eq!(parse_cpu_mhz("cpu MHz\t\t: fast\n"), None);
    }

    #[test]
    fn test_gather_fills_basics() {
        let info = SystemInfo::gather();
        assert!(!info.platform.is_empty());
        assert!(info.cpu_count >= 1);
        assert!(info.timestamp > 0);
    }

    #[test]
    fn test_serializes_every_field() {
        let json = serde_json::to_value(SystemInfo::gather()).unwrap();
        for key in [
            "platform",
            "hostname",
            "machine",
            "kernel_version",
            "cpu_count",
            "total_memory",
            "cpu_freq_mhz",
            "timestamp",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
