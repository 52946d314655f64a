//! Process resource gauges.
//!
//! Observable instruments; the SDK reader calls back into them at each
//! collection. CPU and memory figures come from procfs and are skipped on
//! platforms without it.

use std::time::Instant;

use opentelemetry::metrics::Meter;
use opentelemetry::KeyValue;

pub(crate) const SCOPE: &str = "forecast_service.process";

/// Clock ticks per second used by `/proc/<pid>/stat` times.
const USER_HZ: f64 = 100.0;

/// Register the process instruments on `meter`.
pub fn register(meter: &Meter) {
    let started = Instant::now();

    meter
        .f64_observable_counter("process.cpu.time")
        .with_description("Total CPU seconds broken down by mode.")
        .with_unit("s")
        .with_callback(|observer| {
            if let Some(times) = cpu_times() {
                observer.observe(times.user, &[KeyValue::new("cpu.mode", "user")]);
                observer.observe(times.system, &[KeyValue::new("cpu.mode", "system")]);
            }
        })
        .build();

    meter
        .u64_observable_gauge("process.memory.usage")
        .with_description("The amount of physical memory in use.")
        .with_unit("By")
        .with_callback(|observer| {
            if let Some(rss) = proc_status().resident_bytes {
                observer.observe(rss, &[]);
            }
        })
        .build();

    meter
        .u64_observable_gauge("process.thread.count")
        .with_description("Process threads count.")
        .with_unit("{thread}")
        .with_callback(|observer| {
            if let Some(threads) = proc_status().threads {
                observer.observe(threads, &[]);
            }
        })
        .build();

    meter
        .f64_observable_gauge("process.uptime")
        .with_description("The time the process has been running.")
        .with_unit("s")
        .with_callback(move |observer| {
            observer.observe(started.elapsed().as_secs_f64(), &[]);
        })
        .build();
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CpuTimes {
    user: f64,
    system: f64,
}

#[cfg(target_os = "linux")]
fn cpu_times() -> Option<CpuTimes> {
    let raw = std::fs::read_to_string("/proc/self/stat").ok()?;
    parse_proc_stat(&raw)
}

#[cfg(not(target_os = "linux"))]
fn cpu_times() -> Option<CpuTimes> {
    None
}

/// `utime` and `stime` are fields 14 and 15; the command name before them
/// may contain spaces, so counting starts after its closing parenthesis.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_stat(raw: &str) -> Option<CpuTimes> {
    let (_, rest) = raw.rsplit_once(')')?;
    let mut fields = rest.split_whitespace().skip(11);
    let utime: u64 = fields.next()?.parse().ok()?;
    let stime: u64 = fields.next()?.parse().ok()?;
    Some(CpuTimes {
        user: utime as f64 / USER_HZ,
        system: stime as f64 / USER_HZ,
    })
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ProcStatus {
    resident_bytes: Option<u64>,
    threads: Option<u64>,
}

#[cfg(target_os = "linux")]
fn proc_status() -> ProcStatus {
    std::fs::read_to_string("/proc/self/status")
        .map(|raw| parse_proc_status(&raw))
        .unwrap_or_default()
}

#[cfg(not(target_os = "linux"))]
fn proc_status() -> ProcStatus {
    ProcStatus::default()
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_status(raw: &str) -> ProcStatus {
    let mut status = ProcStatus::default();
    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let number = value
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok());
        match key {
            // Reported in kB.
            "VmRSS" => status.resident_bytes = number.map(|kb| kb * 1024),
            "Threads" => status.threads = number,
            _ => {}
        }
    }
    status
}
