//! Device identity for benchmark reports
//!
//! Resolves the `--device` identifier to a human-readable hardware name:
//! CPU brand via `sysinfo` (with a `/proc/cpuinfo` fallback on Linux),
//! GPU via `lspci` output. Parsing is split from probing so it can be
//! tested against fixture text.

use std::fs;
use std::process::Command;

use sysinfo::{CpuExt, System, SystemExt};

/// Placeholder when the CPU model cannot be determined
pub const UNKNOWN_CPU: &str = "CPU model not available";

/// Placeholder when the GPU model cannot be determined
pub const UNKNOWN_GPU: &str = "GPU model not available";

/// Resolve a device identifier to a display name.
///
/// `CPU` and `GPU` are probed; any other identifier is echoed back.
#[must_use]
pub fn device_name(device: &str) -> String {
    match device {
        "CPU" => cpu_model(),
        "GPU" => gpu_model(),
        other => other.to_string(),
    }
}

fn cpu_model() -> String {
    let mut sys = System::new();
    sys.refresh_cpu();

    if let Some(cpu) = sys.cpus().first() {
        let brand = cpu.brand().trim();
        if !brand.is_empty() {
            return brand.to_string();
        }
    }

    fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|raw| cpu_model_from_cpuinfo(&raw))
        .unwrap_or_else(|| UNKNOWN_CPU.to_string())
}

/// Extract the CPU model from `/proc/cpuinfo` contents
#[must_use]
pub fn cpu_model_from_cpuinfo(raw: &str) -> Option<String> {
    for line in raw.lines() {
        if line.starts_with("model name") {
            if let Some((_, value)) = line.split_once(':') {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

fn gpu_model() -> String {
    Command::new("lspci")
        .output()
        .ok()
        .and_then(|out| {
            let raw = String::from_utf8_lossy(&out.stdout).into_owned();
            gpu_model_from_lspci(&raw)
        })
        .unwrap_or_else(|| UNKNOWN_GPU.to_string())
}

/// Extract the display controller model from `lspci` output
#[must_use]
pub fn gpu_model_from_lspci(raw: &str) -> Option<String> {
    for line in raw.lines() {
        if line.contains("VGA compatible controller") || line.contains("3D controller") {
            if let Some((_, model)) = line.split_once(": ") {
                let model = model.replace("Intel Corporation", "");
                let model = model.trim();
                if !model.is_empty() {
                    return Some(model.to_string());
                }
            }
        }
    }
    None
}
