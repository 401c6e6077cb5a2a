use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::{Duration, Instant};

use super::constants::{GPU_WORKERS, MAX_AUTO_CPU_WORKERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
        }
    }
}

/// Device requested on the command line; `Auto` defers to detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChoice {
    Cpu,
    Cuda,
    Auto,
}

impl FromStr for DeviceChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceChoice::Cpu),
            "cuda" => Ok(DeviceChoice::Cuda),
            "auto" => Ok(DeviceChoice::Auto),
            other => Err(format!("device must be cpu, cuda or auto, got '{other}'")),
        }
    }
}

/// Weight precision. Selects which quantization of the model file is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeType {
    Int8,
    Float16,
}

impl ComputeType {
    pub fn default_for(device: Device) -> Self {
        match device {
            Device::Cpu => ComputeType::Int8,
            Device::Cuda => ComputeType::Float16,
        }
    }
}

impl std::fmt::Display for ComputeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeType::Int8 => write!(f, "int8"),
            ComputeType::Float16 => write!(f, "float16"),
        }
    }
}

impl FromStr for ComputeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int8" => Ok(ComputeType::Int8),
            "float16" | "fp16" => Ok(ComputeType::Float16),
            other => Err(format!("compute type must be int8 or float16, got '{other}'")),
        }
    }
}

/// What the machine offers, captured once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareSnapshot {
    pub cpu_cores: usize,
    pub gpu_name: Option<String>,
}

impl HardwareSnapshot {
    /// Count CPU cores and ask `nvidia-smi` for a GPU name.
    pub fn probe() -> Self {
        let cpu_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            cpu_cores,
            gpu_name: probe_nvidia_gpu(Duration::from_secs(2)),
        }
    }
}

/// User overrides; `None` fields are filled from defaults or detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareRequest {
    pub device: Option<DeviceChoice>,
    pub compute_type: Option<ComputeType>,
    pub workers: Option<usize>,
    pub auto: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedHardware {
    pub device: Device,
    pub compute_type: ComputeType,
    pub workers: usize,
    /// Whether detection filled in unset fields.
    pub auto_selected: bool,
}

/// The best configuration for `snapshot` with no user input.
pub fn recommended(snapshot: &HardwareSnapshot) -> ResolvedHardware {
    if snapshot.gpu_name.is_some() {
        ResolvedHardware {
            device: Device::Cuda,
            compute_type: ComputeType::Float16,
            workers: GPU_WORKERS,
            auto_selected: true,
        }
    } else {
        ResolvedHardware {
            device: Device::Cpu,
            compute_type: ComputeType::Int8,
            workers: snapshot
                .cpu_cores
                .saturating_sub(2)
                .clamp(1, MAX_AUTO_CPU_WORKERS),
            auto_selected: true,
        }
    }
}

/// Merge explicit choices with detection.
///
/// Detection applies when `auto` is set, when the device is `auto`, or
/// when neither device nor worker count was given. Otherwise unset fields fall back to CPU, the compute
/// type matching the device, and a single worker.
pub fn resolve(request: &HardwareRequest, snapshot: &HardwareSnapshot) -> ResolvedHardware {
    let detected = recommended(snapshot);
    let use_detection = request.auto
        || request.device == Some(DeviceChoice::Auto)
        || (request.device.is_none() && request.workers.is_none());

    let device = match request.device {
        Some(DeviceChoice::Cpu) => Device::Cpu,
        Some(DeviceChoice::Cuda) => Device::Cuda,
        Some(DeviceChoice::Auto) => detected.device,
        None if use_detection => detected.device,
        None => Device::Cpu,
    };

    let compute_type = request.compute_type.unwrap_or_else(|| ComputeType::default_for(device));

    let workers = match request.workers {
        Some(n) => n.max(1),
        None if use_detection && device == detected.device => detected.workers,
        None if use_detection => recommended(&HardwareSnapshot {
            cpu_cores: snapshot.cpu_cores,
            gpu_name: None,
        })
        .workers,
        None => 1,
    };

    ResolvedHardware {
        device,
        compute_type,
        workers,
        auto_selected: use_detection,
    }
}

fn probe_nvidia_gpu(timeout: Duration) -> Option<String> {
    let mut child = Command::new("nvidia-smi")
        .args(["--query-gpu=name", "--format=csv,noheader"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => break,
            Ok(Some(_)) | Err(_) => return None,
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                log::debug!("nvidia-smi timed out after {timeout:?}");
                return None;
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(20)),
        }
    }

    let output = child.wait_with_output().ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let name = stdout.lines().next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cpu_only(cores: usize) -> HardwareSnapshot {
        HardwareSnapshot {
            cpu_cores: cores,
            gpu_name: None,
        }
    }

    fn with_gpu() -> HardwareSnapshot {
        HardwareSnapshot {
            cpu_cores: 12,
            gpu_name: Some("NVIDIA GeForce RTX 3060".to_string()),
        }
    }

    #[rstest]
    #[case::many_cores(16, 8)]
    #[case::ten_cores(10, 8)]
    #[case::six_cores(6, 4)]
    #[case::two_cores(2, 1)]
    #[case::single_core(1, 1)]
    fn test_cpu_worker_recommendation(#[case] cores: usize, #[case] workers: usize) {
        let hw = recommended(&cpu_only(cores));
        assert_eq!(hw.device, Device::Cpu);
        assert_eq!(hw.compute_type, ComputeType::Int8);
        assert_eq!(hw.workers, workers);
    }

    #[test]
    fn test_gpu_recommendation() {
        let hw = recommended(&with_gpu());
        assert_eq!(hw.device, Device::Cuda);
        assert_eq!(hw.compute_type, ComputeType::Float16);
        assert_eq!(hw.workers, GPU_WORKERS);
    }

    #[test]
    fn test_empty_request_uses_detection() {
        let hw = resolve(&HardwareRequest::default(), &with_gpu());
        assert_eq!(hw.device, Device::Cuda);
        assert_eq!(hw.workers, GPU_WORKERS);
        assert!(hw.auto_selected);
    }

    #[test]
    fn test_explicit_workers_disable_detection() {
        let request = HardwareRequest {
            workers: Some(3),
            ..Default::default()
        };
        let hw = resolve(&request, &with_gpu());
        assert_eq!(hw.device, Device::Cpu);
        assert_eq!(hw.compute_type, ComputeType::Int8);
        assert_eq!(hw.workers, 3);
        assert!(!hw.auto_selected);
    }

    #[test]
    fn test_explicit_cuda_without_detection_defaults_to_float16() {
        let request = HardwareRequest {
            device: Some(DeviceChoice::Cuda),
            ..Default::default()
        };
        let hw = resolve(&request, &cpu_only(8));
        assert_eq!(hw.device, Device::Cuda);
        assert_eq!(hw.compute_type, ComputeType::Float16);
        assert_eq!(hw.workers, 1);
    }

    #[test]
    fn test_auto_flag_fills_unset_fields_only() {
        let request = HardwareRequest {
            compute_type: Some(ComputeType::Float16),
            auto: true,
            ..Default::default()
        };
        let hw = resolve(&request, &cpu_only(8));
        assert_eq!(hw.device, Device::Cpu);
        assert_eq!(hw.compute_type, ComputeType::Float16);
        assert_eq!(hw.workers, 6);
    }

    #[test]
    fn test_auto_device_choice_follows_detection() {
        let request = HardwareRequest {
            device: Some(DeviceChoice::Auto),
            workers: Some(2),
            ..Default::default()
        };
        let hw = resolve(&request, &with_gpu());
        assert_eq!(hw.device, Device::Cuda);
        assert_eq!(hw.workers, 2);
    }

    #[test]
    fn test_auto_device_alone_takes_detected_workers() {
        let request = HardwareRequest {
            device: Some(DeviceChoice::Auto),
            ..Default::default()
        };
        let hw = resolve(&request, &cpu_only(6));
        assert_eq!(hw.device, Device::Cpu);
        assert_eq!(hw.workers, 4);
        assert!(hw.auto_selected);
    }

    #[test]
    fn test_forced_cpu_on_gpu_machine_uses_cpu_workers() {
        let request = HardwareRequest {
            device: Some(DeviceChoice::Cpu),
            auto: true,
            ..Default::default()
        };
        let hw = resolve(&request, &with_gpu());
        assert_eq!(hw.device, Device::Cpu);
        assert_eq!(hw.compute_type, ComputeType::Int8);
        assert_eq!(hw.workers, 8);
    }

    #[test]
    fn test_zero_workers_clamped_to_one() {
        let request = HardwareRequest {
            workers: Some(0),
            ..Default::default()
        };
        assert_eq!(resolve(&request, &cpu_only(4)).workers, 1);
    }

    #[rstest]
    #[case("cpu", DeviceChoice::Cpu)]
    #[case("CUDA", DeviceChoice::Cuda)]
    #[case("auto", DeviceChoice::Auto)]
    fn test_parse_device_choice(#[case] raw: &str, #[case] expected: DeviceChoice) {
        assert_eq!(raw.parse::<DeviceChoice>().unwrap(), expected);
    }

    #[test]
    fn test_parse_invalid_values() {
        assert!("tpu".parse::<DeviceChoice>().is_err());
        assert!("int4".parse::<ComputeType>().is_err());
    }

    #[test]
    fn test_compute_type_round_trips_through_display() {
        for ct in [ComputeType::Int8, ComputeType::Float16] {
            assert_eq!(ct.to_string().parse::<ComputeType>().unwrap(), ct);
        }
    }
}
