// src/miner/gpu/mod.rs
//! GPU batch search
//!
//! A [`ComputeDevice`] runs one kernel pass over a grid of
//! `work_group_size * work_group_count` candidates. Global id `i` tries nonce
//! `base + 1 + i`, and the pass reports the lowest qualifying id.
//! [`GpuHashSearch`] wraps a device in the common [`HashSearch`] contract and
//! re-hashes the winning nonce on the host to recover its digest.
//!
//! Devices come from the OpenCL backend when the `opencl` feature is
//! enabled, and from the host-emulated backend otherwise.

/// Host-emulated compute device
pub mod host;

/// OpenCL compute device
#[cfg(feature = "opencl")]
pub mod opencl;

use crate::miner::algorithm::{self, Algorithm, HashSearch, SearchOutcome, SearchStatus};
use crate::types::{AlgorithmType, HASH_LEN, INPUT_LEN};
use crate::utils::error::MinerError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default number of work items per work group
pub const DEFAULT_WORK_GROUP_SIZE: usize = 256;

/// Largest accepted GPU intensity (candidates per kernel pass)
pub const MAX_INTENSITY: u32 = 1_048_576;

/// Description of an available compute device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuDeviceInfo {
    /// Index used in the configuration
    pub index: usize,
    /// Platform (driver) name
    pub platform: String,
    /// Device name
    pub name: String,
    /// Number of compute units
    pub compute_units: u32,
    /// Largest work group the device accepts
    pub max_work_group_size: usize,
    /// Global memory in bytes
    pub global_memory: u64,
}

/// Work-group grid used for every kernel pass on one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkGroups {
    /// Work items per group
    pub size: usize,
    /// Number of groups per pass
    pub count: usize,
}

impl WorkGroups {
    /// Resolves the configured grid against a device
    ///
    /// An oversized group is clamped to the device maximum. A `count` of zero
    /// derives the count from the intensity.
    pub fn resolve(info: &GpuDeviceInfo, intensity: u32, size: usize, count: usize) -> Self {
        let max = info.max_work_group_size.max(1);
        let size = if size > max {
            log::warn!(
                "Work group size {} for GPU {} exceeds maximum size {} - using maximum size",
                size,
                info.index,
                max
            );
            max
        } else {
            size.max(1)
        };
        let count = if count == 0 {
            (intensity.max(1) as usize).div_ceil(size)
        } else {
            count
        };
        WorkGroups { size, count }
    }

    /// Candidates per kernel pass
    pub fn global_size(&self) -> usize {
        self.size * self.count
    }
}

/// A device able to run the minting kernel
pub trait ComputeDevice: Send {
    /// Device description
    fn info(&self) -> &GpuDeviceInfo;

    /// Grid used for each pass
    fn work_groups(&self) -> WorkGroups;

    /// Runs one kernel pass
    ///
    /// Returns the lowest global id whose digest meets the target.
    fn dispatch(
        &mut self,
        input: &[u8; INPUT_LEN],
        target: &[u8; HASH_LEN],
        base_nonce: u64,
        cancel: &AtomicBool,
    ) -> Result<Option<u32>, MinerError>;
}

/// Lists the compute devices available to this build
pub fn enumerate() -> Result<Vec<GpuDeviceInfo>, MinerError> {
    #[cfg(feature = "opencl")]
    {
        opencl::enumerate()
    }
    #[cfg(not(feature = "opencl"))]
    {
        Ok(host::enumerate())
    }
}

/// Opens a device and prepares the kernel for `algorithm`
pub fn open(
    info: &GpuDeviceInfo,
    algorithm: AlgorithmType,
    groups: WorkGroups,
) -> Result<Box<dyn ComputeDevice>, MinerError> {
    if !algorithm.gpu_supported() {
        return Err(MinerError::ConfigError(format!(
            "Currency algorithm {} is not supported on the GPU",
            algorithm.id()
        )));
    }
    #[cfg(feature = "opencl")]
    {
        Ok(Box::new(opencl::OpenClDevice::open(info, algorithm, groups)?))
    }
    #[cfg(not(feature = "opencl"))]
    {
        Ok(Box::new(host::HostDevice::new(info.clone(), algorithm, groups)?))
    }
}

/// GPU backend implementing the common search contract
pub struct GpuHashSearch {
    device: Box<dyn ComputeDevice>,
    verifier: Box<dyn Algorithm>,
}

impl GpuHashSearch {
    /// Wraps an opened device
    pub fn new(device: Box<dyn ComputeDevice>, algorithm: AlgorithmType) -> Result<Self, MinerError> {
        Ok(GpuHashSearch {
            device,
            verifier: algorithm::hasher(algorithm)?,
        })
    }
}

impl HashSearch for GpuHashSearch {
    fn name(&self) -> String {
        let info = self.device.info();
        format!("gpu{}-{}", info.index, self.verifier.algorithm_type())
    }

    fn search(
        &mut self,
        input: &[u8; INPUT_LEN],
        target: &[u8; HASH_LEN],
        start_nonce: u64,
        cancel: &AtomicBool,
    ) -> Result<SearchOutcome, MinerError> {
        if cancel.load(Ordering::Relaxed) {
            return Ok(SearchOutcome {
                status: SearchStatus::Cancelled,
                last_nonce: start_nonce,
                hash_count: 0,
            });
        }

        let global = self.device.work_groups().global_size() as u64;
        let found = self.device.dispatch(input, target, start_nonce, cancel)?;

        if let Some(id) = found {
            let nonce = start_nonce.wrapping_add(1 + id as u64);
            let hash_count = id as u64 + 1;
            match self.verifier.verify(input, nonce, target) {
                Some(digest) => {
                    return Ok(SearchOutcome {
                        status: SearchStatus::Found { nonce, digest },
                        last_nonce: nonce,
                        hash_count,
                    });
                }
                None => {
                    return Err(MinerError::GpuError(format!(
                        "GPU {} reported nonce {} but the host digest does not meet the target",
                        self.device.info().index,
                        nonce
                    )));
                }
            }
        }

        // a cut-short pass does not say how much of the grid ran
        if cancel.load(Ordering::Relaxed) {
            return Ok(SearchOutcome {
                status: SearchStatus::Cancelled,
                last_nonce: start_nonce,
                hash_count: 0,
            });
        }
        Ok(SearchOutcome {
            status: SearchStatus::Exhausted,
            last_nonce: start_nonce.wrapping_add(global),
            hash_count: global,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_info(max: usize) -> GpuDeviceInfo {
        GpuDeviceInfo {
            index: 0,
            platform: "test".into(),
            name: "test device".into(),
            compute_units: 4,
            max_work_group_size: max,
            global_memory: 0,
        }
    }

    /// Reports a fixed global id on every pass
    struct FixedDevice {
        info: GpuDeviceInfo,
        answer: Option<u32>,
    }

    impl ComputeDevice for FixedDevice {
        fn info(&self) -> &GpuDeviceInfo {
            &self.info
        }

        fn work_groups(&self) -> WorkGroups {
            WorkGroups { size: 8, count: 4 }
        }

        fn dispatch(
            &mut self,
            _input: &[u8; INPUT_LEN],
            _target: &[u8; HASH_LEN],
            _base_nonce: u64,
            _cancel: &AtomicBool,
        ) -> Result<Option<u32>, MinerError> {
            Ok(self.answer)
        }
    }

    #[test]
    fn count_is_derived_from_intensity() {
        let groups = WorkGroups::resolve(&device_info(1024), 1000, 256, 0);
        assert_eq!(groups, WorkGroups { size: 256, count: 4 });
        assert_eq!(groups.global_size(), 1024);
    }

    #[test]
    fn oversized_group_is_clamped() {
        let groups = WorkGroups::resolve(&device_info(64), 4096, 256, 3);
        assert_eq!(groups, WorkGroups { size: 64, count: 3 });
    }

    #[test]
    fn found_id_maps_to_nonce_after_base() {
        let device = FixedDevice {
            info: device_info(64),
            answer: Some(5),
        };
        let mut search = GpuHashSearch::new(Box::new(device), AlgorithmType::Sha256).unwrap();
        let cancel = AtomicBool::new(false);
        let outcome = search.search(&[1; INPUT_LEN], &[0xff; 32], 100, &cancel).unwrap();
        match outcome.status {
            SearchStatus::Found { nonce, .. } => assert_eq!(nonce, 106),
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(outcome.hash_count, 6);
        assert_eq!(search.name(), "gpu0-sha256");
    }

    #[test]
    fn unverifiable_result_is_an_error() {
        let device = FixedDevice {
            info: device_info(64),
            answer: Some(0),
        };
        let mut search = GpuHashSearch::new(Box::new(device), AlgorithmType::Sha256).unwrap();
        let cancel = AtomicBool::new(false);
        assert!(search.search(&[1; INPUT_LEN], &[0x00; 32], 0, &cancel).is_err());
    }

    #[test]
    fn empty_pass_advances_by_grid() {
        let device = FixedDevice {
            info: device_info(64),
            answer: None,
        };
        let mut search = GpuHashSearch::new(Box::new(device), AlgorithmType::Sha3).unwrap();
        let cancel = AtomicBool::new(false);
        let outcome = search.search(&[1; INPUT_LEN], &[0x00; 32], 10, &cancel).unwrap();
        assert_eq!(outcome.status, SearchStatus::Exhausted);
        assert_eq!(outcome.last_nonce, 42);
        assert_eq!(outcome.hash_count, 32);
    }

    /// Raises the cancel flag while the pass is running
    struct CancellingDevice {
        info: GpuDeviceInfo,
    }

    impl ComputeDevice for CancellingDevice {
        fn info(&self) -> &GpuDeviceInfo {
            &self.info
        }

        fn work_groups(&self) -> WorkGroups {
            WorkGroups { size: 8, count: 4 }
        }

        fn dispatch(
            &mut self,
            _input: &[u8; INPUT_LEN],
            _target: &[u8; HASH_LEN],
            _base_nonce: u64,
            cancel: &AtomicBool,
        ) -> Result<Option<u32>, MinerError> {
            cancel.store(true, Ordering::Relaxed);
            Ok(None)
        }
    }

    #[test]
    fn cancelled_pass_counts_no_hashes() {
        let device = CancellingDevice {
            info: device_info(64),
        };
        let mut search = GpuHashSearch::new(Box::new(device), AlgorithmType::Sha256).unwrap();
        let cancel = AtomicBool::new(false);
        let outcome = search.search(&[1; INPUT_LEN], &[0x00; 32], 10, &cancel).unwrap();
        assert_eq!(outcome.status, SearchStatus::Cancelled);
        assert_eq!(outcome.hash_count, 0);
        assert_eq!(outcome.last_nonce, 10);
    }

    #[test]
    fn scrypt_cannot_open_a_gpu() {
        let groups = WorkGroups { size: 1, count: 1 };
        assert!(open(&device_info(64), AlgorithmType::Scrypt, groups).is_err());
    }
}
