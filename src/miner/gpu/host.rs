// src/miner/gpu/host.rs
//! Host-emulated compute device
//!
//! Runs the kernel grid on the rayon thread pool. Used when the crate is
//! built without the `opencl` feature, and by tests.

use super::{ComputeDevice, GpuDeviceInfo, WorkGroups};
use crate::miner::algorithm::{self, Algorithm};
use crate::miner::target::meets_target;
use crate::types::{AlgorithmType, HASH_LEN, INPUT_LEN};
use crate::utils::error::MinerError;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

const MAX_WORK_GROUP_SIZE: usize = 1024;

/// Lists the single emulated device
pub fn enumerate() -> Vec<GpuDeviceInfo> {
    vec![GpuDeviceInfo {
        index: 0,
        platform: "host".to_string(),
        name: format!("rayon ({} threads)", rayon::current_num_threads()),
        compute_units: rayon::current_num_threads() as u32,
        max_work_group_size: MAX_WORK_GROUP_SIZE,
        global_memory: 0,
    }]
}

/// Compute device backed by the rayon pool
pub struct HostDevice {
    info: GpuDeviceInfo,
    hasher: Box<dyn Algorithm>,
    groups: WorkGroups,
}

impl HostDevice {
    /// Creates an emulated device for `algorithm`
    ///
    /// # Returns
    /// * `Err(MinerError)` - If the hasher for `algorithm` cannot be built
    pub fn new(
        info: GpuDeviceInfo,
        algorithm: AlgorithmType,
        groups: WorkGroups,
    ) -> Result<Self, MinerError> {
        let hasher = algorithm::hasher(algorithm)?;
        log::debug!(
            "Host device {} prepared for {}: {} x {} work items",
            info.name,
            algorithm,
            groups.count,
            groups.size
        );
        Ok(HostDevice {
            info,
            hasher,
            groups,
        })
    }
}

impl ComputeDevice for HostDevice {
    fn info(&self) -> &GpuDeviceInfo {
        &self.info
    }

    fn work_groups(&self) -> WorkGroups {
        self.groups
    }

    fn dispatch(
        &mut self,
        input: &[u8; INPUT_LEN],
        target: &[u8; HASH_LEN],
        base_nonce: u64,
        cancel: &AtomicBool,
    ) -> Result<Option<u32>, MinerError> {
        let global = u32::try_from(self.groups.global_size()).map_err(|_| {
            MinerError::GpuError(format!(
                "Global size {} exceeds the id range",
                self.groups.global_size()
            ))
        })?;
        let prototype = self.hasher.as_ref();

        let hit = (0..global)
            .into_par_iter()
            .map_init(
                || prototype.fork(),
                |algo, id| {
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                    let nonce = base_nonce.wrapping_add(1 + id as u64);
                    let mut data = *input;
                    data[..8].copy_from_slice(&nonce.to_le_bytes());
                    meets_target(&algo.hash(&data), target).then_some(id)
                },
            )
            .find_first(|hit| hit.is_some())
            .flatten();

        Ok(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::algorithm::{HashSearch, SearchStatus};
    use crate::miner::gpu::GpuHashSearch;

    fn device(kind: AlgorithmType) -> HostDevice {
        let info = enumerate().remove(0);
        HostDevice::new(info, kind, WorkGroups { size: 16, count: 4 }).unwrap()
    }

    #[test]
    fn max_target_hits_first_id() {
        let mut dev = device(AlgorithmType::Sha256);
        let cancel = AtomicBool::new(false);
        let hit = dev.dispatch(&[0; INPUT_LEN], &[0xff; 32], 7, &cancel).unwrap();
        assert_eq!(hit, Some(0));
    }

    #[test]
    fn zero_target_finds_nothing() {
        let mut dev = device(AlgorithmType::Sha3);
        let cancel = AtomicBool::new(false);
        let hit = dev.dispatch(&[0; INPUT_LEN], &[0x00; 32], 7, &cancel).unwrap();
        assert_eq!(hit, None);
    }

    #[test]
    fn hasher_is_forked_per_split() {
        let dev = device(AlgorithmType::Sha3);
        let mut forked = dev.hasher.fork();
        assert_eq!(forked.algorithm_type(), AlgorithmType::Sha3);
        let mut direct = algorithm::hasher(AlgorithmType::Sha3).unwrap();
        assert_eq!(forked.hash(&[3; INPUT_LEN]), direct.hash(&[3; INPUT_LEN]));
    }

    #[test]
    fn agrees_with_cpu_search() {
        // roughly one candidate in four qualifies
        let mut target = [0xff; 32];
        target[0] = 0x3f;
        let input = [9u8; INPUT_LEN];
        let cancel = AtomicBool::new(false);

        let mut gpu = GpuHashSearch::new(Box::new(device(AlgorithmType::Sha256)), AlgorithmType::Sha256).unwrap();
        let gpu_outcome = gpu.search(&input, &target, 1000, &cancel).unwrap();

        let mut algo = algorithm::hasher(AlgorithmType::Sha256).unwrap();
        let cpu_outcome = algorithm::search_nonces(algo.as_mut(), &input, &target, 1000, 64, &cancel);

        assert!(matches!(gpu_outcome.status, SearchStatus::Found { .. }));
        assert_eq!(gpu_outcome.status, cpu_outcome.status);
    }
}
