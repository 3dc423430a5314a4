// src/miner/gpu/opencl.rs
//! OpenCL compute device
//!
//! One context, queue, program and kernel per configured device. The input
//! and target buffers are rewritten before every pass; the kernel records the
//! lowest qualifying global id with `atomic_min`.

use super::{ComputeDevice, GpuDeviceInfo, WorkGroups};
use crate::types::{AlgorithmType, HASH_LEN, INPUT_LEN};
use crate::utils::error::MinerError;
use ocl::enums::{DeviceInfo, DeviceInfoResult};
use ocl::{Buffer, Context, Device, Kernel, Platform, Program, Queue, flags};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

const SHA256_KERNEL: &str = include_str!("kernels/sha256.cl");
const SHA3_KERNEL: &str = include_str!("kernels/sha3.cl");
const KERNEL_NAME: &str = "mint";
const NO_RESULT: u32 = u32::MAX;

fn gpu_err(context: &str) -> impl Fn(ocl::Error) -> MinerError + '_ {
    move |e| MinerError::GpuError(format!("{}: {}", context, e))
}

fn info_err<E: Display>(context: &str) -> impl Fn(E) -> MinerError + '_ {
    move |e| MinerError::GpuError(format!("{}: {}", context, e))
}

/// Every device of every platform, in configuration index order
fn all_devices() -> Result<Vec<(Platform, Device)>, MinerError> {
    let mut devices = Vec::new();
    for platform in Platform::list() {
        let list = Device::list_all(platform).map_err(gpu_err("Unable to list OpenCL devices"))?;
        devices.extend(list.into_iter().map(|device| (platform, device)));
    }
    Ok(devices)
}

fn describe(index: usize, platform: &Platform, device: &Device) -> Result<GpuDeviceInfo, MinerError> {
    let compute_units = match device
        .info(DeviceInfo::MaxComputeUnits)
        .map_err(info_err("Unable to query compute units"))?
    {
        DeviceInfoResult::MaxComputeUnits(units) => units,
        _ => 0,
    };
    let global_memory = match device
        .info(DeviceInfo::GlobalMemSize)
        .map_err(info_err("Unable to query global memory"))?
    {
        DeviceInfoResult::GlobalMemSize(size) => size,
        _ => 0,
    };
    Ok(GpuDeviceInfo {
        index,
        platform: platform.name().map_err(info_err("Unable to query platform name"))?,
        name: device.name().map_err(info_err("Unable to query device name"))?,
        compute_units,
        max_work_group_size: device
            .max_wg_size()
            .map_err(info_err("Unable to query work group size"))?,
        global_memory,
    })
}

/// Lists the OpenCL devices on this system
pub fn enumerate() -> Result<Vec<GpuDeviceInfo>, MinerError> {
    all_devices()?
        .iter()
        .enumerate()
        .map(|(index, (platform, device))| describe(index, platform, device))
        .collect()
}

/// A compiled minting kernel bound to one OpenCL device
pub struct OpenClDevice {
    info: GpuDeviceInfo,
    groups: WorkGroups,
    queue: Queue,
    kernel: Kernel,
    input: Buffer<u8>,
    target: Buffer<u8>,
    result: Buffer<u32>,
}

impl OpenClDevice {
    /// Builds the program for `algorithm` on the device named by `info`
    pub fn open(
        info: &GpuDeviceInfo,
        algorithm: AlgorithmType,
        groups: WorkGroups,
    ) -> Result<Self, MinerError> {
        let source = match algorithm {
            AlgorithmType::Sha256 => SHA256_KERNEL,
            AlgorithmType::Sha3 => SHA3_KERNEL,
            other => {
                return Err(MinerError::GpuError(format!(
                    "No OpenCL kernel for {}",
                    other
                )));
            }
        };

        let (_, device) = all_devices()?
            .into_iter()
            .nth(info.index)
            .ok_or_else(|| MinerError::GpuError(format!("GPU device {} is not available", info.index)))?;

        let context = Context::builder()
            .devices(device)
            .build()
            .map_err(gpu_err("Failed to create OpenCL context"))?;
        let queue = Queue::new(&context, device, None).map_err(gpu_err("Failed to create OpenCL queue"))?;
        let program = Program::builder()
            .src(source)
            .devices(device)
            .build(&context)
            .map_err(gpu_err("Failed to build OpenCL program"))?;

        let input = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(flags::MEM_READ_ONLY)
            .len(INPUT_LEN)
            .build()
            .map_err(gpu_err("Failed to allocate input buffer"))?;
        let target = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(flags::MEM_READ_ONLY)
            .len(HASH_LEN)
            .build()
            .map_err(gpu_err("Failed to allocate target buffer"))?;
        let result = Buffer::<u32>::builder()
            .queue(queue.clone())
            .flags(flags::MEM_READ_WRITE)
            .len(1)
            .build()
            .map_err(gpu_err("Failed to allocate result buffer"))?;

        let kernel = Kernel::builder()
            .program(&program)
            .name(KERNEL_NAME)
            .queue(queue.clone())
            .global_work_size(groups.global_size())
            .local_work_size(groups.size)
            .arg(&input)
            .arg(&target)
            .arg(0u64)
            .arg(&result)
            .build()
            .map_err(gpu_err("Failed to create OpenCL kernel"))?;

        log::info!(
            "GPU {} ({}) prepared for {}: {} work groups of {} items",
            info.index,
            info.name,
            algorithm,
            groups.count,
            groups.size
        );

        Ok(OpenClDevice {
            info: info.clone(),
            groups,
            queue,
            kernel,
            input,
            target,
            result,
        })
    }
}

impl ComputeDevice for OpenClDevice {
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
        if cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }

        self.input
            .write(&input[..])
            .enq()
            .map_err(gpu_err("Failed to write input buffer"))?;
        self.target
            .write(&target[..])
            .enq()
            .map_err(gpu_err("Failed to write target buffer"))?;
        self.result
            .write(&[NO_RESULT][..])
            .enq()
            .map_err(gpu_err("Failed to reset result buffer"))?;
        self.kernel
            .set_arg(2, base_nonce)
            .map_err(gpu_err("Failed to set nonce argument"))?;

        #[allow(unsafe_code)]
        // kernel arguments are bound to buffers owned by this device
        unsafe {
            self.kernel.enq().map_err(gpu_err("Failed to enqueue kernel"))?;
        }

        let mut found = [NO_RESULT];
        self.result
            .read(&mut found[..])
            .enq()
            .map_err(gpu_err("Failed to read result buffer"))?;
        self.queue.finish().map_err(gpu_err("OpenCL queue failed"))?;

        Ok((found[0] != NO_RESULT).then_some(found[0]))
    }
}
