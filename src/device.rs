// src/device.rs
//
// Allocation side of the array abstraction: every padded scratch buffer is
// allocated through a Device so live/peak usage can be reported per device.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::{ConvError, Result};

#[derive(Debug, Default)]
struct DeviceStats {
    bytes: AtomicUsize,
    arrays: AtomicUsize,
    peak_bytes: AtomicUsize,
}

/// Cheap, cloneable handle to a named allocation domain.
#[derive(Debug, Clone)]
pub struct Device {
    name: Arc<str>,
    stats: Arc<DeviceStats>,
}

static CPU_DEVICE: OnceLock<Device> = OnceLock::new();
static PARALLEL_DEVICE: OnceLock<Device> = OnceLock::new();

impl Device {
    /// A fresh device with its own statistics.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            stats: Arc::new(DeviceStats::default()),
        }
    }

    /// Process-wide device used by the sequential backend.
    pub fn cpu() -> Self {
        CPU_DEVICE.get_or_init(|| Device::new("cpu")).clone()
    }

    /// Process-wide device used by the data-parallel backend.
    pub fn parallel() -> Self {
        PARALLEL_DEVICE
            .get_or_init(|| Device::new("parallel"))
            .clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allocated_bytes(&self) -> usize {
        self.stats.bytes.load(Ordering::Relaxed)
    }

    pub fn allocated_arrays(&self) -> usize {
        self.stats.arrays.load(Ordering::Relaxed)
    }

    pub fn peak_bytes(&self) -> usize {
        self.stats.peak_bytes.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> String {
        format!(
            "Device {}: {} bytes allocated in {} arrays.",
            self.name,
            self.allocated_bytes(),
            self.allocated_arrays()
        )
    }

    /// Allocate `len` elements initialised to `fill`.
    ///
    /// Fails with `ConvError::Allocation` instead of aborting when memory is exhausted.
    pub fn alloc<T: Clone>(&self, len: usize, fill: T) -> Result<DeviceBuffer<T>> {
        let bytes = len.saturating_mul(std::mem::size_of::<T>());
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| ConvError::Allocation {
                device: self.name.to_string(),
                bytes,
            })?;
        data.resize(len, fill);

        let now = self.stats.bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.stats.arrays.fetch_add(1, Ordering::Relaxed);
        self.stats.peak_bytes.fetch_max(now, Ordering::Relaxed);

        Ok(DeviceBuffer {
            data,
            bytes,
            device: self.clone(),
        })
    }
}

/// Buffer owned by a device; releases its accounting on drop.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    data: Vec<T>,
    bytes: usize,
    device: Device,
}

impl<T> DeviceBuffer<T> {
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl<T> Deref for DeviceBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for DeviceBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        self.device
            .stats
            .bytes
            .fetch_sub(self.bytes, Ordering::Relaxed);
        self.device.stats.arrays.fetch_sub(1, Ordering::Relaxed);
    }
}
