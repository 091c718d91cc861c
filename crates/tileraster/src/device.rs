//! Data-parallel compute device.
//!
//! The device owns a dedicated rayon pool and a memory ledger. Device buffers
//! are allocations separate from host arrays; every transfer between the two
//! is an explicit, counted copy. A dispatch runs one kernel body per unit of
//! work and returns only once every unit has finished, which is the barrier
//! between pipeline stages.

use crate::config::RasterConfig;
use crate::error::{RasterError, Result};
use crate::registry::Kernel;
use bytemuck::Pod;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Tracks bytes held by live device allocations against a fixed budget.
#[derive(Debug)]
struct MemoryLedger {
    budget: usize,
    used: AtomicUsize,
}

impl MemoryLedger {
    fn reserve(&self, bytes: usize) -> Result<()> {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let available = self.budget.saturating_sub(current);
            if bytes > available {
                return Err(RasterError::OutOfDeviceMemory {
                    requested: bytes,
                    available,
                });
            }
            match self.used.compare_exchange_weak(
                current,
                current + bytes,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

#[derive(Debug, Default)]
struct Counters {
    uploads: AtomicU64,
    upload_bytes: AtomicU64,
    downloads: AtomicU64,
    download_bytes: AtomicU64,
    dispatches: AtomicU64,
    synchronizations: AtomicU64,
}

/// Snapshot of the device's transfer and launch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub uploads: u64,
    pub upload_bytes: u64,
    pub downloads: u64,
    pub download_bytes: u64,
    pub dispatches: u64,
    pub synchronizations: u64,
}

impl TransferStats {
    /// Counter deltas between an earlier snapshot and this one.
    pub fn since(&self, earlier: &TransferStats) -> TransferStats {
        TransferStats {
            uploads: self.uploads - earlier.uploads,
            upload_bytes: self.upload_bytes - earlier.upload_bytes,
            downloads: self.downloads - earlier.downloads,
            download_bytes: self.download_bytes - earlier.download_bytes,
            dispatches: self.dispatches - earlier.dispatches,
            synchronizations: self.synchronizations - earlier.synchronizations,
        }
    }
}

struct DeviceInner {
    pool: rayon::ThreadPool,
    ledger: Arc<MemoryLedger>,
    counters: Counters,
}

/// Handle to the compute device. Cloning shares the same pool and ledger.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("threads", &self.inner.pool.current_num_threads())
            .field("memory_in_use", &self.memory_in_use())
            .field("memory_budget", &self.inner.ledger.budget)
            .finish()
    }
}

impl Device {
    /// Creates a device with its own worker pool.
    pub fn new(config: &RasterConfig) -> Result<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("tileraster-worker-{i}"));
        if let Some(threads) = config.worker_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        log::info!(
            "Device ready: {} worker threads, memory budget {:.1} MiB",
            pool.current_num_threads(),
            config.device_memory_budget as f64 / (1024.0 * 1024.0)
        );

        Ok(Self {
            inner: Arc::new(DeviceInner {
                pool,
                ledger: Arc::new(MemoryLedger {
                    budget: config.device_memory_budget,
                    used: AtomicUsize::new(0),
                }),
                counters: Counters::default(),
            }),
        })
    }

    /// Allocates a zero-initialised buffer of `count` elements.
    pub fn allocate<T: Pod>(&self, count: usize) -> Result<DeviceBuffer<T>> {
        let bytes = count.saturating_mul(std::mem::size_of::<T>());
        self.inner.ledger.reserve(bytes)?;
        Ok(DeviceBuffer {
            data: vec![T::zeroed(); count],
            bytes,
            ledger: Arc::clone(&self.inner.ledger),
        })
    }

    /// Allocates `count` zeroed 32-bit cells that kernels may update atomically.
    pub fn allocate_atomic(&self, count: usize) -> Result<AtomicBuffer> {
        let bytes = count.saturating_mul(std::mem::size_of::<AtomicU32>());
        self.inner.ledger.reserve(bytes)?;
        Ok(AtomicBuffer {
            cells: (0..count).map(|_| AtomicU32::new(0)).collect(),
            bytes,
            ledger: Arc::clone(&self.inner.ledger),
        })
    }

    /// Copies `src` to the front of `dst`. `src` must not be longer than `dst`.
    pub fn upload<T: Pod>(&self, dst: &mut DeviceBuffer<T>, src: &[T]) {
        assert!(
            src.len() <= dst.len(),
            "upload of {} elements into a buffer of {}",
            src.len(),
            dst.len()
        );
        dst.data[..src.len()].copy_from_slice(src);
        self.count_upload(bytemuck::cast_slice::<T, u8>(src).len());
    }

    /// Copies the front of `src` into `dst`.
    pub fn download<T: Pod>(&self, dst: &mut [T], src: &DeviceBuffer<T>) {
        assert!(
            dst.len() <= src.len(),
            "download of {} elements from a buffer of {}",
            dst.len(),
            src.len()
        );
        dst.copy_from_slice(&src.data[..dst.len()]);
        self.count_download(bytemuck::cast_slice::<T, u8>(dst).len());
    }

    /// Copies raw 32-bit words into atomic cells.
    pub fn upload_atomic(&self, dst: &AtomicBuffer, src: &[u32]) {
        assert!(src.len() <= dst.len());
        for (cell, value) in dst.cells.iter().zip(src) {
            cell.store(*value, Ordering::Relaxed);
        }
        self.count_upload(std::mem::size_of_val(src));
    }

    /// Copies atomic cells out as raw 32-bit words.
    pub fn download_atomic(&self, dst: &mut [u32], src: &AtomicBuffer) {
        assert!(dst.len() <= src.len());
        for (value, cell) in dst.iter_mut().zip(&src.cells) {
            *value = cell.load(Ordering::Relaxed);
        }
        self.count_download(std::mem::size_of_val(dst));
    }

    /// Launches `parallelism` units of work, calling `body(index)` for each.
    ///
    /// Returns once all units have completed.
    pub fn dispatch<F>(&self, kernel: &Kernel, parallelism: usize, body: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        self.record_launch(kernel, parallelism);
        self.inner
            .pool
            .install(|| (0..parallelism).into_par_iter().for_each(&body));
    }

    /// Launches one unit of work per element of `items`; each unit owns its
    /// element exclusively.
    pub fn dispatch_each<T, F>(&self, kernel: &Kernel, items: &mut [T], body: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync + Send,
    {
        self.record_launch(kernel, items.len());
        self.inner.pool.install(|| {
            items
                .par_iter_mut()
                .enumerate()
                .for_each(|(index, item)| body(index, item))
        });
    }

    /// Blocks until all submitted work is complete.
    ///
    /// Dispatches already return at completion, so this only marks the
    /// host/device hand-off point of the frame.
    pub fn synchronize(&self) {
        self.inner
            .counters
            .synchronizations
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Current transfer and launch counters.
    pub fn stats(&self) -> TransferStats {
        let c = &self.inner.counters;
        TransferStats {
            uploads: c.uploads.load(Ordering::Relaxed),
            upload_bytes: c.upload_bytes.load(Ordering::Relaxed),
            downloads: c.downloads.load(Ordering::Relaxed),
            download_bytes: c.download_bytes.load(Ordering::Relaxed),
            dispatches: c.dispatches.load(Ordering::Relaxed),
            synchronizations: c.synchronizations.load(Ordering::Relaxed),
        }
    }

    /// Bytes held by live allocations.
    pub fn memory_in_use(&self) -> usize {
        self.inner.ledger.used.load(Ordering::Relaxed)
    }

    /// Configured memory budget in bytes.
    pub fn memory_budget(&self) -> usize {
        self.inner.ledger.budget
    }

    /// Number of worker threads executing dispatches.
    pub fn worker_threads(&self) -> usize {
        self.inner.pool.current_num_threads()
    }

    fn record_launch(&self, kernel: &Kernel, parallelism: usize) {
        kernel.record_launch();
        self.inner.counters.dispatches.fetch_add(1, Ordering::Relaxed);
        log::trace!("dispatch {} x{}", kernel.label(), parallelism);
    }

    fn count_upload(&self, bytes: usize) {
        let c = &self.inner.counters;
        c.uploads.fetch_add(1, Ordering::Relaxed);
        c.upload_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn count_download(&self, bytes: usize) {
        let c = &self.inner.counters;
        c.downloads.fetch_add(1, Ordering::Relaxed);
        c.download_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}

/// A typed device allocation. Memory returns to the budget on drop.
pub struct DeviceBuffer<T> {
    data: Vec<T>,
    bytes: usize,
    ledger: Arc<MemoryLedger>,
}

impl<T> DeviceBuffer<T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the allocation in bytes.
    pub fn size_bytes(&self) -> usize {
        self.bytes
    }

    /// Device-side view for kernels.
    pub(crate) fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> std::fmt::Debug for DeviceBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("len", &self.data.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl<T> Drop for DeviceBuffer<T> {
    fn drop(&mut self) {
        self.ledger.release(self.bytes);
    }
}

/// A device allocation of 32-bit cells shared between concurrent units of work.
pub struct AtomicBuffer {
    cells: Vec<AtomicU32>,
    bytes: usize,
    ledger: Arc<MemoryLedger>,
}

impl AtomicBuffer {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes
    }

    pub(crate) fn cells(&self) -> &[AtomicU32] {
        &self.cells
    }

    /// Relaxed read of one cell.
    #[inline]
    pub fn load(&self, index: usize) -> u32 {
        self.cells[index].load(Ordering::Relaxed)
    }

    /// Relaxed write of one cell.
    #[inline]
    pub fn store(&self, index: usize, value: u32) {
        self.cells[index].store(value, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for AtomicBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicBuffer")
            .field("len", &self.cells.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl Drop for AtomicBuffer {
    fn drop(&mut self) {
        self.ledger.release(self.bytes);
    }
}
