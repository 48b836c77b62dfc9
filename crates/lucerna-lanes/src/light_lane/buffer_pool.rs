// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persistent, grow-only GPU buffers shared by every camera.

use std::borrow::Cow;
use std::collections::HashMap;

use lucerna_core::renderer::{BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, ResourceError};

/// Default lower bound of a grown buffer, in elements.
pub const DEFAULT_MIN_CAPACITY: usize = 100;

/// Logical keys of the pooled buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PooledBufferId {
    /// `LightBound` array.
    LightBounds,
    /// `LightVolumeData` array.
    LightVolumes,
    /// `ScreenSpaceAabb` array.
    ScreenSpaceAabbs,
    /// Per-big-tile coarse light lists.
    CoarseLightList,
    /// Compacted per-cluster light indices.
    ClusterLightList,
    /// Per-voxel `VoxelRange` table.
    VoxelOffsets,
    /// Global append counter of the cluster list.
    ListCounter,
    /// Per-cluster-tile log base.
    LogBaseTweak,
    /// Punctual `LightData` array.
    PunctualLightData,
    /// `DirectionalLightData` array.
    DirectionalLightData,
    /// `ShadingConstants` uniform.
    ShadingConstants,
    /// `DispatchParams` slots of the chunked clears.
    ClearParams,
}

impl PooledBufferId {
    /// Debug label of the buffer.
    pub const fn label(self) -> &'static str {
        match self {
            PooledBufferId::LightBounds => "Lucerna Light Bounds",
            PooledBufferId::LightVolumes => "Lucerna Light Volumes",
            PooledBufferId::ScreenSpaceAabbs => "Lucerna Screen-Space AABBs",
            PooledBufferId::CoarseLightList => "Lucerna Coarse Light List",
            PooledBufferId::ClusterLightList => "Lucerna Cluster Light List",
            PooledBufferId::VoxelOffsets => "Lucerna Voxel Offsets",
            PooledBufferId::ListCounter => "Lucerna List Counter",
            PooledBufferId::LogBaseTweak => "Lucerna Log Base Tweak",
            PooledBufferId::PunctualLightData => "Lucerna Punctual Light Data",
            PooledBufferId::DirectionalLightData => "Lucerna Directional Light Data",
            PooledBufferId::ShadingConstants => "Lucerna Shading Constants",
            PooledBufferId::ClearParams => "Lucerna Clear Params",
        }
    }
}

/// How a pooled buffer is used, which fixes its usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PooledBufferKind {
    /// Read-write storage, copyable both ways.
    Storage,
    /// Uniform block.
    Uniform,
    /// Indirect dispatch arguments. Filled with `(0, 1, 1)` triples on creation.
    IndirectArgs,
}

impl PooledBufferKind {
    /// The usage flags a buffer of this kind is created with.
    pub fn usage(self) -> BufferUsage {
        match self {
            PooledBufferKind::Storage => {
                BufferUsage::STORAGE | BufferUsage::COPY_DST | BufferUsage::COPY_SRC
            }
            PooledBufferKind::Uniform => BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            PooledBufferKind::IndirectArgs => {
                BufferUsage::STORAGE | BufferUsage::INDIRECT | BufferUsage::COPY_DST
            }
        }
    }
}

/// A buffer held by the pool.
///
/// `capacity` may exceed what the current camera asked for; consumers must
/// carry explicit counts and never infer them from the buffer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PooledBuffer {
    /// Device buffer.
    pub id: BufferId,
    /// Capacity in elements.
    pub capacity: usize,
    /// Element size in bytes, fixed for the key's lifetime.
    pub stride: usize,
    /// Usage kind.
    pub kind: PooledBufferKind,
}

impl PooledBuffer {
    /// Size of the buffer in bytes.
    #[inline]
    pub fn size_in_bytes(&self) -> u64 {
        (self.capacity * self.stride) as u64
    }
}

/// Growth policy shared by the pool and the CPU staging arrays.
///
/// A first request gets exactly what it asks for. Later requests that do not
/// fit grow to `max(2 * capacity, requested)`, never below `min_capacity`.
#[inline]
pub fn grown_capacity(current: Option<usize>, requested: usize, min_capacity: usize) -> usize {
    match current {
        None => requested,
        Some(capacity) if requested <= capacity => capacity,
        Some(capacity) => (capacity * 2).max(requested).max(min_capacity),
    }
}

/// Keyed cache of persistent GPU buffers.
///
/// Buffers grow to the largest request seen across all cameras and never
/// shrink. Growth replaces the old buffer; its contents are not carried over.
/// Not thread-safe: one orchestrating thread drives it per frame.
#[derive(Debug)]
pub struct GpuBufferPool {
    buffers: HashMap<PooledBufferId, PooledBuffer>,
    min_capacity: usize,
    reallocations: u64,
}

impl Default for GpuBufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CAPACITY)
    }
}

impl GpuBufferPool {
    /// Creates an empty pool whose grown buffers hold at least `min_capacity` elements.
    pub fn new(min_capacity: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            min_capacity: min_capacity.max(1),
            reallocations: 0,
        }
    }

    /// Returns a buffer holding at least `count` elements of `stride` bytes.
    ///
    /// A `count` of zero is treated as one.
    ///
    /// # Panics
    ///
    /// Panics if `stride` or `kind` differ from the key's first allocation.
    /// Both are fixed for the lifetime of the pool.
    pub fn acquire(
        &mut self,
        device: &dyn GraphicsDevice,
        key: PooledBufferId,
        count: usize,
        stride: usize,
        kind: PooledBufferKind,
    ) -> Result<&PooledBuffer, ResourceError> {
        let count = count.max(1);
        let existing = self.buffers.get(&key).copied();

        if let Some(buffer) = existing {
            assert_eq!(
                buffer.stride, stride,
                "element stride of pooled buffer {key:?} must never change"
            );
            assert_eq!(
                buffer.kind, kind,
                "usage kind of pooled buffer {key:?} must never change"
            );
        }

        let capacity = grown_capacity(existing.map(|b| b.capacity), count, self.min_capacity);
        if existing.map(|b| b.capacity) == Some(capacity) {
            return self.buffers.get(&key).ok_or(ResourceError::NotFound);
        }

        let descriptor = BufferDescriptor {
            label: Some(Cow::Borrowed(key.label())),
            size: (capacity * stride) as u64,
            usage: kind.usage(),
            mapped_at_creation: false,
        };
        // The replacement is created first so a failed allocation leaves the
        // current buffer live and still held by the pool.
        let id = match kind {
            PooledBufferKind::IndirectArgs => {
                let words = (capacity * stride).div_ceil(4);
                let template: Vec<u32> = (0..words)
                    .map(|i| if i % 3 == 0 { 0 } else { 1 })
                    .collect();
                device.create_buffer_with_data(&descriptor, bytemuck::cast_slice(&template))?
            }
            _ => device.create_buffer(&descriptor)?,
        };
        log::debug!(
            "GpuBufferPool: Allocated {:?} ({} x {} bytes)",
            key,
            capacity,
            stride
        );

        let replaced = self.buffers.insert(
            key,
            PooledBuffer {
                id,
                capacity,
                stride,
                kind,
            },
        );
        if let Some(old) = replaced {
            log::info!(
                "GpuBufferPool: Grew {:?} from {} to {} elements",
                key,
                old.capacity,
                capacity
            );
            self.reallocations += 1;
            if let Err(e) = device.destroy_buffer(old.id) {
                log::warn!("GpuBufferPool: Failed to destroy old {:?}: {}", key, e);
            }
        }
        self.buffers.get(&key).ok_or(ResourceError::NotFound)
    }

    /// The buffer currently held for `key`.
    pub fn get(&self, key: PooledBufferId) -> Option<&PooledBuffer> {
        self.buffers.get(&key)
    }

    /// Current capacity of `key`, in elements.
    pub fn capacity(&self, key: PooledBufferId) -> Option<usize> {
        self.buffers.get(&key).map(|b| b.capacity)
    }

    /// Number of buffers held.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the pool holds no buffer.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Number of grow-and-reallocate events since creation.
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Destroys every buffer and clears the pool. Safe on an empty pool.
    pub fn release_all(&mut self, device: &dyn GraphicsDevice) {
        for (key, buffer) in self.buffers.drain() {
            if let Err(e) = device.destroy_buffer(buffer.id) {
                log::warn!("GpuBufferPool: Failed to destroy {:?}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light_lane::mock_device::MockGraphicsDevice;

    const STRIDE: usize = 64;

    #[test]
    fn first_allocation_is_exact() {
        let device = MockGraphicsDevice::default();
        let mut pool = GpuBufferPool::default();
        let buffer = *pool
            .acquire(&device, PooledBufferId::LightBounds, 7, STRIDE, PooledBufferKind::Storage)
            .unwrap();
        assert_eq!(buffer.capacity, 7);
        assert_eq!(buffer.size_in_bytes(), 7 * 64);
        assert_eq!(device.live_buffers(), 1);
    }

    #[test]
    fn growth_doubles_with_minimum_baseline() {
        let device = MockGraphicsDevice::default();
        let mut pool = GpuBufferPool::default();
        let key = PooledBufferId::LightVolumes;
        pool.acquire(&device, key, 10, STRIDE, PooledBufferKind::Storage).unwrap();
        pool.acquire(&device, key, 11, STRIDE, PooledBufferKind::Storage).unwrap();
        assert_eq!(pool.capacity(key), Some(100));
        pool.acquire(&device, key, 150, STRIDE, PooledBufferKind::Storage).unwrap();
        assert_eq!(pool.capacity(key), Some(200));
        pool.acquire(&device, key, 1000, STRIDE, PooledBufferKind::Storage).unwrap();
        assert_eq!(pool.capacity(key), Some(1000));
        assert_eq!(pool.reallocations(), 3);
        assert_eq!(device.live_buffers(), 1);
    }

    #[test]
    fn smaller_requests_return_the_same_buffer() {
        let device = MockGraphicsDevice::default();
        let mut pool = GpuBufferPool::default();
        let key = PooledBufferId::ScreenSpaceAabbs;
        let first = *pool
            .acquire(&device, key, 500, 32, PooledBufferKind::Storage)
            .unwrap();
        let mut last_capacity = first.capacity;
        for count in [1, 499, 500, 3, 0] {
            let again = *pool.acquire(&device, key, count, 32, PooledBufferKind::Storage).unwrap();
            assert_eq!(again, first);
            assert!(again.capacity >= last_capacity);
            last_capacity = again.capacity;
        }
        assert_eq!(pool.reallocations(), 0);
    }

    #[test]
    fn zero_count_allocates_one_element() {
        let device = MockGraphicsDevice::default();
        let mut pool = GpuBufferPool::default();
        let buffer = *pool
            .acquire(&device, PooledBufferId::ListCounter, 0, 4, PooledBufferKind::Storage)
            .unwrap();
        assert_eq!(buffer.capacity, 1);
    }

    #[test]
    #[should_panic(expected = "stride")]
    fn stride_change_panics() {
        let device = MockGraphicsDevice::default();
        let mut pool = GpuBufferPool::default();
        let key = PooledBufferId::LightBounds;
        pool.acquire(&device, key, 4, 64, PooledBufferKind::Storage).unwrap();
        let _ = pool.acquire(&device, key, 4, 32, PooledBufferKind::Storage);
    }

    #[test]
    fn kinds_map_to_usage_flags() {
        let storage = PooledBufferKind::Storage.usage();
        assert!(storage.contains(BufferUsage::STORAGE | BufferUsage::COPY_SRC));
        let uniform = PooledBufferKind::Uniform.usage();
        assert!(uniform.contains(BufferUsage::UNIFORM));
        assert!(!uniform.contains(BufferUsage::STORAGE));
        assert!(PooledBufferKind::IndirectArgs.usage().contains(BufferUsage::INDIRECT));
    }

    #[test]
    fn indirect_args_are_prefilled() {
        let device = MockGraphicsDevice::default();
        let mut pool = GpuBufferPool::default();
        let buffer = *pool
            .acquire(&device, PooledBufferId::ClearParams, 2, 12, PooledBufferKind::IndirectArgs)
            .unwrap();
        let bytes = device.initial_data(buffer.id).unwrap();
        let words: Vec<u32> = bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect();
        assert_eq!(words, vec![0, 1, 1, 0, 1, 1]);
    }

    #[test]
    fn failed_growth_keeps_the_previous_buffer() {
        let device = MockGraphicsDevice::with_max_buffer_size(1 << 20);
        let mut pool = GpuBufferPool::default();
        let key = PooledBufferId::LightBounds;
        let first = *pool.acquire(&device, key, 10, STRIDE, PooledBufferKind::Storage).unwrap();

        assert!(pool.acquire(&device, key, 100_000, STRIDE, PooledBufferKind::Storage).is_err());
        assert_eq!(pool.get(key), Some(&first));
        assert_eq!(pool.reallocations(), 0);
        assert_eq!(device.live_buffers(), 1);

        let again = *pool.acquire(&device, key, 5, STRIDE, PooledBufferKind::Storage).unwrap();
        assert_eq!(again, first);
        assert!(device.is_live(again.id));
    }

    #[test]
    fn release_all_is_safe_when_empty_and_destroys_everything() {
        let device = MockGraphicsDevice::default();
        let mut pool = GpuBufferPool::default();
        pool.release_all(&device);
        for key in [PooledBufferId::LightBounds, PooledBufferId::VoxelOffsets] {
            pool.acquire(&device, key, 8, 8, PooledBufferKind::Storage).unwrap();
        }
        assert_eq!(device.live_buffers(), 2);
        pool.release_all(&device);
        assert!(pool.is_empty());
        assert_eq!(device.live_buffers(), 0);
        pool.release_all(&device);
    }
}
