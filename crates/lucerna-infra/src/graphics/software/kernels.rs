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

//! CPU versions of the culling kernels.
//!
//! Each kernel walks its workgroups in order and reproduces the WGSL
//! kernel's results. Appends happen in light-index order, which is one of
//! the orders a GPU may produce.

use std::collections::HashMap;

use bytemuck::Pod;
use lucerna_core::math::Mat4;
use lucerna_core::renderer::clustered::{
    accumulate_bound_part, bindings, bound_sphere_overlaps_voxel, light_intersects_voxel,
    suggest_log_base, AabbAccumulator, DepthSlicing, DispatchParams, LightBound, LightVolumeData,
    ScreenSpaceAabb, ShadingConstants, VoxelBounds, VoxelRange,
};
use lucerna_core::renderer::ResourceError;

/// A kernel the software backend can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SoftwareKernel {
    ClearLists,
    ScreenSpaceAabb,
    CoarseCull,
    ClusterCull,
}

impl SoftwareKernel {
    pub(crate) fn from_entry_point(entry_point: &str) -> Option<Self> {
        match entry_point {
            bindings::clear_lists::ENTRY_POINT => Some(Self::ClearLists),
            bindings::screen_space_aabb::ENTRY_POINT => Some(Self::ScreenSpaceAabb),
            bindings::coarse_cull::ENTRY_POINT => Some(Self::CoarseCull),
            bindings::cluster_cull::ENTRY_POINT => Some(Self::ClusterCull),
            _ => None,
        }
    }

    /// Every binding the kernel declares.
    pub(crate) fn bindings(self) -> &'static [u32] {
        use bindings::*;
        match self {
            Self::ClearLists => &[clear_lists::PARAMS, clear_lists::TARGET],
            Self::ScreenSpaceAabb => &[
                screen_space_aabb::CONSTANTS,
                screen_space_aabb::BOUNDS,
                screen_space_aabb::AABBS,
            ],
            Self::CoarseCull => &[
                coarse_cull::CONSTANTS,
                coarse_cull::AABBS,
                coarse_cull::COARSE_LIST,
            ],
            Self::ClusterCull => &[
                cluster_cull::CONSTANTS,
                cluster_cull::BOUNDS,
                cluster_cull::VOLUMES,
                cluster_cull::AABBS,
                cluster_cull::COARSE_LIST,
                cluster_cull::LIGHT_LIST,
                cluster_cull::VOXEL_OFFSETS,
                cluster_cull::COUNTER,
                cluster_cull::LOG_BASE_TWEAK,
            ],
        }
    }

    /// The read-write subset of [`bindings`](Self::bindings).
    pub(crate) fn writable_bindings(self) -> &'static [u32] {
        use bindings::*;
        match self {
            Self::ClearLists => &[clear_lists::TARGET],
            Self::ScreenSpaceAabb => &[screen_space_aabb::AABBS],
            Self::CoarseCull => &[coarse_cull::COARSE_LIST],
            Self::ClusterCull => &[
                cluster_cull::LIGHT_LIST,
                cluster_cull::VOXEL_OFFSETS,
                cluster_cull::COUNTER,
                cluster_cull::LOG_BASE_TWEAK,
            ],
        }
    }

    pub(crate) fn run(self, groups: [u32; 3], bound: &mut BoundResources<'_>) -> Result<(), ResourceError> {
        match self {
            Self::ClearLists => clear_lists(groups, bound),
            Self::ScreenSpaceAabb => screen_space_aabb(groups, bound),
            Self::CoarseCull => coarse_cull(groups, bound),
            Self::ClusterCull => cluster_cull(groups, bound),
        }
    }
}

/// The buffer ranges visible to one dispatch, keyed by binding index.
#[derive(Default)]
pub(crate) struct BoundResources<'a> {
    pub(crate) read: HashMap<u32, &'a [u32]>,
    pub(crate) write: HashMap<u32, &'a mut [u32]>,
}

fn missing(binding: u32) -> ResourceError {
    ResourceError::BackendError(format!("binding {binding} is not bound"))
}

fn whole_elements<T: Pod>(words: usize) -> usize {
    words * 4 / size_of::<T>() * size_of::<T>() / 4
}

impl<'a> BoundResources<'a> {
    fn uniform<T: Pod>(&self, binding: u32) -> Result<T, ResourceError> {
        let words = self.read.get(&binding).ok_or_else(|| missing(binding))?;
        let bytes: &[u8] = bytemuck::cast_slice::<u32, u8>(words);
        if bytes.len() < size_of::<T>() {
            return Err(ResourceError::OutOfBounds);
        }
        Ok(bytemuck::pod_read_unaligned(&bytes[..size_of::<T>()]))
    }

    fn storage<T: Pod>(&self, binding: u32) -> Result<&'a [T], ResourceError> {
        let words: &'a [u32] = self.read.get(&binding).copied().ok_or_else(|| missing(binding))?;
        bytemuck::try_cast_slice(&words[..whole_elements::<T>(words.len())])
            .map_err(|e| ResourceError::BackendError(format!("binding {binding}: {e}")))
    }

    fn storage_mut<T: Pod>(&mut self, binding: u32) -> Result<&'a mut [T], ResourceError> {
        let words = self.write.remove(&binding).ok_or_else(|| missing(binding))?;
        let len = whole_elements::<T>(words.len());
        bytemuck::try_cast_slice_mut(&mut words[..len])
            .map_err(|e| ResourceError::BackendError(format!("binding {binding}: {e}")))
    }
}

fn clear_lists(groups: [u32; 3], bound: &mut BoundResources<'_>) -> Result<(), ResourceError> {
    use bindings::clear_lists::*;
    let params: DispatchParams = bound.uniform(PARAMS)?;
    let words: &mut [u32] = bound.storage_mut(TARGET)?;
    for gid in 0..groups[0] * bindings::WORKGROUP_SIZE {
        let i = params.base_offset + gid;
        if i < params.element_count {
            if let Some(word) = words.get_mut(i as usize) {
                *word = params.clear_value;
            }
        }
    }
    Ok(())
}

fn screen_space_aabb(groups: [u32; 3], bound: &mut BoundResources<'_>) -> Result<(), ResourceError> {
    use bindings::screen_space_aabb::*;
    let constants: ShadingConstants = bound.uniform(CONSTANTS)?;
    let bounds: &[LightBound] = bound.storage(BOUNDS)?;
    let aabbs: &mut [ScreenSpaceAabb] = bound.storage_mut(AABBS)?;

    let screen_projection = Mat4::from_cols_array_2d(&constants.screen_projection);
    let ortho = constants.is_orthographic != 0;
    let near = constants.near;

    for group in 0..groups[0] {
        for slot in 0..bindings::LIGHTS_PER_AABB_GROUP {
            let light = group * bindings::LIGHTS_PER_AABB_GROUP + slot;
            if light >= constants.bound_count {
                break;
            }
            let Some(b) = bounds.get(light as usize) else {
                break;
            };
            let mut reduced = AabbAccumulator::default();
            if ortho || b.center[2] + b.radius >= near {
                for lane in 0..bindings::THREADS_PER_LIGHT {
                    let mut part = AabbAccumulator::default();
                    accumulate_bound_part(&mut part, b, &screen_projection, near, ortho, lane, bindings::THREADS_PER_LIGHT);
                    reduced.merge(&part.finish());
                }
            }
            if let Some(out) = aabbs.get_mut(light as usize) {
                *out = reduced.finish();
            }
        }
    }
    Ok(())
}

fn coarse_cull(groups: [u32; 3], bound: &mut BoundResources<'_>) -> Result<(), ResourceError> {
    use bindings::coarse_cull::*;
    let constants: ShadingConstants = bound.uniform(CONSTANTS)?;
    let aabbs: &[ScreenSpaceAabb] = bound.storage(AABBS)?;
    let list: &mut [u32] = bound.storage_mut(COARSE_LIST)?;

    let plus_one = constants.max_big_tile_lights_plus_one;
    let cap = plus_one.saturating_sub(1);
    let size = constants.big_tile_size as f32;
    let light_count = (constants.bound_count as usize).min(aabbs.len());

    for wy in 0..groups[1] {
        for wx in 0..groups[0] {
            let base = ((wy * constants.num_big_tiles_x + wx) * plus_one) as usize;
            if base + plus_one as usize > list.len() {
                continue;
            }
            let tile = &mut list[base..base + plus_one as usize];
            let (x0, y0) = (wx as f32 * size, wy as f32 * size);
            for (i, aabb) in aabbs[..light_count].iter().enumerate() {
                if aabb.overlaps_rect(x0, y0, x0 + size, y0 + size) {
                    let idx = tile[0];
                    tile[0] += 1;
                    if idx < cap {
                        tile[1 + idx as usize] = i as u32;
                    }
                }
            }
            tile[0] = tile[0].min(cap);
        }
    }
    Ok(())
}

struct ClusterInputs<'a> {
    bounds: &'a [LightBound],
    volumes: &'a [LightVolumeData],
    aabbs: &'a [ScreenSpaceAabb],
}

impl ClusterInputs<'_> {
    #[allow(clippy::too_many_arguments)]
    fn passes(&self, light: u32, category: u32, voxel: &VoxelBounds, x0: f32, y0: f32, x1: f32, y1: f32, z0: f32, z1: f32) -> bool {
        let i = light as usize;
        let (Some(volume), Some(aabb), Some(b)) = (self.volumes.get(i), self.aabbs.get(i), self.bounds.get(i)) else {
            return false;
        };
        volume.light_category == category
            && aabb.overlaps_depth(z0, z1)
            && aabb.overlaps_rect(x0, y0, x1, y1)
            && bound_sphere_overlaps_voxel(b, voxel)
            && light_intersects_voxel(volume, voxel)
    }
}

fn cluster_cull(groups: [u32; 3], bound: &mut BoundResources<'_>) -> Result<(), ResourceError> {
    use bindings::cluster_cull::*;
    let c: ShadingConstants = bound.uniform(CONSTANTS)?;
    let inputs = ClusterInputs {
        bounds: bound.storage(BOUNDS)?,
        volumes: bound.storage(VOLUMES)?,
        aabbs: bound.storage(AABBS)?,
    };
    let coarse: &[u32] = bound.storage(COARSE_LIST)?;
    let light_list: &mut [u32] = bound.storage_mut(LIGHT_LIST)?;
    let voxel_offsets: &mut [VoxelRange] = bound.storage_mut(VOXEL_OFFSETS)?;
    let counter: &mut [u32] = bound.storage_mut(COUNTER)?;
    let log_base_tweak: &mut [f32] = bound.storage_mut(LOG_BASE_TWEAK)?;
    if counter.is_empty() {
        return Err(ResourceError::OutOfBounds);
    }

    let screen_projection = Mat4::from_cols_array_2d(&c.screen_projection);
    let plus_one = c.max_big_tile_lights_plus_one;
    let num_slices = 1u32 << c.log2_num_clusters;
    let cts = c.cluster_tile_size;
    let size = cts as f32;
    let capacity = c.cluster_list_capacity;

    for wy in 0..groups[1] {
        for wx in 0..groups[0] {
            let tile = wy * c.num_clusters_x + wx;
            let big = ((wy * cts) / c.big_tile_size) * c.num_big_tiles_x + (wx * cts) / c.big_tile_size;
            let coarse_base = (big * plus_one) as usize;
            let count = coarse.get(coarse_base).copied().unwrap_or(0).min(plus_one.saturating_sub(1)) as usize;
            let tile_lights = coarse.get(coarse_base + 1..coarse_base + 1 + count).unwrap_or(&[]);

            let mut base = c.cluster_base;
            if c.adaptive_log_base != 0 {
                let tile_far = tile_lights
                    .iter()
                    .filter_map(|&l| inputs.aabbs.get(l as usize))
                    .fold(0.0f32, |far, aabb| far.max(aabb.max[2]));
                base = suggest_log_base(tile_far, c.near, c.far, num_slices, c.cluster_base);
            }
            let slicing = DepthSlicing::new(c.near, c.far, base, num_slices);
            if let Some(tweak) = log_base_tweak.get_mut(tile as usize) {
                *tweak = base;
            }

            let (x0, y0) = (wx as f32 * size, wy as f32 * size);
            let (x1, y1) = (x0 + size, y0 + size);

            for k in 0..num_slices {
                let z0 = slicing.depth_for_slice(k);
                let z1 = slicing.depth_for_slice(k + 1);
                let voxel = VoxelBounds::from_pixel_rect(&screen_projection, x0, y0, x1, y1, z0, z1);

                for category in 0..c.category_count {
                    let passing = || {
                        tile_lights
                            .iter()
                            .copied()
                            .filter(|&l| inputs.passes(l, category, &voxel, x0, y0, x1, y1, z0, z1))
                    };
                    let n = passing().count() as u32;

                    let (mut offset, mut avail) = (0, 0);
                    if n > 0 {
                        let start = counter[0];
                        counter[0] = start.wrapping_add(n);
                        offset = start.min(capacity);
                        avail = n.min(capacity - offset);
                        for (j, light) in passing().take(avail as usize).enumerate() {
                            if let Some(slot) = light_list.get_mut(offset as usize + j) {
                                *slot = light;
                            }
                        }
                    }
                    let index = ((category * num_slices + k) * c.nr_cluster_tiles + tile) as usize;
                    if let Some(range) = voxel_offsets.get_mut(index) {
                        *range = VoxelRange { offset, count: avail };
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words<T: Pod>(items: &[T]) -> Vec<u32> {
        bytemuck::cast_slice(items).to_vec()
    }

    #[test]
    fn clear_respects_chunk_offset_and_count() {
        let params = words(&[DispatchParams {
            base_offset: 64,
            element_count: 100,
            clear_value: 7,
            _pad0: 0,
        }]);
        let mut target = vec![1u32; 200];
        let mut bound = BoundResources::default();
        bound.read.insert(bindings::clear_lists::PARAMS, &params);
        bound.write.insert(bindings::clear_lists::TARGET, &mut target);
        SoftwareKernel::ClearLists.run([1, 1, 1], &mut bound).unwrap();

        assert!(target[..64].iter().all(|&w| w == 1));
        assert!(target[64..100].iter().all(|&w| w == 7));
        assert!(target[100..].iter().all(|&w| w == 1));
    }

    #[test]
    fn coarse_list_is_capped() {
        let constants = ShadingConstants {
            num_big_tiles_x: 1,
            num_big_tiles_y: 1,
            big_tile_size: 64,
            max_big_tile_lights_plus_one: 3,
            bound_count: 5,
            ..Default::default()
        };
        let aabb = ScreenSpaceAabb {
            min: [0.0, 0.0, 1.0, 0.0],
            max: [10.0, 10.0, 2.0, 0.0],
        };
        let constants_words = words(&[constants]);
        let aabb_words = words(&[aabb; 5]);
        let mut list = vec![0u32; 3];
        let mut bound = BoundResources::default();
        bound.read.insert(bindings::coarse_cull::CONSTANTS, &constants_words);
        bound.read.insert(bindings::coarse_cull::AABBS, &aabb_words);
        bound.write.insert(bindings::coarse_cull::COARSE_LIST, &mut list);
        SoftwareKernel::CoarseCull.run([1, 1, 1], &mut bound).unwrap();
        assert_eq!(list, vec![2, 0, 1]);
    }

    #[test]
    fn unbound_binding_is_an_error() {
        let mut bound = BoundResources::default();
        assert!(SoftwareKernel::ClearLists.run([1, 1, 1], &mut bound).is_err());
    }

    #[test]
    fn entry_points_resolve() {
        for entry_point in bindings::ENTRY_POINTS {
            let kernel = SoftwareKernel::from_entry_point(entry_point).unwrap();
            for w in kernel.writable_bindings() {
                assert!(kernel.bindings().contains(w));
            }
        }
        assert!(SoftwareKernel::from_entry_point("main").is_none());
    }

    #[test]
    fn whole_elements_truncates_partial_structs() {
        assert_eq!(whole_elements::<LightBound>(33), 32);
        assert_eq!(whole_elements::<u32>(5), 5);
    }
}
