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

//! GPU light culling: clear, screen-space AABBs, coarse and cluster culling.
//!
//! # Stages
//!
//! All stages are recorded into one compute pass and run in order:
//!
//! 1. **Clear**: zero the coarse lists, the voxel table and the append
//!    counter, and reset the log-base tweak. Clears are chunked so no
//!    dispatch exceeds the device's workgroup limit.
//! 2. **Screen-space AABB**: four threads per light, sixteen lights per group.
//! 3. **Coarse culling**: one group per 64 px big tile, capped lists.
//! 4. **Cluster culling**: one group per 32 px column, every depth slice.
//!
//! With no bounds, stages 2 to 4 are skipped and the cleared buffers stay
//! valid and empty.

use std::borrow::Cow;
use std::collections::HashMap;

use lucerna_core::lane::{Lane, LaneKind};
use lucerna_core::math::mat4_to_cols;
use lucerna_core::renderer::clustered::{
    bindings, culling_view_matrix, screen_projection_matrix, ClusterGrid,
    ClusteredLightingSettings, DepthSlicing, DispatchParams, LightBound, LightVolumeData,
    ScreenSpaceAabb, ShadingConstants, VoxelRange, DISPATCH_PARAMS_SLOT, LIGHT_CATEGORY_COUNT,
};
use lucerna_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId, CameraView,
    CommandEncoder, ComputePassDescriptor, ComputePipelineDescriptor, ComputePipelineId,
    GraphicsDevice, ResourceError, ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData,
};

use super::bounds_builder::LightBoundsBuilder;
use super::buffer_pool::{GpuBufferPool, PooledBufferId, PooledBufferKind};
use super::shaders;
use crate::error::LightingError;

/// What one camera's culling recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullingStats {
    /// Bounds handed to the kernels, after the on-screen cap.
    pub bound_count: u32,
    /// Bounds dropped by the on-screen cap.
    pub capped_bounds: u32,
    /// Clear dispatches, one per chunk.
    pub clear_dispatches: u32,
    /// All dispatches, clears included.
    pub dispatches: u32,
    /// Whether the culling stages were skipped for lack of bounds.
    pub early_out: bool,
}

#[derive(Debug, Clone, Copy)]
struct Kernel {
    module: ShaderModuleId,
    pipeline: ComputePipelineId,
    layout: BindGroupLayoutId,
}

fn create_kernel(
    device: &dyn GraphicsDevice,
    entry_point: &'static str,
    source: &'static str,
) -> Result<Kernel, ResourceError> {
    let module = device.create_shader_module(&ShaderModuleDescriptor {
        label: Some(entry_point),
        source: ShaderSourceData::Wgsl(Cow::Borrowed(source)),
    })?;
    let pipeline = match device.create_compute_pipeline(&ComputePipelineDescriptor {
        label: Some(Cow::Borrowed(entry_point)),
        shader_module: module,
        entry_point: Cow::Borrowed(entry_point),
    }) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            let _ = device.destroy_shader_module(module);
            return Err(e);
        }
    };
    let layout = match device.compute_pipeline_bind_group_layout(pipeline, bindings::GROUP) {
        Ok(layout) => layout,
        Err(e) => {
            let _ = device.destroy_compute_pipeline(pipeline);
            let _ = device.destroy_shader_module(module);
            return Err(e);
        }
    };
    log::info!("LightCullingLane: Created kernel '{}'", entry_point);
    Ok(Kernel {
        module,
        pipeline,
        layout,
    })
}

fn destroy_kernel(device: &dyn GraphicsDevice, kernel: Kernel) {
    if let Err(e) = device.destroy_compute_pipeline(kernel.pipeline) {
        log::warn!("LightCullingLane: Failed to destroy pipeline: {}", e);
    }
    if let Err(e) = device.destroy_shader_module(kernel.module) {
        log::warn!("LightCullingLane: Failed to destroy shader module: {}", e);
    }
}

/// One chunk of a chunked clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearChunk {
    /// Buffer being cleared.
    pub target: PooledBufferId,
    /// Slot of the chunk's parameters in the clear-params buffer.
    pub slot: u32,
    /// Workgroups of the dispatch.
    pub groups: u32,
    /// Parameters of the dispatch.
    pub params: DispatchParams,
}

/// Splits the clear of `words` words into dispatches of at most `max_groups` groups.
pub fn plan_clear(
    target: PooledBufferId,
    words: u32,
    clear_value: u32,
    max_groups: u32,
    first_slot: u32,
) -> Vec<ClearChunk> {
    let total_groups = words.div_ceil(bindings::WORKGROUP_SIZE);
    let max_groups = max_groups.max(1);
    (0..total_groups.div_ceil(max_groups))
        .map(|c| {
            let first_group = c * max_groups;
            ClearChunk {
                target,
                slot: first_slot + c,
                groups: (total_groups - first_group).min(max_groups),
                params: DispatchParams {
                    base_offset: first_group * bindings::WORKGROUP_SIZE,
                    element_count: words,
                    clear_value,
                    _pad0: 0,
                },
            }
        })
        .collect()
}

/// Geometry and constants of the camera being culled.
#[derive(Debug, Clone)]
pub struct CameraSetup {
    /// Tiling of the camera's target.
    pub grid: ClusterGrid,
    /// Global depth slicing.
    pub slicing: DepthSlicing,
    /// Constant block. Counts are filled in by `encode`.
    pub constants: ShadingConstants,
    /// Capacity of the compacted cluster list, in indices.
    pub cluster_list_capacity: u32,
    clear_plan: Vec<ClearChunk>,
}

impl CameraSetup {
    /// The clear dispatches this camera records.
    pub fn clear_plan(&self) -> &[ClearChunk] {
        &self.clear_plan
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BindGroupKey {
    Clear(u32),
    ScreenSpaceAabb,
    CoarseCull,
    ClusterCull,
}

#[derive(Debug)]
struct CachedBindGroup {
    id: BindGroupId,
    entries: Vec<BindGroupEntry>,
}

/// Records the light culling compute pipeline for one camera at a time.
///
/// Kernels are created up front, so a device that cannot build them fails
/// at construction rather than mid-frame.
#[derive(Debug)]
pub struct LightCullingLane {
    settings: ClusteredLightingSettings,
    max_groups_per_dispatch: u32,
    clear: Kernel,
    screen_space_aabb: Kernel,
    coarse_cull: Kernel,
    cluster_cull: Kernel,
    bind_groups: HashMap<BindGroupKey, CachedBindGroup>,
    setup: Option<CameraSetup>,
    shut_down: bool,
}

impl LightCullingLane {
    /// Validates `settings` and creates the four culling kernels.
    ///
    /// ## Arguments
    ///
    /// * `device` - The device the kernels live on.
    /// * `settings` - Tiling and capacity settings.
    ///
    /// ## Returns
    ///
    /// The lane, or [`LightingError::KernelCreation`] naming the first kernel
    /// the device refused. Kernels created before the failure are released.
    pub fn new(
        device: &dyn GraphicsDevice,
        settings: &ClusteredLightingSettings,
    ) -> Result<Self, LightingError> {
        settings.validate()?;

        let mut kernels = Vec::with_capacity(bindings::ENTRY_POINTS.len());
        for entry_point in bindings::ENTRY_POINTS {
            let source = shaders::kernel_source(entry_point).ok_or(LightingError::KernelCreation {
                entry_point,
                source: ResourceError::NotFound,
            })?;
            match create_kernel(device, entry_point, source) {
                Ok(kernel) => kernels.push(kernel),
                Err(source) => {
                    for kernel in kernels {
                        destroy_kernel(device, kernel);
                    }
                    return Err(LightingError::KernelCreation {
                        entry_point,
                        source,
                    });
                }
            }
        }
        let [clear, screen_space_aabb, coarse_cull, cluster_cull] = [
            kernels[0], kernels[1], kernels[2], kernels[3],
        ];

        let device_max = device.limits().max_compute_workgroups_per_dimension;
        let max_groups_per_dispatch = settings.max_groups_per_dispatch.min(device_max).max(1);
        log::info!(
            "LightCullingLane: Ready on '{}' ({} groups per dispatch)",
            device.get_adapter_info().name,
            max_groups_per_dispatch
        );

        Ok(Self {
            settings: settings.clone(),
            max_groups_per_dispatch,
            clear,
            screen_space_aabb,
            coarse_cull,
            cluster_cull,
            bind_groups: HashMap::new(),
            setup: None,
            shut_down: false,
        })
    }

    /// The effective dispatch ceiling.
    pub fn max_groups_per_dispatch(&self) -> u32 {
        self.max_groups_per_dispatch
    }

    /// The settings this lane runs with.
    pub fn settings(&self) -> &ClusteredLightingSettings {
        &self.settings
    }

    /// The current camera's setup, if any.
    pub fn setup(&self) -> Option<&CameraSetup> {
        self.setup.as_ref()
    }

    /// Derives the camera's tiling and acquires every culling buffer.
    ///
    /// `bound_count` is the number of bounds the builder produced; the
    /// bound buffers are sized for it, capped at `max_lights_on_screen`.
    pub fn on_camera_setup(
        &mut self,
        device: &dyn GraphicsDevice,
        pool: &mut GpuBufferPool,
        camera: &CameraView,
        bound_count: usize,
    ) -> Result<&CameraSetup, LightingError> {
        let (width, height) = camera.target_size();
        if width == 0 || height == 0 {
            return Err(LightingError::EmptyTarget { width, height });
        }

        let settings = &self.settings;
        let grid = ClusterGrid::new(width, height, settings);
        let num_slices = grid.num_slices() as u32;
        let slicing = DepthSlicing::new(camera.near, camera.far, settings.cluster_log_base, num_slices);

        let cull_view = culling_view_matrix(&camera.view);
        let screen_projection = screen_projection_matrix(&camera.projection, width, height);
        let plus_one = settings.max_big_tile_lights_plus_one();
        let list_len = |list: &'static str, len: Option<usize>| {
            len.and_then(|len| u32::try_from(len).ok())
                .ok_or(LightingError::TargetTooLarge { width, height, list })
        };
        let coarse_words = list_len(
            "coarse light list",
            grid.nr_big_tiles().checked_mul(plus_one as usize),
        )?;
        let cluster_list_capacity = list_len(
            "cluster light list",
            (settings.avg_lights_per_voxel as usize)
                .checked_mul(num_slices as usize)
                .and_then(|n| n.checked_mul(grid.nr_cluster_tiles())),
        )?;
        let voxel_words = list_len(
            "voxel offset table",
            grid.nr_cluster_tiles()
                .checked_mul(grid.num_slices() * LIGHT_CATEGORY_COUNT * 2),
        )?;

        let constants = ShadingConstants {
            screen_projection: mat4_to_cols(&screen_projection),
            inv_screen_projection: mat4_to_cols(&screen_projection.inverse()),
            view: mat4_to_cols(&cull_view),
            inv_view: mat4_to_cols(&cull_view.inverse()),
            projection: mat4_to_cols(&camera.projection),
            inv_projection: mat4_to_cols(&camera.projection.inverse()),
            screen_size: [
                width as f32,
                height as f32,
                1.0 / width as f32,
                1.0 / height as f32,
            ],
            num_tile_ftpl_x: grid.num_tile_ftpl_x,
            num_tile_ftpl_y: grid.num_tile_ftpl_y,
            num_big_tiles_x: grid.num_big_tiles_x,
            num_big_tiles_y: grid.num_big_tiles_y,
            num_clusters_x: grid.num_clusters_x,
            num_clusters_y: grid.num_clusters_y,
            nr_cluster_tiles: grid.nr_cluster_tiles() as u32,
            log2_num_clusters: grid.log2_num_clusters,
            cluster_scale: slicing.scale,
            cluster_base: slicing.base,
            near: camera.near,
            far: camera.far,
            max_big_tile_lights_plus_one: plus_one,
            cluster_list_capacity,
            is_orthographic: camera.is_orthographic as u32,
            adaptive_log_base: settings.adaptive_log_base as u32,
            big_tile_size: grid.big_tile_size,
            cluster_tile_size: grid.cluster_tile_size,
            category_count: LIGHT_CATEGORY_COUNT as u32,
            ..ShadingConstants::default()
        };

        let max_groups = self.max_groups_per_dispatch;
        let mut clear_plan = Vec::new();
        for (target, words, value) in [
            (PooledBufferId::CoarseLightList, coarse_words, 0),
            (PooledBufferId::VoxelOffsets, voxel_words, 0),
            (PooledBufferId::ListCounter, 1, 0),
            (
                PooledBufferId::LogBaseTweak,
                grid.nr_cluster_tiles() as u32,
                settings.cluster_log_base.to_bits(),
            ),
        ] {
            let first_slot = clear_plan.len() as u32;
            clear_plan.extend(plan_clear(target, words, value, max_groups, first_slot));
        }

        let max_bounds = bound_count.min(settings.max_lights_on_screen as usize);
        let storage = PooledBufferKind::Storage;
        pool.acquire(device, PooledBufferId::LightBounds, max_bounds, size_of::<LightBound>(), storage)?;
        pool.acquire(device, PooledBufferId::LightVolumes, max_bounds, size_of::<LightVolumeData>(), storage)?;
        pool.acquire(device, PooledBufferId::ScreenSpaceAabbs, max_bounds, size_of::<ScreenSpaceAabb>(), storage)?;
        pool.acquire(device, PooledBufferId::CoarseLightList, coarse_words as usize, 4, storage)?;
        pool.acquire(device, PooledBufferId::ClusterLightList, cluster_list_capacity as usize, 4, storage)?;
        pool.acquire(device, PooledBufferId::VoxelOffsets, grid.voxel_table_len(), size_of::<VoxelRange>(), storage)?;
        pool.acquire(device, PooledBufferId::ListCounter, 1, 4, storage)?;
        pool.acquire(device, PooledBufferId::LogBaseTweak, grid.nr_cluster_tiles(), 4, storage)?;
        pool.acquire(
            device,
            PooledBufferId::ShadingConstants,
            1,
            size_of::<ShadingConstants>(),
            PooledBufferKind::Uniform,
        )?;
        pool.acquire(
            device,
            PooledBufferId::ClearParams,
            clear_plan.len(),
            DISPATCH_PARAMS_SLOT as usize,
            PooledBufferKind::Uniform,
        )?;

        log::debug!(
            "LightCullingLane: Camera {}x{} -> {}x{} big tiles, {}x{}x{} clusters",
            width,
            height,
            grid.num_big_tiles_x,
            grid.num_big_tiles_y,
            grid.num_clusters_x,
            grid.num_clusters_y,
            num_slices
        );

        Ok(self.setup.insert(CameraSetup {
            grid,
            slicing,
            constants,
            cluster_list_capacity,
            clear_plan,
        }))
    }

    fn bind_group(
        &mut self,
        device: &dyn GraphicsDevice,
        key: BindGroupKey,
        layout: BindGroupLayoutId,
        entries: Vec<BindGroupEntry>,
    ) -> Result<BindGroupId, ResourceError> {
        if let Some(cached) = self.bind_groups.get(&key) {
            if cached.entries == entries {
                return Ok(cached.id);
            }
        }
        if let Some(stale) = self.bind_groups.remove(&key) {
            device.destroy_bind_group(stale.id)?;
        }
        let id = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Lucerna Culling Bind Group"),
            layout,
            entries: &entries,
        })?;
        self.bind_groups.insert(key, CachedBindGroup { id, entries });
        Ok(id)
    }

    /// Uploads this frame's bounds and constants and records every stage.
    ///
    /// Must follow [`on_camera_setup`](Self::on_camera_setup) for the same
    /// camera and frame.
    pub fn encode(
        &mut self,
        device: &dyn GraphicsDevice,
        pool: &GpuBufferPool,
        encoder: &mut dyn CommandEncoder,
        builder: &LightBoundsBuilder,
    ) -> Result<CullingStats, LightingError> {
        let setup = self.setup.as_mut().ok_or(LightingError::CameraNotSetup)?;
        let buffer = |key: PooledBufferId| {
            pool.get(key)
                .map(|b| b.id)
                .ok_or(LightingError::Resource(ResourceError::NotFound))
        };

        let max_on_screen = self.settings.max_lights_on_screen as usize;
        let total = builder.bound_count();
        let bound_count = total.min(max_on_screen);
        if bound_count < total {
            log::warn!(
                "LightCullingLane: {} bounds exceed the on-screen limit of {}, dropping {}",
                total,
                max_on_screen,
                total - bound_count
            );
        }
        let punctual = builder.punctual_count().min(bound_count);

        let constants = &mut setup.constants;
        constants.bound_count = bound_count as u32;
        constants.punctual_light_count = punctual as u32;
        constants.env_light_count = (bound_count - punctual) as u32;
        constants.directional_light_count = builder.directional().len() as u32;

        let constants_buffer = buffer(PooledBufferId::ShadingConstants)?;
        device.write_buffer(constants_buffer, 0, bytemuck::bytes_of(constants))?;

        let bounds = buffer(PooledBufferId::LightBounds)?;
        let volumes = buffer(PooledBufferId::LightVolumes)?;
        if bound_count > 0 {
            device.write_buffer(bounds, 0, bytemuck::cast_slice(&builder.bounds()[..bound_count]))?;
            device.write_buffer(volumes, 0, bytemuck::cast_slice(&builder.volumes()[..bound_count]))?;
        }

        let clear_params = buffer(PooledBufferId::ClearParams)?;
        let mut params = vec![0u8; setup.clear_plan.len() * DISPATCH_PARAMS_SLOT as usize];
        for chunk in &setup.clear_plan {
            let at = chunk.slot as usize * DISPATCH_PARAMS_SLOT as usize;
            params[at..at + size_of::<DispatchParams>()].copy_from_slice(bytemuck::bytes_of(&chunk.params));
        }
        device.write_buffer(clear_params, 0, &params)?;

        let grid = setup.grid;
        let clear_plan = setup.clear_plan.clone();
        let mut recorded: Vec<(ComputePipelineId, BindGroupId, u32, u32)> = Vec::new();

        for chunk in &clear_plan {
            let entries = vec![
                BindGroupEntry::range(
                    bindings::clear_lists::PARAMS,
                    clear_params,
                    chunk.slot as u64 * DISPATCH_PARAMS_SLOT,
                    DISPATCH_PARAMS_SLOT,
                ),
                BindGroupEntry::whole(bindings::clear_lists::TARGET, buffer(chunk.target)?),
            ];
            let group = self.bind_group(device, BindGroupKey::Clear(chunk.slot), self.clear.layout, entries)?;
            recorded.push((self.clear.pipeline, group, chunk.groups, 1));
        }
        let clear_dispatches = recorded.len() as u32;

        let early_out = bound_count == 0;
        if !early_out {
            let aabbs = buffer(PooledBufferId::ScreenSpaceAabbs)?;
            let coarse = buffer(PooledBufferId::CoarseLightList)?;

            let group = self.bind_group(
                device,
                BindGroupKey::ScreenSpaceAabb,
                self.screen_space_aabb.layout,
                vec![
                    BindGroupEntry::whole(bindings::screen_space_aabb::CONSTANTS, constants_buffer),
                    BindGroupEntry::whole(bindings::screen_space_aabb::BOUNDS, bounds),
                    BindGroupEntry::whole(bindings::screen_space_aabb::AABBS, aabbs),
                ],
            )?;
            let aabb_groups = (bound_count as u32).div_ceil(bindings::LIGHTS_PER_AABB_GROUP);
            recorded.push((self.screen_space_aabb.pipeline, group, aabb_groups, 1));

            let group = self.bind_group(
                device,
                BindGroupKey::CoarseCull,
                self.coarse_cull.layout,
                vec![
                    BindGroupEntry::whole(bindings::coarse_cull::CONSTANTS, constants_buffer),
                    BindGroupEntry::whole(bindings::coarse_cull::AABBS, aabbs),
                    BindGroupEntry::whole(bindings::coarse_cull::COARSE_LIST, coarse),
                ],
            )?;
            recorded.push((self.coarse_cull.pipeline, group, grid.num_big_tiles_x, grid.num_big_tiles_y));

            use bindings::cluster_cull as cc;
            let group = self.bind_group(
                device,
                BindGroupKey::ClusterCull,
                self.cluster_cull.layout,
                vec![
                    BindGroupEntry::whole(cc::CONSTANTS, constants_buffer),
                    BindGroupEntry::whole(cc::BOUNDS, bounds),
                    BindGroupEntry::whole(cc::VOLUMES, volumes),
                    BindGroupEntry::whole(cc::AABBS, aabbs),
                    BindGroupEntry::whole(cc::COARSE_LIST, coarse),
                    BindGroupEntry::whole(cc::LIGHT_LIST, buffer(PooledBufferId::ClusterLightList)?),
                    BindGroupEntry::whole(cc::VOXEL_OFFSETS, buffer(PooledBufferId::VoxelOffsets)?),
                    BindGroupEntry::whole(cc::COUNTER, buffer(PooledBufferId::ListCounter)?),
                    BindGroupEntry::whole(cc::LOG_BASE_TWEAK, buffer(PooledBufferId::LogBaseTweak)?),
                ],
            )?;
            recorded.push((self.cluster_cull.pipeline, group, grid.num_clusters_x, grid.num_clusters_y));
        }

        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("Lucerna Light Culling Pass"),
            });
            for &(pipeline, group, x, y) in &recorded {
                log::trace!("LightCullingLane: Dispatch {:?} ({}, {})", pipeline, x, y);
                pass.set_pipeline(pipeline);
                pass.set_bind_group(bindings::GROUP, group, &[]);
                pass.dispatch_workgroups(x, y, 1);
            }
        }

        let stats = CullingStats {
            bound_count: bound_count as u32,
            capped_bounds: (total - bound_count) as u32,
            clear_dispatches,
            dispatches: recorded.len() as u32,
            early_out,
        };
        log::debug!("LightCullingLane: {:?}", stats);
        Ok(stats)
    }
}

impl Lane for LightCullingLane {
    fn strategy_name(&self) -> &'static str {
        "ClusteredCulling"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Culling
    }

    fn on_shutdown(&mut self, device: &dyn GraphicsDevice) {
        for (_, cached) in self.bind_groups.drain() {
            let _ = device.destroy_bind_group(cached.id);
        }
        self.setup = None;
        if std::mem::replace(&mut self.shut_down, true) {
            return;
        }
        for kernel in [self.clear, self.screen_space_aabb, self.coarse_cull, self.cluster_cull] {
            destroy_kernel(device, kernel);
        }
        log::info!("LightCullingLane: Released kernels");
    }
}
