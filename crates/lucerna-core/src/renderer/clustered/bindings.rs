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

//! Entry points and binding slots of the culling kernels.
//!
//! Every kernel uses bind group 0. The WGSL sources, the culling lane and
//! the software backend all address bindings through these constants.

/// Workgroup size of every culling kernel.
pub const WORKGROUP_SIZE: u32 = 64;

/// Threads cooperating on one light in `screen_space_aabb`.
pub const THREADS_PER_LIGHT: u32 = 4;

/// Lights handled by one `screen_space_aabb` workgroup.
pub const LIGHTS_PER_AABB_GROUP: u32 = WORKGROUP_SIZE / THREADS_PER_LIGHT;

/// Bind group index used by every kernel.
pub const GROUP: u32 = 0;

/// Fills a `u32` range with a constant.
pub mod clear_lists {
    /// WGSL entry point.
    pub const ENTRY_POINT: &str = "clear_lists";
    /// `DispatchParams` uniform slot.
    pub const PARAMS: u32 = 0;
    /// Target words.
    pub const TARGET: u32 = 1;
}

/// Projects light bounds to screen-space AABBs.
pub mod screen_space_aabb {
    /// WGSL entry point.
    pub const ENTRY_POINT: &str = "screen_space_aabb";
    /// `ShadingConstants` uniform.
    pub const CONSTANTS: u32 = 0;
    /// `LightBound` array.
    pub const BOUNDS: u32 = 1;
    /// `ScreenSpaceAabb` output array.
    pub const AABBS: u32 = 2;
}

/// Builds the per-big-tile coarse light lists.
pub mod coarse_cull {
    /// WGSL entry point.
    pub const ENTRY_POINT: &str = "coarse_cull";
    /// `ShadingConstants` uniform.
    pub const CONSTANTS: u32 = 0;
    /// `ScreenSpaceAabb` array.
    pub const AABBS: u32 = 1;
    /// Coarse list, atomically appended.
    pub const COARSE_LIST: u32 = 2;
}

/// Refines coarse lists into the compacted per-cluster lists.
pub mod cluster_cull {
    /// WGSL entry point.
    pub const ENTRY_POINT: &str = "cluster_cull";
    /// `ShadingConstants` uniform.
    pub const CONSTANTS: u32 = 0;
    /// `LightBound` array.
    pub const BOUNDS: u32 = 1;
    /// `LightVolumeData` array.
    pub const VOLUMES: u32 = 2;
    /// `ScreenSpaceAabb` array.
    pub const AABBS: u32 = 3;
    /// Coarse list, read only.
    pub const COARSE_LIST: u32 = 4;
    /// Compacted light index list.
    pub const LIGHT_LIST: u32 = 5;
    /// Per-voxel `VoxelRange` table.
    pub const VOXEL_OFFSETS: u32 = 6;
    /// Global append counter.
    pub const COUNTER: u32 = 7;
    /// Per-tile log base.
    pub const LOG_BASE_TWEAK: u32 = 8;
}

/// All kernel entry points, in pipeline order.
pub const ENTRY_POINTS: [&str; 4] = [
    clear_lists::ENTRY_POINT,
    screen_space_aabb::ENTRY_POINT,
    coarse_cull::ENTRY_POINT,
    cluster_cull::ENTRY_POINT,
];
