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

//! Built-in WGSL sources of the light culling kernels.
//!
//! Each kernel is its own module: the shared declarations of `common.wgsl`
//! followed by the kernel's bindings and entry point. Entry point names and
//! binding slots are those of [`lucerna_core::renderer::clustered::bindings`].

use lucerna_core::renderer::clustered::bindings;

/// Clears a `u32` range in chunks of at most `max_groups_per_dispatch` groups.
pub const CLEAR_LISTS_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("clear_lists.wgsl"));

/// Projects light bounds to screen-space AABBs, four threads per light.
pub const SCREEN_SPACE_AABB_WGSL: &str = concat!(
    include_str!("common.wgsl"),
    include_str!("screen_space_aabb.wgsl")
);

/// Builds the per-big-tile coarse light lists.
pub const COARSE_CULL_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("coarse_cull.wgsl"));

/// Refines the coarse lists into the compacted per-cluster lists.
pub const CLUSTER_CULL_WGSL: &str = concat!(include_str!("common.wgsl"), include_str!("cluster_cull.wgsl"));

/// The source of the kernel with `entry_point`, if it is a culling kernel.
pub fn kernel_source(entry_point: &str) -> Option<&'static str> {
    match entry_point {
        bindings::clear_lists::ENTRY_POINT => Some(CLEAR_LISTS_WGSL),
        bindings::screen_space_aabb::ENTRY_POINT => Some(SCREEN_SPACE_AABB_WGSL),
        bindings::coarse_cull::ENTRY_POINT => Some(COARSE_CULL_WGSL),
        bindings::cluster_cull::ENTRY_POINT => Some(CLUSTER_CULL_WGSL),
        _ => None,
    }
}
