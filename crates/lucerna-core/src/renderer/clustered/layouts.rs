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

//! GPU data layouts shared by the CPU builder, the kernels and the shading consumer.
//!
//! All structs are `#[repr(C)]` and `Pod`, laid out to match WGSL's
//! storage/uniform rules (`vec3<f32>` followed by a 4-byte scalar).

use bytemuck::{Pod, Zeroable};

/// Number of light categories addressed by the per-voxel offset table.
pub const LIGHT_CATEGORY_COUNT: usize = 4;

/// Size of one slot of the clear-dispatch parameter buffer.
///
/// Matches the default uniform offset alignment so each chunk binds its own slot.
pub const DISPATCH_PARAMS_SLOT: u64 = 256;

/// Light category, the first index of the per-voxel offset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum LightCategory {
    /// Point and spot lights.
    Punctual = 0,
    /// Area lights.
    Area = 1,
    /// Environment (reflection probe) volumes.
    Env = 2,
    /// Decal volumes.
    Decal = 3,
}

impl LightCategory {
    /// All categories in table order.
    pub const ALL: [LightCategory; LIGHT_CATEGORY_COUNT] = [
        LightCategory::Punctual,
        LightCategory::Area,
        LightCategory::Env,
        LightCategory::Decal,
    ];

    /// Index into the per-voxel offset table.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Shape used by the precise per-cluster intersection test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LightVolume {
    /// Spot light cone, tested with a sphere/cone test.
    Cone = 0,
    /// Sphere, tested against the voxel's bounding box.
    Sphere = 1,
    /// Oriented box with a fade band, tested against the voxel's bounding sphere.
    Box = 2,
}

impl LightVolume {
    /// Decodes the raw value stored in [`LightVolumeData::light_volume`].
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(LightVolume::Cone),
            1 => Some(LightVolume::Sphere),
            2 => Some(LightVolume::Box),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Shading features present in the frame, published so the consumer can branch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[repr(transparent)]
    pub struct LightFeatureFlags: u32 {
        /// Point and spot lights.
        const PUNCTUAL = 1 << 12;
        /// Area lights.
        const AREA = 1 << 13;
        /// Directional lights.
        const DIRECTIONAL = 1 << 14;
        /// Reflection probes.
        const ENV = 1 << 15;
        /// Sky reflection fallback.
        const SKY = 1 << 16;
        /// Screen-space refraction.
        const SSREFRACTION = 1 << 17;
        /// Screen-space reflection.
        const SSREFLECTION = 1 << 18;
    }
}

/// GPU light type stored in [`LightData::light_type`].
pub mod gpu_light_type {
    /// Point light.
    pub const POINT: u32 = 0;
    /// Spot light.
    pub const SPOT: u32 = 1;
}

/// Cheap per-light bound in culling view space.
///
/// The box axes carry the half-extents. Corners on the -Z face are pulled
/// toward the center by `scale_xy`, which turns the box into a truncated
/// pyramid hugging a spot light's apex.
///
/// # Memory Layout
///
/// 64 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct LightBound {
    /// Scaled X axis.
    pub box_axis_x: [f32; 3],
    /// Radius of the circumscribed sphere around `center`.
    pub radius: f32,
    /// Scaled Y axis.
    pub box_axis_y: [f32; 3],
    /// XY scale applied to the -Z face.
    pub scale_xy: f32,
    /// Scaled Z axis.
    pub box_axis_z: [f32; 3],
    /// Padding for 16-byte alignment.
    pub _pad0: f32,
    /// Box center.
    pub center: [f32; 3],
    /// Padding for 16-byte alignment.
    pub _pad1: f32,
}

/// Precise per-light volume, paired 1:1 with [`LightBound`] by index.
///
/// # Memory Layout
///
/// 96 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct LightVolumeData {
    /// Light origin (apex for cones, center otherwise) in culling view space.
    pub light_pos: [f32; 3],
    /// A [`LightVolume`] discriminant.
    pub light_volume: u32,
    /// Normalized X axis.
    pub light_axis_x: [f32; 3],
    /// A [`LightCategory`] discriminant.
    pub light_category: u32,
    /// Normalized Y axis.
    pub light_axis_y: [f32; 3],
    /// Squared range (cone, sphere).
    pub radius_sq: f32,
    /// Normalized Z axis. Cones open along it.
    pub light_axis_z: [f32; 3],
    /// Cotangent of the cone half-angle.
    pub cotan: f32,
    /// Half-extents of the inner (full weight) box.
    pub box_inner_dist: [f32; 3],
    /// [`LightFeatureFlags`] bits.
    pub feature_flags: u32,
    /// Inverse width of the fade band around the inner box.
    pub box_inv_range: [f32; 3],
    /// Padding for 16-byte alignment.
    pub _pad0: f32,
}

impl LightVolumeData {
    /// Decoded volume shape.
    pub fn volume(&self) -> Option<LightVolume> {
        LightVolume::from_raw(self.light_volume)
    }
}

/// Screen-space bounds of a light: pixel rectangle in x/y, culling view depth in z.
///
/// A light entirely behind the near plane gets an inverted (empty) rectangle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct ScreenSpaceAabb {
    /// Minimum (x px, y px, view depth, unused).
    pub min: [f32; 4],
    /// Maximum (x px, y px, view depth, unused).
    pub max: [f32; 4],
}

impl ScreenSpaceAabb {
    /// An AABB that overlaps nothing.
    pub const EMPTY: Self = Self {
        min: [f32::MAX, f32::MAX, f32::MAX, 0.0],
        max: [-f32::MAX, -f32::MAX, -f32::MAX, 0.0],
    };

    /// Whether the pixel rectangle overlaps `[x0, x1) x [y0, y1)`.
    #[inline]
    pub fn overlaps_rect(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> bool {
        self.min[0] < x1 && self.max[0] >= x0 && self.min[1] < y1 && self.max[1] >= y0
    }

    /// Whether the depth range overlaps `[z0, z1]`.
    #[inline]
    pub fn overlaps_depth(&self, z0: f32, z1: f32) -> bool {
        self.min[2] <= z1 && self.max[2] >= z0
    }
}

/// One entry of the per-voxel offset table: a run in the compacted light list.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Default)]
pub struct VoxelRange {
    /// First index in the cluster light list.
    pub offset: u32,
    /// Number of light indices in the run.
    pub count: u32,
}

/// Per-light shading payload for punctual lights.
///
/// # Memory Layout
///
/// 112 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct LightData {
    /// Position in culling view space.
    pub view_position: [f32; 3],
    /// Influence range.
    pub range: f32,
    /// Linear RGB color.
    pub color: [f32; 3],
    /// A [`gpu_light_type`] value.
    pub light_type: u32,
    /// World-space forward axis.
    pub forward: [f32; 3],
    /// Range attenuation scale (`1 / range^2`).
    pub range_attenuation_scale: f32,
    /// World-space right axis.
    pub right: [f32; 3],
    /// Range attenuation bias.
    pub range_attenuation_bias: f32,
    /// World-space up axis.
    pub up: [f32; 3],
    /// Spot angular attenuation scale.
    pub angle_scale: f32,
    /// World-space position.
    pub position_ws: [f32; 3],
    /// Spot angular attenuation offset.
    pub angle_offset: f32,
    /// Emitter radius.
    pub shape_radius: f32,
    /// Shadow slice, or -1.
    pub shadow_index: i32,
    /// Cookie slot, or -1.
    pub cookie_index: i32,
    /// Rendering-layer mask.
    pub rendering_layers: u32,
}

/// Shading payload for directional lights.
///
/// # Memory Layout
///
/// 64 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Default)]
pub struct DirectionalLightData {
    /// World-space forward axis.
    pub forward: [f32; 3],
    /// Angular diameter in radians.
    pub angular_diameter: f32,
    /// World-space right axis.
    pub right: [f32; 3],
    /// Shadow slice, or -1.
    pub shadow_index: i32,
    /// World-space up axis.
    pub up: [f32; 3],
    /// Cookie slot, or -1.
    pub cookie_index: i32,
    /// Linear RGB color.
    pub color: [f32; 3],
    /// Rendering-layer mask.
    pub rendering_layers: u32,
}

/// Per-camera constant block read by the kernels and the shading consumer.
///
/// # Memory Layout
///
/// 496 bytes, a multiple of 16 as required for uniform buffers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadingConstants {
    /// Culling view space to pixel coordinates (homogeneous).
    pub screen_projection: [[f32; 4]; 4],
    /// Inverse of `screen_projection`.
    pub inv_screen_projection: [[f32; 4]; 4],
    /// World to culling view space.
    pub view: [[f32; 4]; 4],
    /// Inverse of `view`.
    pub inv_view: [[f32; 4]; 4],
    /// Camera projection (right-handed view space to clip).
    pub projection: [[f32; 4]; 4],
    /// Inverse of `projection`.
    pub inv_projection: [[f32; 4]; 4],
    /// (width, height, 1 / width, 1 / height).
    pub screen_size: [f32; 4],

    /// Directional lights in the directional array.
    pub directional_light_count: u32,
    /// Punctual lights at the front of the bound arrays.
    pub punctual_light_count: u32,
    /// Environment volumes following the punctual lights.
    pub env_light_count: u32,
    /// Total bounds processed by the kernels.
    pub bound_count: u32,

    /// 16 px tiles along x.
    pub num_tile_ftpl_x: u32,
    /// 16 px tiles along y.
    pub num_tile_ftpl_y: u32,
    /// Big tiles along x.
    pub num_big_tiles_x: u32,
    /// Big tiles along y.
    pub num_big_tiles_y: u32,

    /// Cluster tiles along x.
    pub num_clusters_x: u32,
    /// Cluster tiles along y.
    pub num_clusters_y: u32,
    /// `num_clusters_x * num_clusters_y`.
    pub nr_cluster_tiles: u32,
    /// log2 of the depth slice count.
    pub log2_num_clusters: u32,

    /// Depth-slice scale for the global log base.
    pub cluster_scale: f32,
    /// Global depth-slice log base.
    pub cluster_base: f32,
    /// Near plane.
    pub near: f32,
    /// Far plane.
    pub far: f32,

    /// Words per big tile in the coarse list (cap + 1 count slot).
    pub max_big_tile_lights_plus_one: u32,
    /// Capacity of the compacted cluster light list.
    pub cluster_list_capacity: u32,
    /// Non-zero for orthographic projections.
    pub is_orthographic: u32,
    /// Non-zero when per-tile log bases are derived from light depth.
    pub adaptive_log_base: u32,

    /// Big tile size in pixels.
    pub big_tile_size: u32,
    /// Cluster tile size in pixels.
    pub cluster_tile_size: u32,
    /// Number of light categories.
    pub category_count: u32,
    /// Padding for 16-byte alignment.
    pub _pad0: u32,
}

impl Default for ShadingConstants {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

/// Parameters of one clear dispatch chunk. Occupies a [`DISPATCH_PARAMS_SLOT`]-sized slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, Default)]
pub struct DispatchParams {
    /// First word this chunk clears.
    pub base_offset: u32,
    /// Total words in the target buffer range.
    pub element_count: u32,
    /// Value written to every word.
    pub clear_value: u32,
    /// Padding for 16-byte alignment.
    pub _pad0: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn layouts_match_wgsl_sizes() {
        assert_eq!(size_of::<LightBound>(), 64);
        assert_eq!(size_of::<LightVolumeData>(), 96);
        assert_eq!(size_of::<ScreenSpaceAabb>(), 32);
        assert_eq!(size_of::<VoxelRange>(), 8);
        assert_eq!(size_of::<LightData>(), 112);
        assert_eq!(size_of::<DirectionalLightData>(), 64);
        assert_eq!(size_of::<ShadingConstants>(), 496);
        assert_eq!(size_of::<DispatchParams>(), 16);
    }

    #[test]
    fn uniform_blocks_are_16_byte_multiples() {
        assert_eq!(size_of::<ShadingConstants>() % 16, 0);
        assert!(size_of::<DispatchParams>() as u64 <= DISPATCH_PARAMS_SLOT);
    }

    #[test]
    fn empty_aabb_overlaps_nothing() {
        let aabb = ScreenSpaceAabb::EMPTY;
        assert!(!aabb.overlaps_rect(0.0, 0.0, 1e6, 1e6));
        assert!(!aabb.overlaps_depth(0.0, 1e6));
    }

    #[test]
    fn feature_flags_union() {
        let mut flags = LightFeatureFlags::empty();
        assert!(flags.is_empty());
        flags |= LightFeatureFlags::PUNCTUAL;
        flags |= LightFeatureFlags::ENV;
        assert!(flags.contains(LightFeatureFlags::PUNCTUAL | LightFeatureFlags::ENV));
        assert!(!flags.contains(LightFeatureFlags::AREA));
        assert_eq!(flags.bits(), (1 << 12) | (1 << 15));
        assert_eq!(LightFeatureFlags::from_bits_retain(flags.bits()), flags);
    }

    #[test]
    fn volume_round_trips_through_raw() {
        for volume in [LightVolume::Cone, LightVolume::Sphere, LightVolume::Box] {
            assert_eq!(LightVolume::from_raw(volume as u32), Some(volume));
        }
        assert_eq!(LightVolume::from_raw(9), None);
    }
}
