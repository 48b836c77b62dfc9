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

//! Tiling, depth slicing and intersection math of the culling pipeline.
//!
//! The WGSL kernels mirror these functions one to one; the software backend
//! calls them directly.

use crate::math::{Mat4, Vec3, Vec4};
use crate::renderer::clustered::layouts::{
    LightBound, LightVolume, LightVolumeData, ScreenSpaceAabb, LIGHT_CATEGORY_COUNT,
};
use crate::renderer::clustered::settings::ClusteredLightingSettings;

/// Smallest normalized tile depth fed to [`suggest_log_base`].
const MIN_NORMALIZED_TILE_DEPTH: f32 = 1e-5;

/// Cotangent stored for a zero-width cone.
pub const CONE_COTAN_MAX: f32 = f32::MAX;

/// Converts a right-handed, -Z forward world-to-view matrix into the +Z
/// forward culling view space by negating its third row (translation included).
#[inline]
pub fn culling_view_matrix(world_to_view: &Mat4) -> Mat4 {
    Mat4::from_scale(Vec3::new(1.0, 1.0, -1.0)) * *world_to_view
}

/// Builds the matrix taking culling view space to homogeneous pixel coordinates.
///
/// `projection` expects the camera's right-handed view space, so the Z flip
/// is undone before projecting. Pixel y grows downward.
pub fn screen_projection_matrix(projection: &Mat4, width: u32, height: u32) -> Mat4 {
    let (w, h) = (width as f32, height as f32);
    let to_pixels = Mat4::from_cols(
        Vec4::new(0.5 * w, 0.0, 0.0, 0.0),
        Vec4::new(0.0, -0.5 * h, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(0.5 * w, 0.5 * h, 0.0, 1.0),
    );
    to_pixels * *projection * Mat4::from_scale(Vec3::new(1.0, 1.0, -1.0))
}

/// Index space of the tiled and clustered culling results for one target size.
///
/// # Examples
///
/// ```
/// use lucerna_core::renderer::clustered::{ClusterGrid, ClusteredLightingSettings};
///
/// let grid = ClusterGrid::new(1920, 1080, &ClusteredLightingSettings::default());
/// assert_eq!((grid.num_tile_ftpl_x, grid.num_tile_ftpl_y), (120, 68));
/// assert_eq!((grid.num_big_tiles_x, grid.num_big_tiles_y), (30, 17));
/// assert_eq!((grid.num_clusters_x, grid.num_clusters_y), (60, 34));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterGrid {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Fine tile size in pixels.
    pub tile_size: u32,
    /// Big tile size in pixels.
    pub big_tile_size: u32,
    /// Cluster tile size in pixels.
    pub cluster_tile_size: u32,
    /// Fine tiles along x.
    pub num_tile_ftpl_x: u32,
    /// Fine tiles along y.
    pub num_tile_ftpl_y: u32,
    /// Big tiles along x.
    pub num_big_tiles_x: u32,
    /// Big tiles along y.
    pub num_big_tiles_y: u32,
    /// Cluster tiles along x.
    pub num_clusters_x: u32,
    /// Cluster tiles along y.
    pub num_clusters_y: u32,
    /// log2 of the depth slice count.
    pub log2_num_clusters: u32,
}

impl ClusterGrid {
    /// Derives the tile counts for a `width` x `height` target.
    pub fn new(width: u32, height: u32, settings: &ClusteredLightingSettings) -> Self {
        Self {
            width,
            height,
            tile_size: settings.tile_size,
            big_tile_size: settings.big_tile_size,
            cluster_tile_size: settings.cluster_tile_size,
            num_tile_ftpl_x: width.div_ceil(settings.tile_size),
            num_tile_ftpl_y: height.div_ceil(settings.tile_size),
            num_big_tiles_x: width.div_ceil(settings.big_tile_size),
            num_big_tiles_y: height.div_ceil(settings.big_tile_size),
            num_clusters_x: width.div_ceil(settings.cluster_tile_size),
            num_clusters_y: height.div_ceil(settings.cluster_tile_size),
            log2_num_clusters: settings.log2_num_clusters,
        }
    }

    /// Total big tiles.
    #[inline]
    pub const fn nr_big_tiles(&self) -> usize {
        self.num_big_tiles_x as usize * self.num_big_tiles_y as usize
    }

    /// Total cluster tiles (columns).
    #[inline]
    pub const fn nr_cluster_tiles(&self) -> usize {
        self.num_clusters_x as usize * self.num_clusters_y as usize
    }

    /// Depth slices per cluster column.
    #[inline]
    pub const fn num_slices(&self) -> usize {
        1 << self.log2_num_clusters
    }

    /// Total clusters: columns times slices.
    #[inline]
    pub const fn num_clusters(&self) -> usize {
        self.nr_cluster_tiles() * self.num_slices()
    }

    /// Entries of the per-voxel offset table.
    #[inline]
    pub const fn voxel_table_len(&self) -> usize {
        LIGHT_CATEGORY_COUNT * self.num_clusters()
    }

    /// Big tile containing pixel `(x, y)`.
    #[inline]
    pub const fn big_tile_of_pixel(&self, x: u32, y: u32) -> usize {
        ((y / self.big_tile_size) * self.num_big_tiles_x + x / self.big_tile_size) as usize
    }

    /// Cluster column containing pixel `(x, y)`.
    #[inline]
    pub const fn cluster_tile_of_pixel(&self, x: u32, y: u32) -> usize {
        ((y / self.cluster_tile_size) * self.num_clusters_x + x / self.cluster_tile_size) as usize
    }

    /// Big tile containing cluster column `(cx, cy)`.
    #[inline]
    pub const fn parent_big_tile(&self, cx: u32, cy: u32) -> usize {
        self.big_tile_of_pixel(cx * self.cluster_tile_size, cy * self.cluster_tile_size)
    }

    /// Index of `(category, slice, tile)` in the per-voxel offset table.
    #[inline]
    pub const fn voxel_index(&self, category: usize, slice: usize, tile: usize) -> usize {
        (category * self.num_slices() + slice) * self.nr_cluster_tiles() + tile
    }
}

/// `sum_{i < n} base^i`.
#[inline]
fn geometric_series(base: f32, num_slices: u32) -> f32 {
    (1.0 - base.powi(num_slices as i32)) / (1.0 - base)
}

/// Exponential depth slicing between the near and far planes.
///
/// Slice `k` starts at `z(k) = (base^k - 1) / (scale * (base - 1)) + near`,
/// with `scale` chosen so that `z(num_slices) = far`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSlicing {
    /// Near plane.
    pub near: f32,
    /// Far plane.
    pub far: f32,
    /// Log base.
    pub base: f32,
    /// Depth scale.
    pub scale: f32,
    /// Number of slices.
    pub num_slices: u32,
}

impl DepthSlicing {
    /// Slicing of `[near, far]` into `num_slices` slices with log base `base`.
    pub fn new(near: f32, far: f32, base: f32, num_slices: u32) -> Self {
        let range = (far - near).max(f32::EPSILON);
        Self {
            near,
            far,
            base,
            scale: geometric_series(base, num_slices) / range,
            num_slices,
        }
    }

    /// Slice index holding view depth `z`, clamped to the valid range.
    pub fn slice_for_depth(&self, z: f32) -> u32 {
        let d = (z - self.near).max(0.0);
        let k = (d * self.scale * (self.base - 1.0) + 1.0).log2() / self.base.log2();
        (k.max(0.0) as u32).min(self.num_slices - 1)
    }

    /// View depth where slice `k` starts. `k == num_slices` yields the far plane.
    pub fn depth_for_slice(&self, k: u32) -> f32 {
        (self.base.powi(k as i32) - 1.0) / (self.scale * (self.base - 1.0)) + self.near
    }
}

/// Suggests a per-tile log base so slices concentrate in front of `tile_far`.
///
/// Never returns less than `global_base`.
pub fn suggest_log_base(tile_far: f32, near: f32, far: f32, num_slices: u32, global_base: f32) -> f32 {
    let range = (far - near).max(f32::EPSILON);
    let n = ((tile_far - near) / range).clamp(MIN_NORMALIZED_TILE_DEPTH, 1.0);
    let disc = (1.0 - 4.0 * n * (1.0 - n)).max(0.0).sqrt();
    let suggested = ((1.0 + disc) / (2.0 * n)).powf(2.0 / num_slices as f32);
    suggested.max(global_base)
}

/// Corner `index` (bit 0: x sign, bit 1: y sign, bit 2: z sign) of a light bound.
///
/// Corners on the -Z face are scaled by `scale_xy`.
pub fn bound_corner(bound: &LightBound, index: u32) -> Vec3 {
    let sx = if index & 1 != 0 { 1.0 } else { -1.0 };
    let sy = if index & 2 != 0 { 1.0 } else { -1.0 };
    let sz = if index & 4 != 0 { 1.0 } else { -1.0 };
    let s = if sz < 0.0 { bound.scale_xy } else { 1.0 };
    Vec3::from(bound.center)
        + Vec3::from(bound.box_axis_x) * (sx * s)
        + Vec3::from(bound.box_axis_y) * (sy * s)
        + Vec3::from(bound.box_axis_z) * sz
}

/// Endpoints of box edge `edge` (0..12), as corner indices.
pub const fn edge_endpoints(edge: u32) -> (u32, u32) {
    let axis = edge / 4;
    let rest = edge % 4;
    let low_mask = (1 << axis) - 1;
    let a = (rest & low_mask) | ((rest & !low_mask) << 1);
    (a, a | (1 << axis))
}

/// Accumulates clipped, projected vertices into a screen-space AABB.
#[derive(Debug, Clone, Copy)]
pub struct AabbAccumulator {
    aabb: ScreenSpaceAabb,
}

impl Default for AabbAccumulator {
    fn default() -> Self {
        Self {
            aabb: ScreenSpaceAabb::EMPTY,
        }
    }
}

impl AabbAccumulator {
    /// Projects a culling view space point (already known to be in front of
    /// the near plane) and grows the AABB.
    pub fn add_point(&mut self, screen_projection: &Mat4, p: Vec3) {
        let clip = *screen_projection * p.extend(1.0);
        let w = if clip.w.abs() > f32::EPSILON { clip.w } else { f32::EPSILON };
        let (x, y) = (clip.x / w, clip.y / w);
        let aabb = &mut self.aabb;
        aabb.min[0] = aabb.min[0].min(x);
        aabb.min[1] = aabb.min[1].min(y);
        aabb.min[2] = aabb.min[2].min(p.z);
        aabb.max[0] = aabb.max[0].max(x);
        aabb.max[1] = aabb.max[1].max(y);
        aabb.max[2] = aabb.max[2].max(p.z);
    }

    /// Merges another partial AABB.
    pub fn merge(&mut self, other: &ScreenSpaceAabb) {
        for i in 0..3 {
            self.aabb.min[i] = self.aabb.min[i].min(other.min[i]);
            self.aabb.max[i] = self.aabb.max[i].max(other.max[i]);
        }
    }

    /// The accumulated bounds.
    pub fn finish(self) -> ScreenSpaceAabb {
        self.aabb
    }
}

/// Adds the part of the bound's corner set and edge set owned by `lane` (of
/// `lanes`) to `acc`, clipping against the near plane.
///
/// With `lanes == 1` this processes the whole bound.
pub fn accumulate_bound_part(
    acc: &mut AabbAccumulator,
    bound: &LightBound,
    screen_projection: &Mat4,
    near: f32,
    is_orthographic: bool,
    lane: u32,
    lanes: u32,
) {
    let mut corner = lane;
    while corner < 8 {
        let p = bound_corner(bound, corner);
        if is_orthographic || p.z >= near {
            acc.add_point(screen_projection, p);
        }
        corner += lanes;
    }
    if is_orthographic {
        return;
    }
    let mut edge = lane;
    while edge < 12 {
        let (ia, ib) = edge_endpoints(edge);
        let (a, b) = (bound_corner(bound, ia), bound_corner(bound, ib));
        if (a.z < near) != (b.z < near) {
            let t = (near - a.z) / (b.z - a.z);
            acc.add_point(screen_projection, a + (b - a) * t);
        }
        edge += lanes;
    }
}

/// Projects a light bound to pixel space plus a depth range.
///
/// The box is clipped against the near plane first, so lights straddling the
/// camera keep a tight rectangle. Bounds entirely behind the camera come back
/// as [`ScreenSpaceAabb::EMPTY`].
pub fn project_bound(
    bound: &LightBound,
    screen_projection: &Mat4,
    near: f32,
    is_orthographic: bool,
) -> ScreenSpaceAabb {
    if !is_orthographic && bound.center[2] + bound.radius < near {
        return ScreenSpaceAabb::EMPTY;
    }
    let mut acc = AabbAccumulator::default();
    accumulate_bound_part(&mut acc, bound, screen_projection, near, is_orthographic, 0, 1);
    acc.finish()
}

/// Solves for the culling view space point that projects to pixel `(u, v)` at depth `z`.
pub fn view_pos_from_pixel(screen_projection: &Mat4, u: f32, v: f32, z: f32) -> Vec3 {
    let m = screen_projection;
    let row = |r: usize| m.row(r);
    let (r0, r1, r3) = (row(0), row(1), row(3));
    let a11 = r0.x - u * r3.x;
    let a12 = r0.y - u * r3.y;
    let b1 = -((r0.z - u * r3.z) * z + (r0.w - u * r3.w));
    let a21 = r1.x - v * r3.x;
    let a22 = r1.y - v * r3.y;
    let b2 = -((r1.z - v * r3.z) * z + (r1.w - v * r3.w));
    let det = a11 * a22 - a12 * a21;
    if det.abs() < 1e-20 {
        return Vec3::new(0.0, 0.0, z);
    }
    Vec3::new((b1 * a22 - a12 * b2) / det, (a11 * b2 - b1 * a21) / det, z)
}

/// Conservative bounds of one cluster voxel in culling view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelBounds {
    /// AABB minimum.
    pub min: Vec3,
    /// AABB maximum.
    pub max: Vec3,
    /// Bounding sphere center.
    pub center: Vec3,
    /// Bounding sphere radius.
    pub radius: f32,
}

impl VoxelBounds {
    /// Bounds of the frustum piece spanning pixels `[x0, x1] x [y0, y1]` and depths `[z0, z1]`.
    pub fn from_pixel_rect(
        screen_projection: &Mat4,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        z0: f32,
        z1: f32,
    ) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(-f32::MAX);
        for z in [z0, z1] {
            for (u, v) in [(x0, y0), (x1, y0), (x0, y1), (x1, y1)] {
                let p = view_pos_from_pixel(screen_projection, u, v, z);
                min = min.min(p);
                max = max.max(p);
            }
        }
        let center = (min + max) * 0.5;
        Self {
            min,
            max,
            center,
            radius: (max - center).length(),
        }
    }
}

/// Circumscribed sphere of a bound against the voxel AABB.
pub fn bound_sphere_overlaps_voxel(bound: &LightBound, voxel: &VoxelBounds) -> bool {
    let center = Vec3::from(bound.center);
    let closest = center.clamp(voxel.min, voxel.max);
    (center - closest).length_squared() <= bound.radius * bound.radius
}

/// Precise light/voxel test dispatching on the volume shape.
pub fn light_intersects_voxel(volume: &LightVolumeData, voxel: &VoxelBounds) -> bool {
    match volume.volume() {
        Some(LightVolume::Sphere) => sphere_intersects_aabb(volume, voxel),
        Some(LightVolume::Cone) => cone_intersects_sphere(volume, voxel),
        Some(LightVolume::Box) => box_intersects_sphere(volume, voxel),
        None => true,
    }
}

/// Squared distance from the light origin to the voxel AABB against `radius_sq`.
pub fn sphere_intersects_aabb(volume: &LightVolumeData, voxel: &VoxelBounds) -> bool {
    let p = Vec3::from(volume.light_pos);
    let closest = p.clamp(voxel.min, voxel.max);
    (p - closest).length_squared() <= volume.radius_sq
}

/// Sphere/cone test against the voxel's bounding sphere.
pub fn cone_intersects_sphere(volume: &LightVolumeData, voxel: &VoxelBounds) -> bool {
    let apex = Vec3::from(volume.light_pos);
    let dir = Vec3::from(volume.light_axis_z);
    let range = volume.radius_sq.sqrt();
    let (sin_a, cos_a) = if volume.cotan >= 1e18 {
        (0.0, 1.0)
    } else {
        let sin_a = 1.0 / (1.0 + volume.cotan * volume.cotan).sqrt();
        (sin_a, volume.cotan * sin_a)
    };

    let v = voxel.center - apex;
    let len_sq = v.length_squared();
    let v1_len = v.dot(dir);
    let dist_closest = cos_a * (len_sq - v1_len * v1_len).max(0.0).sqrt() - v1_len * sin_a;
    let angle_cull = dist_closest > voxel.radius;
    let front_cull = v1_len > voxel.radius + range;
    let back_cull = v1_len < -voxel.radius;
    !(angle_cull || front_cull || back_cull)
}

/// Closest point of the outer box to the voxel's bounding sphere.
pub fn box_intersects_sphere(volume: &LightVolumeData, voxel: &VoxelBounds) -> bool {
    let v = voxel.center - Vec3::from(volume.light_pos);
    let local = Vec3::new(
        v.dot(Vec3::from(volume.light_axis_x)),
        v.dot(Vec3::from(volume.light_axis_y)),
        v.dot(Vec3::from(volume.light_axis_z)),
    );
    let inv_range = Vec3::from(volume.box_inv_range);
    let outer = Vec3::from(volume.box_inner_dist) + Vec3::ONE / inv_range.max(Vec3::splat(1e-6));
    let closest = local.clamp(-outer, outer);
    (local - closest).length_squared() <= voxel.radius * voxel.radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::clustered::layouts::LightCategory;
    use approx::assert_relative_eq;

    fn settings() -> ClusteredLightingSettings {
        ClusteredLightingSettings::default()
    }

    #[test]
    fn concrete_1080p_grid() {
        let grid = ClusterGrid::new(1920, 1080, &settings());
        assert_eq!(grid.num_tile_ftpl_x, 120);
        assert_eq!(grid.num_tile_ftpl_y, 68);
        assert_eq!(grid.num_big_tiles_x, 30);
        assert_eq!(grid.num_big_tiles_y, 17);
        assert_eq!(grid.num_clusters_x, 60);
        assert_eq!(grid.num_clusters_y, 34);
        assert_eq!(grid.nr_cluster_tiles(), 2040);
        assert_eq!(grid.num_clusters(), 2040 * 64);
    }

    #[test]
    fn every_pixel_maps_to_one_tile_and_one_column() {
        for (w, h) in [(1, 1), (63, 65), (640, 360), (1921, 1079)] {
            let grid = ClusterGrid::new(w, h, &settings());
            assert_eq!(grid.num_big_tiles_x, w.div_ceil(64));
            for (x, y) in [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1), (w / 2, h / 2)] {
                assert!(grid.big_tile_of_pixel(x, y) < grid.nr_big_tiles());
                let column = grid.cluster_tile_of_pixel(x, y);
                assert!(column < grid.nr_cluster_tiles());
                let (cx, cy) = (x / 32, y / 32);
                assert_eq!(grid.parent_big_tile(cx, cy), grid.big_tile_of_pixel(x, y));
            }
        }
    }

    #[test]
    fn voxel_index_is_category_major() {
        let grid = ClusterGrid::new(128, 64, &settings());
        assert_eq!(grid.nr_cluster_tiles(), 8);
        assert_eq!(grid.voxel_index(0, 0, 3), 3);
        assert_eq!(grid.voxel_index(0, 1, 0), 8);
        assert_eq!(
            grid.voxel_index(LightCategory::Env.index(), 0, 0),
            2 * 64 * 8
        );
        assert_eq!(grid.voxel_table_len(), 4 * 64 * 8);
    }

    #[test]
    fn depth_slicing_spans_near_to_far() {
        let slicing = DepthSlicing::new(0.1, 100.0, 1.02, 64);
        assert_relative_eq!(slicing.depth_for_slice(0), 0.1, epsilon = 1e-5);
        assert_relative_eq!(slicing.depth_for_slice(64), 100.0, epsilon = 1e-2);
        assert_eq!(slicing.slice_for_depth(0.0), 0);
        assert_eq!(slicing.slice_for_depth(1000.0), 63);
        for k in [0u32, 5, 31, 62] {
            let mid = 0.5 * (slicing.depth_for_slice(k) + slicing.depth_for_slice(k + 1));
            assert_eq!(slicing.slice_for_depth(mid), k);
        }
    }

    #[test]
    fn suggested_base_never_below_global() {
        assert_relative_eq!(suggest_log_base(100.0, 0.1, 100.0, 64, 1.02), 1.02);
        let near_tile = suggest_log_base(10.0, 0.1, 100.0, 64, 1.02);
        assert!(near_tile > 1.02);
        assert!(near_tile.is_finite());
        assert!(suggest_log_base(0.0, 0.1, 100.0, 64, 1.02).is_finite());
    }

    #[test]
    fn culling_view_flips_depth() {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let cull = culling_view_matrix(&view);
        let p = cull.transform_point3(Vec3::new(1.0, 2.0, -5.0));
        assert_relative_eq!(p.z, 5.0, epsilon = 1e-6);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-6);

        let moved = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let q = culling_view_matrix(&moved).transform_point3(Vec3::ZERO);
        assert_relative_eq!(q.z, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn screen_projection_maps_axis_to_center() {
        let proj = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0);
        let scr = screen_projection_matrix(&proj, 1920, 1080);
        let clip = scr * Vec4::new(0.0, 0.0, 10.0, 1.0);
        assert_relative_eq!(clip.x / clip.w, 960.0, epsilon = 1e-3);
        assert_relative_eq!(clip.y / clip.w, 540.0, epsilon = 1e-3);
        let up = scr * Vec4::new(0.0, 1.0, 10.0, 1.0);
        assert!(up.y / up.w < 540.0);
    }

    #[test]
    fn unproject_inverts_projection() {
        let proj = Mat4::perspective_rh(1.2, 1.5, 0.1, 50.0);
        let scr = screen_projection_matrix(&proj, 300, 200);
        let p = Vec3::new(1.5, -0.75, 7.0);
        let clip = scr * p.extend(1.0);
        let back = view_pos_from_pixel(&scr, clip.x / clip.w, clip.y / clip.w, p.z);
        assert_relative_eq!(back.x, p.x, epsilon = 1e-3);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-3);
    }

    #[test]
    fn edges_connect_corners_differing_in_one_axis() {
        for edge in 0..12 {
            let (a, b) = edge_endpoints(edge);
            assert_eq!((a ^ b).count_ones(), 1);
            assert!(a < 8 && b < 8);
        }
    }

    #[test]
    fn bound_behind_camera_is_empty() {
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let scr = screen_projection_matrix(&proj, 256, 256);
        let bound = LightBound {
            box_axis_x: [1.0, 0.0, 0.0],
            box_axis_y: [0.0, 1.0, 0.0],
            box_axis_z: [0.0, 0.0, 1.0],
            center: [0.0, 0.0, -5.0],
            radius: 1.0,
            scale_xy: 1.0,
            ..Default::default()
        };
        assert_eq!(project_bound(&bound, &scr, 0.1, false), ScreenSpaceAabb::EMPTY);
    }

    #[test]
    fn straddling_bound_is_clipped_to_near_plane() {
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let scr = screen_projection_matrix(&proj, 256, 256);
        let bound = LightBound {
            box_axis_x: [1.0, 0.0, 0.0],
            box_axis_y: [0.0, 1.0, 0.0],
            box_axis_z: [0.0, 0.0, 2.0],
            center: [0.0, 0.0, 1.0],
            radius: 2.5,
            scale_xy: 1.0,
            ..Default::default()
        };
        let aabb = project_bound(&bound, &scr, 0.1, false);
        assert_relative_eq!(aabb.min[2], 0.1, epsilon = 1e-5);
        assert_relative_eq!(aabb.max[2], 3.0, epsilon = 1e-5);
        assert!(aabb.overlaps_rect(127.0, 127.0, 129.0, 129.0));
    }

    #[test]
    fn split_accumulation_matches_single_pass() {
        let proj = Mat4::perspective_rh(1.0, 1.3, 0.1, 100.0);
        let scr = screen_projection_matrix(&proj, 640, 480);
        let bound = LightBound {
            box_axis_x: [0.8, 0.2, 0.0],
            box_axis_y: [-0.2, 0.8, 0.0],
            box_axis_z: [0.0, 0.0, 1.5],
            center: [0.3, -0.4, 1.0],
            radius: 2.0,
            scale_xy: 0.01,
            ..Default::default()
        };
        let whole = project_bound(&bound, &scr, 0.1, false);
        let mut combined = AabbAccumulator::default();
        for lane in 0..4 {
            let mut part = AabbAccumulator::default();
            accumulate_bound_part(&mut part, &bound, &scr, 0.1, false, lane, 4);
            combined.merge(&part.finish());
        }
        assert_eq!(combined.finish(), whole);
    }

    fn voxel_at(center: Vec3, half: f32) -> VoxelBounds {
        VoxelBounds {
            min: center - Vec3::splat(half),
            max: center + Vec3::splat(half),
            center,
            radius: half * 3f32.sqrt(),
        }
    }

    #[test]
    fn sphere_test_rejects_far_voxels() {
        let volume = LightVolumeData {
            light_pos: [0.0, 0.0, 10.0],
            light_volume: LightVolume::Sphere as u32,
            radius_sq: 4.0,
            ..Default::default()
        };
        assert!(light_intersects_voxel(&volume, &voxel_at(Vec3::new(0.0, 0.0, 11.0), 0.5)));
        assert!(!light_intersects_voxel(&volume, &voxel_at(Vec3::new(0.0, 0.0, 15.0), 0.5)));
    }

    #[test]
    fn cone_test_culls_behind_and_outside() {
        let half = 20f32.to_radians();
        let volume = LightVolumeData {
            light_pos: [0.0, 0.0, 5.0],
            light_volume: LightVolume::Cone as u32,
            light_axis_z: [0.0, 0.0, 1.0],
            radius_sq: 100.0,
            cotan: half.cos() / half.sin(),
            ..Default::default()
        };
        assert!(light_intersects_voxel(&volume, &voxel_at(Vec3::new(0.0, 0.0, 10.0), 0.5)));
        assert!(!light_intersects_voxel(&volume, &voxel_at(Vec3::new(0.0, 0.0, 2.0), 0.5)));
        assert!(!light_intersects_voxel(&volume, &voxel_at(Vec3::new(8.0, 0.0, 7.0), 0.5)));
        assert!(!light_intersects_voxel(&volume, &voxel_at(Vec3::new(0.0, 0.0, 17.0), 0.5)));
    }

    #[test]
    fn box_test_uses_outer_extents() {
        let volume = LightVolumeData {
            light_pos: [0.0, 0.0, 10.0],
            light_volume: LightVolume::Box as u32,
            light_axis_x: [1.0, 0.0, 0.0],
            light_axis_y: [0.0, 1.0, 0.0],
            light_axis_z: [0.0, 0.0, 1.0],
            box_inner_dist: [1.99, 1.99, 1.99],
            box_inv_range: [100.0, 100.0, 100.0],
            ..Default::default()
        };
        assert!(light_intersects_voxel(&volume, &voxel_at(Vec3::new(2.4, 0.0, 10.0), 0.5)));
        assert!(!light_intersects_voxel(&volume, &voxel_at(Vec3::new(3.0, 0.0, 10.0), 0.5)));
    }
}
