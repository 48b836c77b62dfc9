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

//! CPU construction of light bounds, volumes and shading payloads.
//!
//! Every punctual light is turned into a [`LightBound`] / [`LightVolumeData`]
//! pair and a [`LightData`] record by [`build_punctual`], a pure function of
//! the light and its index. Outputs are written at disjoint indices, so the
//! work fans out over `rayon` without locks and joins once before the arrays
//! are read.

use std::f32::consts::FRAC_PI_2;

use lucerna_core::lane::{Lane, LaneKind};
use lucerna_core::math::{Mat4, Vec3};
use lucerna_core::renderer::clustered::{
    culling_view_matrix, gpu_light_type, ClusteredLightingSettings, DirectionalLightData,
    LightBound, LightCategory, LightData, LightFeatureFlags, LightVolume, LightVolumeData,
    CONE_COTAN_MAX,
};
use lucerna_core::renderer::{
    CookieLookup, LightKind, ProbeInfluence, ReflectionProbe, ShadowSliceLookup, VisibleLight,
};
use rayon::prelude::*;

use super::buffer_pool::grown_capacity;
use crate::error::LightingError;

/// How punctual lights are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildStrategy {
    /// Parallel from `parallel_threshold` lights on, sequential below.
    #[default]
    Auto,
    /// Always a single-threaded loop.
    Sequential,
    /// Always `rayon` chunks.
    Parallel,
}

/// Per-camera inputs shared by every unit of work.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    /// World to culling view space (+Z forward).
    pub cull_view: Mat4,
    /// XY scale of the apex face of squeezed spot bounds.
    pub spot_squeeze_scale_xy: f32,
    /// Shadow slice lookup.
    pub shadows: &'a dyn ShadowSliceLookup,
    /// Cookie slot lookup.
    pub cookies: &'a dyn CookieLookup,
}

impl<'a> BuildContext<'a> {
    /// Context for a camera whose right-handed world-to-view matrix is `camera_view`.
    pub fn new(
        camera_view: &Mat4,
        settings: &ClusteredLightingSettings,
        shadows: &'a dyn ShadowSliceLookup,
        cookies: &'a dyn CookieLookup,
    ) -> Self {
        Self {
            cull_view: culling_view_matrix(camera_view),
            spot_squeeze_scale_xy: settings.spot_squeeze_scale_xy,
            shadows,
            cookies,
        }
    }
}

fn lookup_index(found: Option<u32>) -> i32 {
    found.and_then(|v| i32::try_from(v).ok()).unwrap_or(-1)
}

fn validate(light: &VisibleLight, index: usize) -> Result<(), LightingError> {
    let invalid = |reason| Err(LightingError::InvalidLight { index, reason });
    if !light.position.is_finite() {
        return invalid("position is not finite");
    }
    if !(light.range.is_finite() && light.range > 0.0) {
        return invalid("range must be finite and positive");
    }
    if light.kind == LightKind::Spot
        && !(light.spot_angle.is_finite() && light.spot_angle > 0.0 && light.spot_angle <= std::f32::consts::PI)
    {
        return invalid("spot angle must be within (0, pi]");
    }
    Ok(())
}

/// Builds the bound, volume and shading payload of one punctual light.
///
/// `light_index` is the light's position in the visible-light list; it keys
/// the shadow and cookie lookups and error reports.
pub fn build_punctual(
    light: &VisibleLight,
    light_index: usize,
    ctx: &BuildContext<'_>,
) -> Result<(LightBound, LightVolumeData, LightData), LightingError> {
    validate(light, light_index)?;

    debug_assert!(
        matches!(light.kind, LightKind::Point | LightKind::Spot),
        "light {light_index} of kind {:?} reached the punctual builder",
        light.kind
    );
    let kind = match light.kind {
        LightKind::Point | LightKind::Spot => light.kind,
        other => {
            log::warn!(
                "LightBoundsBuilder: Light {} of kind {:?} has no culling bound, treating it as a point light",
                light_index,
                other
            );
            LightKind::Point
        }
    };

    let range = light.range;
    let pos_v = ctx.cull_view.transform_point3(light.position);
    let vx = ctx.cull_view.transform_vector3(light.right);
    let vy = ctx.cull_view.transform_vector3(light.up);
    let vz = ctx.cull_view.transform_vector3(light.forward);

    let mut data = LightData {
        view_position: pos_v.to_array(),
        range,
        color: light.color.to_array(),
        light_type: gpu_light_type::POINT,
        forward: light.forward.to_array(),
        range_attenuation_scale: 1.0 / (range * range),
        right: light.right.to_array(),
        range_attenuation_bias: 1.0,
        up: light.up.to_array(),
        angle_scale: 0.0,
        position_ws: light.position.to_array(),
        angle_offset: 1.0,
        shape_radius: light.shape_radius,
        shadow_index: lookup_index(ctx.shadows.shadow_slice(light_index)),
        cookie_index: lookup_index(ctx.cookies.cookie_index(light_index)),
        rendering_layers: light.rendering_layers,
    };

    let mut volume = LightVolumeData {
        light_pos: pos_v.to_array(),
        light_category: LightCategory::Punctual as u32,
        radius_sq: range * range,
        feature_flags: LightFeatureFlags::PUNCTUAL.bits(),
        ..Default::default()
    };

    let bound = if kind == LightKind::Spot {
        let half = 0.5 * light.spot_angle;
        let (sin_a, cos_a) = half.sin_cos();
        let squeeze = (half - FRAC_PI_2).abs() > 1e-6;
        let side = if squeeze { half.tan() } else { sin_a };

        let alt_dist = ((range * (cos_a - 0.5)).powi(2) + (range * sin_a).powi(2)).sqrt();
        let bound = LightBound {
            box_axis_x: (vx * (side * range)).to_array(),
            radius: alt_dist.max(0.5 * range),
            box_axis_y: (vy * (side * range)).to_array(),
            scale_xy: if squeeze { ctx.spot_squeeze_scale_xy } else { 1.0 },
            box_axis_z: (vz * (0.5 * range)).to_array(),
            center: (pos_v + vz * (0.5 * range)).to_array(),
            ..Default::default()
        };

        volume.light_volume = LightVolume::Cone as u32;
        volume.light_axis_x = vx.to_array();
        volume.light_axis_y = vy.to_array();
        volume.light_axis_z = vz.to_array();
        volume.cotan = if sin_a > 0.0 { cos_a / sin_a } else { CONE_COTAN_MAX };

        let cos_inner = (0.5 * light.inner_spot_angle.clamp(0.0, light.spot_angle)).cos();
        data.light_type = gpu_light_type::SPOT;
        data.angle_scale = 1.0 / (cos_inner - cos_a).max(1e-4);
        data.angle_offset = -cos_a * data.angle_scale;
        bound
    } else {
        volume.light_volume = LightVolume::Sphere as u32;
        volume.light_axis_x = Vec3::X.to_array();
        volume.light_axis_y = Vec3::Y.to_array();
        volume.light_axis_z = Vec3::Z.to_array();
        LightBound {
            box_axis_x: [range, 0.0, 0.0],
            radius: range,
            box_axis_y: [0.0, range, 0.0],
            scale_xy: 1.0,
            box_axis_z: [0.0, 0.0, range],
            center: pos_v.to_array(),
            ..Default::default()
        }
    };

    Ok((bound, volume, data))
}

/// Builds the bound and volume of a reflection probe.
pub fn build_probe(
    probe: &ReflectionProbe,
    cull_view: &Mat4,
    extent_threshold: f32,
) -> (LightBound, LightVolumeData) {
    let center = cull_view.transform_point3(probe.position);
    let vx = cull_view.transform_vector3(probe.right);
    let vy = cull_view.transform_vector3(probe.up);
    let vz = cull_view.transform_vector3(probe.forward);
    let extents = probe.extents();

    let bound = LightBound {
        box_axis_x: (vx * extents.x).to_array(),
        radius: probe.bounding_sphere_radius(),
        box_axis_y: (vy * extents.y).to_array(),
        scale_xy: 1.0,
        box_axis_z: (vz * extents.z).to_array(),
        center: center.to_array(),
        ..Default::default()
    };

    let mut volume = LightVolumeData {
        light_pos: center.to_array(),
        light_axis_x: vx.to_array(),
        light_category: LightCategory::Env as u32,
        light_axis_y: vy.to_array(),
        light_axis_z: vz.to_array(),
        feature_flags: LightFeatureFlags::ENV.bits(),
        ..Default::default()
    };
    match probe.influence {
        ProbeInfluence::Box { extents } => {
            volume.light_volume = LightVolume::Box as u32;
            volume.box_inner_dist = (extents - Vec3::splat(extent_threshold))
                .max(Vec3::ZERO)
                .to_array();
            volume.box_inv_range = [1.0 / extent_threshold; 3];
        }
        ProbeInfluence::Sphere { radius } => {
            volume.light_volume = LightVolume::Sphere as u32;
            volume.radius_sq = radius * radius;
        }
    }
    (bound, volume)
}

fn build_directional(
    light: &VisibleLight,
    light_index: usize,
    ctx: &BuildContext<'_>,
) -> DirectionalLightData {
    DirectionalLightData {
        forward: light.forward.to_array(),
        angular_diameter: light.angular_diameter,
        right: light.right.to_array(),
        shadow_index: lookup_index(ctx.shadows.shadow_slice(light_index)),
        up: light.up.to_array(),
        cookie_index: lookup_index(ctx.cookies.cookie_index(light_index)),
        color: light.color.to_array(),
        rendering_layers: light.rendering_layers,
    }
}

fn build_chunk(
    bounds: &mut [LightBound],
    volumes: &mut [LightVolumeData],
    data: &mut [LightData],
    indices: &[usize],
    lights: &[VisibleLight],
    ctx: &BuildContext<'_>,
) -> Result<(), LightingError> {
    for (slot, &light_index) in indices.iter().enumerate() {
        let (bound, volume, light_data) = build_punctual(&lights[light_index], light_index, ctx)?;
        bounds[slot] = bound;
        volumes[slot] = volume;
        data[slot] = light_data;
    }
    Ok(())
}

fn ensure_len<T: Default + Clone>(items: &mut Vec<T>, needed: usize, min_capacity: usize) {
    if needed <= items.len() {
        return;
    }
    let current = (!items.is_empty()).then_some(items.len());
    items.resize(grown_capacity(current, needed, min_capacity), T::default());
}

/// Staging arrays of one camera's bounds and shading payloads.
///
/// Per frame: [`new_frame`](Self::new_frame), then
/// [`build_light_list`](Self::build_light_list), then
/// [`add_probes`](Self::add_probes). Punctual lights therefore occupy the
/// first bound slots and bound `i < punctual_count()` pairs with
/// `light_data()[i]`.
#[derive(Debug)]
pub struct LightBoundsBuilder {
    bounds: Vec<LightBound>,
    volumes: Vec<LightVolumeData>,
    light_data: Vec<LightData>,
    directional: Vec<DirectionalLightData>,
    bound_count: usize,
    punctual_count: usize,
    env_count: usize,
    feature_flags: LightFeatureFlags,
    settings: ClusteredLightingSettings,
    strategy: BuildStrategy,
}

impl LightBoundsBuilder {
    /// Creates a builder with empty staging arrays.
    pub fn new(settings: &ClusteredLightingSettings) -> Self {
        Self {
            bounds: Vec::new(),
            volumes: Vec::new(),
            light_data: Vec::new(),
            directional: Vec::new(),
            bound_count: 0,
            punctual_count: 0,
            env_count: 0,
            feature_flags: LightFeatureFlags::empty(),
            settings: settings.clone(),
            strategy: BuildStrategy::Auto,
        }
    }

    /// Overrides the scheduling strategy.
    pub fn with_strategy(mut self, strategy: BuildStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// The scheduling strategy.
    pub fn strategy(&self) -> BuildStrategy {
        self.strategy
    }

    /// Resets the counters and ensures room for `max_bounds_count` bounds.
    ///
    /// Arrays grow with the pool's policy and never shrink.
    pub fn new_frame(&mut self, max_bounds_count: usize) {
        self.bound_count = 0;
        self.punctual_count = 0;
        self.env_count = 0;
        self.feature_flags = LightFeatureFlags::empty();
        self.directional.clear();
        self.reserve_bounds(max_bounds_count);
    }

    fn reserve_bounds(&mut self, needed: usize) {
        let min = self.settings.min_pool_capacity;
        ensure_len(&mut self.bounds, needed, min);
        ensure_len(&mut self.volumes, needed, min);
    }

    /// Appends an externally built bound at the write cursor.
    pub fn add_bound(&mut self, bound: LightBound, volume: LightVolumeData) {
        let slot = self.bound_count;
        self.reserve_bounds(slot + 1);
        self.bounds[slot] = bound;
        self.volumes[slot] = volume;
        self.feature_flags |= LightFeatureFlags::from_bits_retain(volume.feature_flags);
        self.bound_count += 1;
    }

    /// Builds bounds and shading payloads for `lights` seen from `ctx`'s camera.
    ///
    /// Directional lights go to their own array, capped at
    /// `max_directional_lights`. Every other light gets one bound.
    ///
    /// # Errors
    ///
    /// Returns [`LightingError::InvalidLight`] for a light with a non-finite
    /// position or a non-positive range. Nothing is committed in that case.
    pub fn build_light_list(
        &mut self,
        lights: &[VisibleLight],
        ctx: &BuildContext<'_>,
    ) -> Result<(), LightingError> {
        if lights.is_empty() {
            return Ok(());
        }

        let max_directional = self.settings.max_directional_lights as usize;
        let mut punctual = Vec::with_capacity(lights.len());
        let mut dropped = 0usize;
        for (index, light) in lights.iter().enumerate() {
            if light.kind != LightKind::Directional {
                punctual.push(index);
            } else if self.directional.len() < max_directional {
                self.directional.push(build_directional(light, index, ctx));
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            log::warn!(
                "LightBoundsBuilder: Dropped {} directional lights over the limit of {}",
                dropped,
                max_directional
            );
        }
        if !self.directional.is_empty() {
            self.feature_flags |= LightFeatureFlags::DIRECTIONAL;
        }

        let n = punctual.len();
        if n == 0 {
            return Ok(());
        }

        let start = self.bound_count;
        let data_start = self.punctual_count;
        self.reserve_bounds(start + n);
        ensure_len(&mut self.light_data, data_start + n, self.settings.min_pool_capacity);

        let bounds = &mut self.bounds[start..start + n];
        let volumes = &mut self.volumes[start..start + n];
        let data = &mut self.light_data[data_start..data_start + n];

        let parallel = match self.strategy {
            BuildStrategy::Auto => n >= self.settings.parallel_threshold,
            BuildStrategy::Sequential => false,
            BuildStrategy::Parallel => true,
        };
        if parallel {
            let chunk = self.settings.parallel_chunk_size.max(1);
            bounds
                .par_chunks_mut(chunk)
                .zip(volumes.par_chunks_mut(chunk))
                .zip(data.par_chunks_mut(chunk))
                .zip(punctual.par_chunks(chunk))
                .try_for_each(|(((b, v), d), idx)| build_chunk(b, v, d, idx, lights, ctx))?;
        } else {
            build_chunk(bounds, volumes, data, &punctual, lights, ctx)?;
        }

        log::trace!(
            "LightBoundsBuilder: Built {} punctual bounds ({})",
            n,
            if parallel { "parallel" } else { "sequential" }
        );
        self.bound_count += n;
        self.punctual_count += n;
        self.feature_flags |= LightFeatureFlags::PUNCTUAL;
        Ok(())
    }

    /// Appends reflection probe volumes, drawn in ascending importance with
    /// larger probes first among equals.
    pub fn add_probes(&mut self, probes: &[ReflectionProbe], cull_view: &Mat4) {
        if probes.is_empty() {
            return;
        }
        let mut order: Vec<&ReflectionProbe> = probes.iter().collect();
        // Stable insertion sort: ascending importance, then descending size.
        for i in 1..order.len() {
            let mut j = i;
            while j > 0 && probe_precedes(order[j], order[j - 1]) {
                order.swap(j, j - 1);
                j -= 1;
            }
        }
        let threshold = self.settings.box_culling_extent_threshold;
        for probe in order {
            let (bound, volume) = build_probe(probe, cull_view, threshold);
            self.add_bound(bound, volume);
            self.env_count += 1;
        }
    }

    /// Bounds written this frame.
    pub fn bounds(&self) -> &[LightBound] {
        &self.bounds[..self.bound_count]
    }

    /// Volumes written this frame, paired with [`bounds`](Self::bounds).
    pub fn volumes(&self) -> &[LightVolumeData] {
        &self.volumes[..self.bound_count]
    }

    /// Punctual shading payloads written this frame.
    pub fn light_data(&self) -> &[LightData] {
        &self.light_data[..self.punctual_count]
    }

    /// Directional shading payloads written this frame.
    pub fn directional(&self) -> &[DirectionalLightData] {
        &self.directional
    }

    /// Number of bounds.
    pub fn bound_count(&self) -> usize {
        self.bound_count
    }

    /// Number of punctual lights (the first bounds).
    pub fn punctual_count(&self) -> usize {
        self.punctual_count
    }

    /// Number of environment volumes.
    pub fn env_count(&self) -> usize {
        self.env_count
    }

    /// Allocated length of the bound arrays.
    pub fn capacity(&self) -> usize {
        self.bounds.len()
    }

    /// Features present this frame.
    pub fn feature_flags(&self) -> LightFeatureFlags {
        self.feature_flags
    }
}

fn probe_precedes(a: &ReflectionProbe, b: &ReflectionProbe) -> bool {
    a.importance < b.importance
        || (a.importance == b.importance
            && a.bounding_sphere_radius() > b.bounding_sphere_radius())
}

impl Lane for LightBoundsBuilder {
    fn strategy_name(&self) -> &'static str {
        match self.strategy {
            BuildStrategy::Auto => "BoundsAuto",
            BuildStrategy::Sequential => "BoundsSequential",
            BuildStrategy::Parallel => "BoundsParallel",
        }
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lucerna_core::renderer::{NoCookies, NoShadows};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    fn identity_ctx() -> BuildContext<'static> {
        BuildContext::new(&Mat4::IDENTITY, &ClusteredLightingSettings::default(), &NoShadows, &NoCookies)
    }

    #[test]
    fn point_at_origin_round_trip() {
        let light = VisibleLight::point(Vec3::ZERO, 5.0);
        let (bound, volume, data) = build_punctual(&light, 0, &identity_ctx()).unwrap();
        assert_eq!(bound.radius, 5.0);
        assert_eq!(volume.radius_sq, 25.0);
        assert_eq!(volume.volume(), Some(LightVolume::Sphere));
        assert_eq!(bound.box_axis_x, [5.0, 0.0, 0.0]);
        assert_eq!(data.light_type, gpu_light_type::POINT);
        assert_relative_eq!(data.range_attenuation_scale, 1.0 / 25.0);
        assert_eq!(data.shadow_index, -1);
        assert_eq!(data.cookie_index, -1);
    }

    #[test]
    fn culling_space_looks_down_positive_z() {
        let camera = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let ctx = BuildContext::new(&camera, &ClusteredLightingSettings::default(), &NoShadows, &NoCookies);
        let light = VisibleLight::point(Vec3::ZERO, 1.0);
        let (bound, _, _) = build_punctual(&light, 0, &ctx).unwrap();
        assert_relative_eq!(bound.center[2], 10.0, epsilon = 1e-5);
    }

    #[test]
    fn spot_bound_is_squeezed_toward_the_apex() {
        let angle = 60f32.to_radians();
        let light = VisibleLight::spot(Vec3::ZERO, Vec3::Z, 10.0, angle);
        let (bound, volume, data) = build_punctual(&light, 0, &identity_ctx()).unwrap();
        let half = 0.5 * angle;

        assert_relative_eq!(bound.center[2].abs(), 5.0, epsilon = 1e-5);
        assert_relative_eq!(Vec3::from(bound.box_axis_z).length(), 5.0, epsilon = 1e-5);
        assert_relative_eq!(Vec3::from(bound.box_axis_x).length(), half.tan() * 10.0, epsilon = 1e-4);
        assert_eq!(bound.scale_xy, 0.01);
        let alt = ((10.0 * (half.cos() - 0.5)).powi(2) + (10.0 * half.sin()).powi(2)).sqrt();
        assert_relative_eq!(bound.radius, alt.max(5.0), epsilon = 1e-5);

        assert_eq!(volume.volume(), Some(LightVolume::Cone));
        assert_relative_eq!(volume.cotan, half.cos() / half.sin(), epsilon = 1e-5);
        assert_eq!(volume.radius_sq, 100.0);
        assert_eq!(data.light_type, gpu_light_type::SPOT);
        assert!(data.angle_scale > 0.0);
    }

    #[test]
    fn hemisphere_spot_is_not_squeezed() {
        let light = VisibleLight::spot(Vec3::ZERO, Vec3::Z, 4.0, std::f32::consts::PI);
        let (bound, _, _) = build_punctual(&light, 0, &identity_ctx()).unwrap();
        assert_eq!(bound.scale_xy, 1.0);
        assert_relative_eq!(Vec3::from(bound.box_axis_x).length(), 4.0, epsilon = 1e-5);
    }

    #[test]
    fn invalid_range_is_reported_with_its_index() {
        let lights = [VisibleLight::point(Vec3::ZERO, 1.0), VisibleLight::point(Vec3::ONE, 0.0)];
        let mut builder = LightBoundsBuilder::new(&ClusteredLightingSettings::default());
        builder.new_frame(2);
        let err = builder.build_light_list(&lights, &identity_ctx()).unwrap_err();
        assert!(matches!(err, LightingError::InvalidLight { index: 1, .. }));
        assert_eq!(builder.bound_count(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "punctual builder")]
    fn area_lights_fail_loudly_in_debug() {
        let light = VisibleLight {
            kind: LightKind::Area,
            ..VisibleLight::point(Vec3::ZERO, 1.0)
        };
        let _ = build_punctual(&light, 0, &identity_ctx());
    }

    #[test]
    fn directional_lights_are_split_and_capped() {
        let settings = ClusteredLightingSettings {
            max_directional_lights: 2,
            ..Default::default()
        };
        let mut lights = vec![VisibleLight::directional(Vec3::NEG_Y); 3];
        lights.push(VisibleLight::point(Vec3::ZERO, 2.0));
        let mut shadows = HashMap::new();
        shadows.insert(1usize, 7u32);
        let ctx = BuildContext::new(&Mat4::IDENTITY, &settings, &shadows, &NoCookies);

        let mut builder = LightBoundsBuilder::new(&settings);
        builder.new_frame(lights.len());
        builder.build_light_list(&lights, &ctx).unwrap();
        assert_eq!(builder.directional().len(), 2);
        assert_eq!(builder.directional()[1].shadow_index, 7);
        assert_eq!(builder.punctual_count(), 1);
        assert!(builder
            .feature_flags()
            .contains(LightFeatureFlags::DIRECTIONAL | LightFeatureFlags::PUNCTUAL));
    }

    #[test]
    fn zero_lights_is_an_empty_result() {
        let mut builder = LightBoundsBuilder::new(&ClusteredLightingSettings::default());
        builder.new_frame(0);
        builder.build_light_list(&[], &identity_ctx()).unwrap();
        assert_eq!(builder.bound_count(), 0);
        assert!(builder.bounds().is_empty());
        assert!(builder.feature_flags().is_empty());
    }

    #[test]
    fn probes_sort_by_importance_then_size() {
        let probes = [
            ReflectionProbe::sphere(Vec3::ZERO, 1.0, 2),
            ReflectionProbe::boxed(Vec3::ZERO, Vec3::splat(1.0), 1),
            ReflectionProbe::sphere(Vec3::ZERO, 8.0, 1),
            ReflectionProbe::sphere(Vec3::ZERO, 3.0, 2),
        ];
        let mut builder = LightBoundsBuilder::new(&ClusteredLightingSettings::default());
        builder.new_frame(probes.len());
        builder.add_probes(&probes, &Mat4::IDENTITY);
        let radii: Vec<f32> = builder.bounds().iter().map(|b| b.radius).collect();
        assert_relative_eq!(radii[0], 8.0);
        assert_relative_eq!(radii[1], 3f32.sqrt(), epsilon = 1e-6);
        assert_relative_eq!(radii[2], 3.0);
        assert_relative_eq!(radii[3], 1.0);
        assert_eq!(builder.env_count(), 4);
        assert!(builder.feature_flags().contains(LightFeatureFlags::ENV));
    }

    #[test]
    fn box_probe_carries_fade_band() {
        let probe = ReflectionProbe::boxed(Vec3::new(1.0, 2.0, 3.0), Vec3::new(2.0, 1.0, 0.005), 0);
        let (bound, volume) = build_probe(&probe, &Mat4::IDENTITY, 0.01);
        assert_eq!(volume.volume(), Some(LightVolume::Box));
        assert_eq!(volume.light_category, LightCategory::Env as u32);
        assert_relative_eq!(volume.box_inner_dist[0], 1.99);
        assert_eq!(volume.box_inner_dist[2], 0.0);
        assert_relative_eq!(volume.box_inv_range[0], 100.0);
        assert_eq!(bound.center, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn growth_keeps_written_entries() {
        let mut builder = LightBoundsBuilder::new(&ClusteredLightingSettings::default());
        builder.new_frame(1);
        assert_eq!(builder.capacity(), 1);
        let ctx = identity_ctx();
        builder
            .build_light_list(&[VisibleLight::point(Vec3::X, 1.0)], &ctx)
            .unwrap();
        let first = builder.bounds()[0];
        builder.add_probes(&[ReflectionProbe::sphere(Vec3::ZERO, 2.0, 0)], &Mat4::IDENTITY);
        assert_eq!(builder.capacity(), 100);
        assert_eq!(builder.bounds()[0], first);
        assert_eq!(builder.bound_count(), 2);
    }

    fn random_lights(count: usize, seed: u64) -> Vec<VisibleLight> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let pos = Vec3::new(
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-80.0..0.0),
                );
                let range = rng.gen_range(0.5..12.0);
                match rng.gen_range(0..3) {
                    0 => VisibleLight::point(pos, range),
                    1 => {
                        let dir = Vec3::new(rng.gen_range(-1.0..1.0), -1.0, rng.gen_range(-1.0..1.0));
                        VisibleLight::spot(pos, dir.normalize(), range, rng.gen_range(0.2..3.0))
                    }
                    _ => VisibleLight::directional(Vec3::new(0.3, -1.0, 0.2).normalize()),
                }
            })
            .collect()
    }

    #[test]
    fn sequential_and_parallel_are_byte_identical() {
        let lights = random_lights(1000, 0x5eed);
        let camera = Mat4::look_at_rh(Vec3::new(3.0, 4.0, 20.0), Vec3::new(0.0, 0.0, -30.0), Vec3::Y);
        let settings = ClusteredLightingSettings {
            parallel_chunk_size: 7,
            ..Default::default()
        };
        let ctx = BuildContext::new(&camera, &settings, &NoShadows, &NoCookies);

        let run = |strategy| {
            let mut builder = LightBoundsBuilder::new(&settings).with_strategy(strategy);
            builder.new_frame(lights.len());
            builder.build_light_list(&lights, &ctx).unwrap();
            (
                bytemuck::cast_slice::<_, u8>(builder.bounds()).to_vec(),
                bytemuck::cast_slice::<_, u8>(builder.volumes()).to_vec(),
                bytemuck::cast_slice::<_, u8>(builder.light_data()).to_vec(),
            )
        };
        let sequential = run(BuildStrategy::Sequential);
        let parallel = run(BuildStrategy::Parallel);
        assert!(!sequential.0.is_empty());
        assert_eq!(sequential, parallel);
    }
}
