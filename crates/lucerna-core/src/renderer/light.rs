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

//! Scene-side inputs consumed by the clustered lighting stack.
//!
//! These are produced upstream (scene culling, camera and probe systems)
//! and treated as immutable for the duration of a frame.

use crate::math::{Mat4, Vec3};
use std::collections::HashMap;

/// The source kind of a visible light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Infinitely distant light. Never culled, shaded through its own array.
    Directional,
    /// Omnidirectional light with a finite range.
    Point,
    /// Cone-shaped light with a finite range.
    Spot,
    /// Area emitters. The culling pipeline has no bound for them; they are
    /// treated as points outside debug builds.
    Area,
}

/// A light that survived upstream visibility culling for the current camera.
///
/// # Examples
///
/// ```
/// use lucerna_core::math::Vec3;
/// use lucerna_core::renderer::light::{LightKind, VisibleLight};
///
/// let lamp = VisibleLight::point(Vec3::new(0.0, 2.0, -5.0), 10.0);
/// assert_eq!(lamp.kind, LightKind::Point);
/// assert_eq!(lamp.range, 10.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleLight {
    /// Source kind.
    pub kind: LightKind,
    /// World-space position.
    pub position: Vec3,
    /// World-space right axis of the light's basis.
    pub right: Vec3,
    /// World-space up axis of the light's basis.
    pub up: Vec3,
    /// World-space forward axis. Spot lights shine along it.
    pub forward: Vec3,
    /// Influence range in world units.
    pub range: f32,
    /// Linear RGB color, premultiplied by intensity.
    pub color: Vec3,
    /// Full outer cone angle of a spot light, in radians.
    pub spot_angle: f32,
    /// Full inner cone angle of a spot light, in radians.
    pub inner_spot_angle: f32,
    /// Rendering-layer mask matched against receivers.
    pub rendering_layers: u32,
    /// Angular diameter of a directional light, in radians.
    pub angular_diameter: f32,
    /// Emitter radius of a punctual light.
    pub shape_radius: f32,
}

impl VisibleLight {
    /// A white point light with an identity basis.
    pub fn point(position: Vec3, range: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            range,
            ..Self::default()
        }
    }

    /// A white spot light shining along `forward`.
    ///
    /// `spot_angle` is the full outer cone angle in radians.
    pub fn spot(position: Vec3, forward: Vec3, range: f32, spot_angle: f32) -> Self {
        let forward = forward.normalize_or(Vec3::NEG_Z);
        let (right, up) = orthonormal_basis(forward);
        Self {
            kind: LightKind::Spot,
            position,
            right,
            up,
            forward,
            range,
            spot_angle,
            inner_spot_angle: spot_angle * 0.8,
            ..Self::default()
        }
    }

    /// A white directional light shining along `forward`.
    pub fn directional(forward: Vec3) -> Self {
        let forward = forward.normalize_or(Vec3::NEG_Y);
        let (right, up) = orthonormal_basis(forward);
        Self {
            kind: LightKind::Directional,
            right,
            up,
            forward,
            range: f32::MAX,
            ..Self::default()
        }
    }

    /// Returns a copy with the given color.
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }
}

impl Default for VisibleLight {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            position: Vec3::ZERO,
            right: Vec3::X,
            up: Vec3::Y,
            forward: Vec3::Z,
            range: 10.0,
            color: Vec3::ONE,
            spot_angle: 30.0_f32.to_radians(),
            inner_spot_angle: 24.0_f32.to_radians(),
            rendering_layers: u32::MAX,
            angular_diameter: 0.53_f32.to_radians(),
            shape_radius: 0.0,
        }
    }
}

/// Builds a right/up pair perpendicular to `forward`.
fn orthonormal_basis(forward: Vec3) -> (Vec3, Vec3) {
    let reference = if forward.y.abs() < 0.99 { Vec3::Y } else { Vec3::X };
    let right = reference.cross(forward).normalize();
    let up = forward.cross(right);
    (right, up)
}

/// Influence shape of a reflection probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeInfluence {
    /// Oriented box with the given half-extents.
    Box {
        /// Half-extents along the probe's right/up/forward axes.
        extents: Vec3,
    },
    /// Sphere of the given radius.
    Sphere {
        /// Influence radius.
        radius: f32,
    },
}

/// A reflection probe contributing to the environment light category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionProbe {
    /// World-space center of the influence volume.
    pub position: Vec3,
    /// World-space right axis.
    pub right: Vec3,
    /// World-space up axis.
    pub up: Vec3,
    /// World-space forward axis.
    pub forward: Vec3,
    /// Influence volume.
    pub influence: ProbeInfluence,
    /// Lower importance is drawn first.
    pub importance: i32,
}

impl ReflectionProbe {
    /// An axis-aligned box probe.
    pub fn boxed(position: Vec3, extents: Vec3, importance: i32) -> Self {
        Self {
            position,
            right: Vec3::X,
            up: Vec3::Y,
            forward: Vec3::Z,
            influence: ProbeInfluence::Box { extents },
            importance,
        }
    }

    /// A sphere probe.
    pub fn sphere(position: Vec3, radius: f32, importance: i32) -> Self {
        Self {
            position,
            right: Vec3::X,
            up: Vec3::Y,
            forward: Vec3::Z,
            influence: ProbeInfluence::Sphere { radius },
            importance,
        }
    }

    /// Half-extents of the bounding box of the influence volume.
    pub fn extents(&self) -> Vec3 {
        match self.influence {
            ProbeInfluence::Box { extents } => extents,
            ProbeInfluence::Sphere { radius } => Vec3::splat(radius),
        }
    }

    /// Radius of the sphere enclosing the influence volume.
    pub fn bounding_sphere_radius(&self) -> f32 {
        match self.influence {
            ProbeInfluence::Box { extents } => extents.length(),
            ProbeInfluence::Sphere { radius } => radius,
        }
    }
}

/// Camera parameters for one view.
///
/// `view` is a right-handed world-to-view matrix looking down -Z (as built by
/// [`Mat4::look_at_rh`]), and `projection` maps that view space to clip space
/// with depth in `[0, 1]` (as built by [`Mat4::perspective_rh`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix.
    pub projection: Mat4,
    /// Render target width in pixels, before dynamic resolution.
    pub width: u32,
    /// Render target height in pixels, before dynamic resolution.
    pub height: u32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Whether `projection` is orthographic.
    pub is_orthographic: bool,
    /// Dynamic resolution scale applied to the target size.
    pub dynamic_resolution_scale: f32,
}

impl CameraView {
    /// A perspective camera at `eye` looking at `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn perspective(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y: f32,
        width: u32,
        height: u32,
        near: f32,
        far: f32,
    ) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            projection: Mat4::perspective_rh(fov_y, aspect, near, far),
            width,
            height,
            near,
            far,
            is_orthographic: false,
            dynamic_resolution_scale: 1.0,
        }
    }

    /// An orthographic camera at `eye` looking at `target`, covering
    /// `half_height` world units above and below the view axis.
    #[allow(clippy::too_many_arguments)]
    pub fn orthographic(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        half_height: f32,
        width: u32,
        height: u32,
        near: f32,
        far: f32,
    ) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let half_width = half_height * aspect;
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            projection: Mat4::orthographic_rh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                near,
                far,
            ),
            width,
            height,
            near,
            far,
            is_orthographic: true,
            dynamic_resolution_scale: 1.0,
        }
    }

    /// The effective target size after dynamic resolution scaling.
    pub fn target_size(&self) -> (u32, u32) {
        let scale = self.dynamic_resolution_scale.clamp(0.0, 1.0);
        if scale >= 1.0 {
            return (self.width, self.height);
        }
        (
            ((self.width as f32 * scale).ceil() as u32).max(1),
            ((self.height as f32 * scale).ceil() as u32).max(1),
        )
    }
}

/// Resolves the shadow-map slice of a light, by visible-light index.
pub trait ShadowSliceLookup: Sync {
    /// Returns the slice index, or `None` when the light casts no shadow.
    fn shadow_slice(&self, light_index: usize) -> Option<u32>;
}

/// Resolves the cookie texture slot of a light, by visible-light index.
pub trait CookieLookup: Sync {
    /// Returns the cookie index, or `None` when the light has no cookie.
    fn cookie_index(&self, light_index: usize) -> Option<u32>;
}

/// A lookup that reports no shadows.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShadows;

impl ShadowSliceLookup for NoShadows {
    fn shadow_slice(&self, _light_index: usize) -> Option<u32> {
        None
    }
}

/// A lookup that reports no cookies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCookies;

impl CookieLookup for NoCookies {
    fn cookie_index(&self, _light_index: usize) -> Option<u32> {
        None
    }
}

impl ShadowSliceLookup for HashMap<usize, u32> {
    fn shadow_slice(&self, light_index: usize) -> Option<u32> {
        self.get(&light_index).copied()
    }
}

impl CookieLookup for HashMap<usize, u32> {
    fn cookie_index(&self, light_index: usize) -> Option<u32> {
        self.get(&light_index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn spot_basis_is_orthonormal() {
        let spot = VisibleLight::spot(Vec3::ZERO, Vec3::new(1.0, -1.0, 0.0), 8.0, 0.6);
        assert_relative_eq!(spot.forward.length(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(spot.right.dot(spot.forward), 0.0, epsilon = 1e-6);
        assert_relative_eq!(spot.up.dot(spot.forward), 0.0, epsilon = 1e-6);
        assert_relative_eq!(spot.right.dot(spot.up), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn probe_bounding_sphere() {
        let probe = ReflectionProbe::boxed(Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0), 0);
        assert_relative_eq!(probe.bounding_sphere_radius(), 5.0);
        let sphere = ReflectionProbe::sphere(Vec3::ZERO, 2.5, 0);
        assert_eq!(sphere.extents(), Vec3::splat(2.5));
    }

    #[test]
    fn dynamic_resolution_scales_target() {
        let mut camera = CameraView::perspective(
            Vec3::ZERO,
            Vec3::NEG_Z,
            Vec3::Y,
            1.0,
            1920,
            1080,
            0.1,
            100.0,
        );
        assert_eq!(camera.target_size(), (1920, 1080));
        camera.dynamic_resolution_scale = 0.5;
        assert_eq!(camera.target_size(), (960, 540));
    }

    #[test]
    fn hash_map_lookups() {
        let mut shadows = HashMap::new();
        shadows.insert(3usize, 7u32);
        assert_eq!(shadows.shadow_slice(3), Some(7));
        assert_eq!(shadows.shadow_slice(4), None);
        assert_eq!(NoCookies.cookie_index(0), None);
    }
}
