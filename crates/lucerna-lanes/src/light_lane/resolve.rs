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

//! Publication of the culling results to the shading stage.

use lucerna_core::lane::{Lane, LaneKind};
use lucerna_core::renderer::clustered::{DirectionalLightData, LightData, LightFeatureFlags, ShadingConstants};
use lucerna_core::renderer::{BufferId, GraphicsDevice, ResourceError};

use super::bounds_builder::LightBoundsBuilder;
use super::buffer_pool::{GpuBufferPool, PooledBufferId, PooledBufferKind};
use super::culling_lane::CameraSetup;
use crate::error::LightingError;

/// Names the shading stage binds the published resources under.
pub mod shading_names {
    /// `ShadingConstants` uniform block.
    pub const SHADING_CONSTANTS: &str = "_LucernaShadingConstants";
    /// Coarse per-big-tile light lists.
    pub const COARSE_LIGHT_LIST: &str = "_LucernaCoarseLightList";
    /// Compacted cluster light indices.
    pub const CLUSTER_LIGHT_LIST: &str = "_LucernaClusterLightList";
    /// Per-voxel `(offset, count)` table.
    pub const VOXEL_OFFSETS: &str = "_LucernaVoxelOffsets";
    /// Punctual light shading data.
    pub const PUNCTUAL_LIGHT_DATA: &str = "_LucernaPunctualLightData";
    /// Directional light shading data.
    pub const DIRECTIONAL_LIGHT_DATA: &str = "_LucernaDirectionalLightData";
}

const PUBLISHED: [(&str, PooledBufferId); 6] = [
    (shading_names::SHADING_CONSTANTS, PooledBufferId::ShadingConstants),
    (shading_names::COARSE_LIGHT_LIST, PooledBufferId::CoarseLightList),
    (shading_names::CLUSTER_LIGHT_LIST, PooledBufferId::ClusterLightList),
    (shading_names::VOXEL_OFFSETS, PooledBufferId::VoxelOffsets),
    (shading_names::PUNCTUAL_LIGHT_DATA, PooledBufferId::PunctualLightData),
    (shading_names::DIRECTIONAL_LIGHT_DATA, PooledBufferId::DirectionalLightData),
];

/// Read-only view of one camera's lighting resources.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedLighting {
    /// The constant block as uploaded.
    pub constants: ShadingConstants,
    /// Buffers keyed by their well-known names, in a fixed order.
    pub buffers: Vec<(&'static str, BufferId)>,
    /// Set once the cluster buffers hold this frame's results.
    pub cluster_lighting_enabled: bool,
    /// Union of the feature flags present this frame.
    pub feature_flags: LightFeatureFlags,
}

impl PublishedLighting {
    /// The buffer published under `name`.
    pub fn buffer(&self, name: &str) -> Option<BufferId> {
        self.buffers
            .iter()
            .find(|(published, _)| *published == name)
            .map(|(_, id)| *id)
    }

    /// Punctual lights in the shading arrays.
    pub fn punctual_light_count(&self) -> u32 {
        self.constants.punctual_light_count
    }

    /// Directional lights in the shading arrays.
    pub fn directional_light_count(&self) -> u32 {
        self.constants.directional_light_count
    }
}

/// Uploads the shading payloads and publishes every result buffer.
#[derive(Debug, Default)]
pub struct ShadingResourceResolver {
    published: Option<PublishedLighting>,
}

impl ShadingResourceResolver {
    /// Creates a resolver with nothing published.
    pub fn new() -> Self {
        Self::default()
    }

    /// Packs this frame's light data and publishes the camera's resources.
    ///
    /// Runs after [`LightCullingLane::encode`](super::LightCullingLane::encode),
    /// which uploads the constants that `setup` describes.
    pub fn resolve(
        &mut self,
        device: &dyn GraphicsDevice,
        pool: &mut GpuBufferPool,
        builder: &LightBoundsBuilder,
        setup: &CameraSetup,
    ) -> Result<&PublishedLighting, LightingError> {
        let punctual = &builder.light_data()[..setup.constants.punctual_light_count as usize];
        let directional = builder.directional();

        let storage = PooledBufferKind::Storage;
        let light_data = pool
            .acquire(device, PooledBufferId::PunctualLightData, punctual.len(), size_of::<LightData>(), storage)?
            .id;
        if !punctual.is_empty() {
            device.write_buffer(light_data, 0, bytemuck::cast_slice(punctual))?;
        }
        let directional_data = pool
            .acquire(
                device,
                PooledBufferId::DirectionalLightData,
                directional.len(),
                size_of::<DirectionalLightData>(),
                storage,
            )?
            .id;
        if !directional.is_empty() {
            device.write_buffer(directional_data, 0, bytemuck::cast_slice(directional))?;
        }

        let buffers = PUBLISHED
            .iter()
            .map(|&(name, key)| {
                pool.get(key)
                    .map(|b| (name, b.id))
                    .ok_or(LightingError::Resource(ResourceError::NotFound))
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "ShadingResourceResolver: Published {} punctual and {} directional lights",
            punctual.len(),
            directional.len()
        );
        Ok(self.published.insert(PublishedLighting {
            constants: setup.constants,
            buffers,
            cluster_lighting_enabled: true,
            feature_flags: builder.feature_flags(),
        }))
    }

    /// The last published resources.
    pub fn published(&self) -> Option<&PublishedLighting> {
        self.published.as_ref()
    }

    /// Forgets the published view, e.g. after the pool was released.
    pub fn clear(&mut self) {
        self.published = None;
    }
}

impl Lane for ShadingResourceResolver {
    fn strategy_name(&self) -> &'static str {
        "ShadingResourceResolve"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Resolve
    }

    fn on_shutdown(&mut self, _device: &dyn GraphicsDevice) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light_lane::bounds_builder::BuildContext;
    use crate::light_lane::culling_lane::LightCullingLane;
    use crate::light_lane::mock_device::MockGraphicsDevice;
    use lucerna_core::math::Vec3;
    use lucerna_core::renderer::clustered::ClusteredLightingSettings;
    use lucerna_core::renderer::{CameraView, NoCookies, NoShadows, VisibleLight};

    #[test]
    fn publishes_every_buffer_under_its_name() {
        let device = MockGraphicsDevice::default();
        let mut pool = GpuBufferPool::default();
        let settings = ClusteredLightingSettings::default();
        let mut lane = LightCullingLane::new(&device, &settings).unwrap();
        let camera = CameraView::perspective(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 1.0, 320, 240, 0.1, 50.0);
        let lights = [
            VisibleLight::point(Vec3::new(0.0, 0.0, -5.0), 2.0),
            VisibleLight::directional(Vec3::new(0.0, -1.0, 0.0)),
        ];

        let mut builder = LightBoundsBuilder::new(&settings);
        builder.new_frame(lights.len());
        let ctx = BuildContext::new(&camera.view, &settings, &NoShadows, &NoCookies);
        builder.build_light_list(&lights, &ctx).unwrap();

        lane.on_camera_setup(&device, &mut pool, &camera, builder.bound_count()).unwrap();
        let mut encoder = device.create_command_encoder(None);
        lane.encode(&device, &pool, encoder.as_mut(), &builder).unwrap();

        let mut resolver = ShadingResourceResolver::new();
        let setup = lane.setup().unwrap().clone();
        let published = resolver.resolve(&device, &mut pool, &builder, &setup).unwrap().clone();

        assert!(published.cluster_lighting_enabled);
        assert_eq!(published.punctual_light_count(), 1);
        assert_eq!(published.directional_light_count(), 1);
        assert_eq!(published.buffers.len(), 6);
        assert_eq!(
            published.buffer(shading_names::VOXEL_OFFSETS),
            pool.get(PooledBufferId::VoxelOffsets).map(|b| b.id)
        );
        assert!(published.feature_flags.contains(LightFeatureFlags::PUNCTUAL));
        assert!(published.buffer("_Unknown").is_none());
        assert_eq!(resolver.published(), Some(&published));

        resolver.on_shutdown(&device);
        assert!(resolver.published().is_none());
    }
}
