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

//! The lanes driven by hand on the software backend.

use lucerna_core::lane::Lane;
use lucerna_core::math::Vec3;
use lucerna_core::renderer::clustered::{ClusteredLightingSettings, VoxelRange};
use lucerna_core::renderer::{CameraView, GraphicsDevice, NoCookies, NoShadows, VisibleLight};
use lucerna_infra::SoftwareDevice;
use lucerna_lanes::light_lane::{
    BuildContext, BuildStrategy, GpuBufferPool, LightBoundsBuilder, LightCullingLane, PooledBufferId,
    ShadingResourceResolver,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn camera() -> CameraView {
    CameraView::perspective(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 1.1, 480, 272, 0.1, 80.0)
}

fn random_lights(count: usize) -> Vec<VisibleLight> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            let p = Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(-6.0..6.0), rng.gen_range(-50.0..-2.0));
            if rng.gen_bool(0.5) {
                VisibleLight::spot(p, Vec3::new(0.0, -1.0, -1.0).normalize(), rng.gen_range(1.0..4.0), 1.2)
            } else {
                VisibleLight::point(p, rng.gen_range(0.5..4.0))
            }
        })
        .collect()
}

/// Runs one frame and returns the cluster outputs.
fn cull(strategy: BuildStrategy, lights: &[VisibleLight]) -> (Vec<u32>, Vec<VoxelRange>, Vec<u32>) {
    let device = SoftwareDevice::new();
    let settings = ClusteredLightingSettings::default();
    let mut pool = GpuBufferPool::new(settings.min_pool_capacity);
    let mut lane = LightCullingLane::new(&device, &settings).unwrap();
    let mut builder = LightBoundsBuilder::new(&settings).with_strategy(strategy);
    let cam = camera();

    let ctx = BuildContext::new(&cam.view, &settings, &NoShadows, &NoCookies);
    builder.new_frame(lights.len());
    builder.build_light_list(lights, &ctx).unwrap();
    lane.on_camera_setup(&device, &mut pool, &cam, builder.bound_count()).unwrap();
    let mut encoder = device.create_command_encoder(None);
    lane.encode(&device, &pool, encoder.as_mut(), &builder).unwrap();
    device.submit_command_buffer(encoder.finish()).unwrap();

    let id = |key| pool.get(key).unwrap().id;
    let out = (
        device.read_pod::<u32>(id(PooledBufferId::CoarseLightList)).unwrap(),
        device.read_pod::<VoxelRange>(id(PooledBufferId::VoxelOffsets)).unwrap(),
        device.read_pod::<u32>(id(PooledBufferId::ClusterLightList)).unwrap(),
    );
    lane.on_shutdown(&device);
    pool.release_all(&device);
    assert_eq!(device.buffer_count(), 0);
    out
}

#[test]
fn parallel_and_sequential_bounds_cull_identically() {
    let lights = random_lights(300);
    let sequential = cull(BuildStrategy::Sequential, &lights);
    let parallel = cull(BuildStrategy::Parallel, &lights);
    assert_eq!(sequential, parallel);
    assert!(sequential.1.iter().any(|range| range.count > 0));
}

#[test]
fn pool_grows_for_the_larger_camera_only_once() {
    let device = SoftwareDevice::new();
    let settings = ClusteredLightingSettings::default();
    let mut pool = GpuBufferPool::new(settings.min_pool_capacity);
    let mut lane = LightCullingLane::new(&device, &settings).unwrap();
    let mut resolver = ShadingResourceResolver::new();
    let mut builder = LightBoundsBuilder::new(&settings);
    let lights = random_lights(40);

    let small = CameraView::perspective(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 1.0, 320, 240, 0.1, 80.0);
    let large = CameraView::perspective(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 1.0, 1280, 720, 0.1, 80.0);
    let mut frame = |cam: &CameraView| {
        let ctx = BuildContext::new(&cam.view, &settings, &NoShadows, &NoCookies);
        builder.new_frame(lights.len());
        builder.build_light_list(&lights, &ctx).unwrap();
        lane.on_camera_setup(&device, &mut pool, cam, builder.bound_count()).unwrap();
        let mut encoder = device.create_command_encoder(None);
        lane.encode(&device, &pool, encoder.as_mut(), &builder).unwrap();
        device.submit_command_buffer(encoder.finish()).unwrap();
        let setup = lane.setup().unwrap().clone();
        let published = resolver.resolve(&device, &mut pool, &builder, &setup).unwrap().clone();
        (published, pool.reallocations(), pool.capacity(PooledBufferId::CoarseLightList))
    };

    frame(&small);
    let (_, grown, coarse) = frame(&large);
    for _ in 0..3 {
        let (_, reallocations, _) = frame(&small);
        assert_eq!(reallocations, grown);
        let (published, reallocations, capacity) = frame(&large);
        assert_eq!(published.constants.num_big_tiles_x, 20);
        assert_eq!(reallocations, grown);
        assert_eq!(capacity, coarse);
    }
}
