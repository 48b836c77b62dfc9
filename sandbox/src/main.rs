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

//! Culls a random scene for two cameras and logs what each camera got.
//!
//! Usage: `sandbox [LIGHTS] [--gpu]`. Settings are read from the RON file
//! named by `LUCERNA_SETTINGS` when set.

use std::sync::Arc;

use anyhow::{Context, Result};
use lucerna_agents::{ClusteredLightingAgent, FrameInputs};
use lucerna_core::lane::Lane;
use lucerna_core::math::Vec3;
use lucerna_core::renderer::clustered::ClusteredLightingSettings;
use lucerna_core::renderer::{CameraView, GraphicsDevice, ReflectionProbe, VisibleLight};
use lucerna_infra::SoftwareDevice;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_LIGHT_COUNT: usize = 256;
const FRAMES: usize = 3;

fn load_settings() -> Result<ClusteredLightingSettings> {
    match std::env::var("LUCERNA_SETTINGS") {
        Ok(path) => {
            let source = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            Ok(ClusteredLightingSettings::from_ron_str(&source)?)
        }
        Err(_) => Ok(ClusteredLightingSettings::default()),
    }
}

fn create_device(use_gpu: bool) -> Result<Arc<dyn GraphicsDevice>> {
    if use_gpu {
        #[cfg(feature = "wgpu")]
        return Ok(Arc::new(lucerna_infra::WgpuDevice::new_headless()?));
        #[cfg(not(feature = "wgpu"))]
        log::warn!("Built without the `wgpu` feature, using the software device.");
    }
    Ok(Arc::new(SoftwareDevice::new()))
}

fn random_scene(rng: &mut StdRng, count: usize) -> (Vec<VisibleLight>, Vec<ReflectionProbe>) {
    let mut lights: Vec<VisibleLight> = (0..count)
        .map(|i| {
            let position = Vec3::new(
                rng.gen_range(-30.0..30.0),
                rng.gen_range(-5.0..15.0),
                rng.gen_range(-80.0..-2.0),
            );
            let range = rng.gen_range(1.0..8.0);
            let color = Vec3::new(rng.gen(), rng.gen(), rng.gen());
            if i % 4 == 0 {
                let forward = Vec3::new(rng.gen_range(-1.0..1.0), -1.0, rng.gen_range(-1.0..1.0)).normalize();
                VisibleLight::spot(position, forward, range, rng.gen_range(0.3..2.0)).with_color(color)
            } else {
                VisibleLight::point(position, range).with_color(color)
            }
        })
        .collect();
    lights.push(VisibleLight::directional(Vec3::new(0.3, -1.0, -0.2).normalize()));

    let probes = vec![
        ReflectionProbe::boxed(Vec3::new(0.0, 2.0, -20.0), Vec3::new(15.0, 5.0, 15.0), 0),
        ReflectionProbe::sphere(Vec3::new(10.0, 1.0, -40.0), 12.0, 1),
    ];
    (lights, probes)
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .init();

    let mut light_count = DEFAULT_LIGHT_COUNT;
    let mut use_gpu = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--gpu" => use_gpu = true,
            other => light_count = other.parse().with_context(|| format!("invalid light count `{other}`"))?,
        }
    }

    let settings = load_settings()?;
    let device = create_device(use_gpu)?;
    let mut agent = ClusteredLightingAgent::new(device, settings)?;
    let lanes: Vec<_> = agent.lanes().iter().map(|lane| lane.strategy_name()).collect();
    log::info!("Lanes: {}", lanes.join(" -> "));

    let cameras = [
        CameraView::perspective(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 2.0, -1.0), Vec3::Y, 1.0, 1920, 1080, 0.1, 150.0),
        CameraView::perspective(Vec3::new(5.0, 8.0, 5.0), Vec3::new(0.0, 0.0, -30.0), Vec3::Y, 0.8, 640, 480, 0.3, 120.0),
    ];

    let mut rng = StdRng::seed_from_u64(0x1ce);
    for frame in 0..FRAMES {
        let (lights, probes) = random_scene(&mut rng, light_count);
        let results = agent.render_frame(&cameras, &FrameInputs::new(&lights, &probes))?;
        for (index, result) in results.iter().enumerate() {
            let c = &result.lighting.constants;
            log::info!(
                "Frame {} camera {}: {} bounds ({} capped), {} directional, {}x{} big tiles, {}x{}x{} clusters, {} dispatches{}",
                frame,
                index,
                result.stats.bound_count,
                result.stats.capped_bounds,
                c.directional_light_count,
                c.num_big_tiles_x,
                c.num_big_tiles_y,
                c.num_clusters_x,
                c.num_clusters_y,
                1u32 << c.log2_num_clusters,
                result.stats.dispatches,
                if result.degraded { " (degraded)" } else { "" }
            );
        }
        log::info!("Frame {} took {:?}", frame, agent.last_frame_time());
    }

    agent.shutdown();
    Ok(())
}
