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

//! Defines the ClusteredLightingAgent, the per-frame orchestrator of the lighting lanes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lucerna_core::lane::Lane;
use lucerna_core::renderer::clustered::ClusteredLightingSettings;
use lucerna_core::renderer::{
    CameraView, CookieLookup, GraphicsDevice, NoCookies, NoShadows, ReflectionProbe,
    ShadowSliceLookup, VisibleLight,
};
use lucerna_lanes::light_lane::{
    BuildContext, BuildStrategy, CullingStats, GpuBufferPool, LightBoundsBuilder, LightCullingLane,
    PublishedLighting, ShadingResourceResolver,
};
use lucerna_lanes::LightingError;

use crate::AgentError;

/// Scene inputs shared by every camera of a frame.
#[derive(Clone, Copy)]
pub struct FrameInputs<'a> {
    /// Visible lights, directional ones included.
    pub lights: &'a [VisibleLight],
    /// Reflection probes.
    pub probes: &'a [ReflectionProbe],
    /// Shadow slice lookup, keyed by light index.
    pub shadows: &'a dyn ShadowSliceLookup,
    /// Cookie slot lookup, keyed by light index.
    pub cookies: &'a dyn CookieLookup,
}

impl<'a> FrameInputs<'a> {
    /// Inputs without shadows or cookies.
    pub fn new(lights: &'a [VisibleLight], probes: &'a [ReflectionProbe]) -> Self {
        Self {
            lights,
            probes,
            shadows: &NoShadows,
            cookies: &NoCookies,
        }
    }
}

/// The result of one camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    /// Resources to bind for the camera's shading pass.
    pub lighting: PublishedLighting,
    /// What the culling lane recorded.
    pub stats: CullingStats,
    /// Set when the bounds could not be built and the camera was culled with
    /// an empty light list instead.
    pub degraded: bool,
}

/// The agent responsible for clustered light culling across cameras.
pub struct ClusteredLightingAgent {
    // Device every lane records on. Shared with the host renderer.
    device: Arc<dyn GraphicsDevice>,
    settings: ClusteredLightingSettings,
    // Persistent buffers, shared by all cameras and grown to their maximum.
    pool: GpuBufferPool,
    builder: LightBoundsBuilder,
    culling: LightCullingLane,
    resolver: ShadingResourceResolver,
    // --- Frame metrics ---
    last_frame_time: Duration,
    frame_count: u64,
    shut_down: bool,
}

impl ClusteredLightingAgent {
    /// Creates the agent and its compute kernels.
    ///
    /// # Errors
    ///
    /// Fails when the settings are invalid or a kernel cannot be created.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        settings: ClusteredLightingSettings,
    ) -> Result<Self, AgentError> {
        let culling = LightCullingLane::new(device.as_ref(), &settings)?;
        let info = device.get_adapter_info();
        log::info!(
            "ClusteredLightingAgent: Initialized on \"{}\" ({:?}), {} groups per dispatch",
            info.name,
            info.backend_type,
            culling.max_groups_per_dispatch()
        );
        Ok(Self {
            pool: GpuBufferPool::new(settings.min_pool_capacity),
            builder: LightBoundsBuilder::new(&settings),
            culling,
            resolver: ShadingResourceResolver::new(),
            device,
            settings,
            last_frame_time: Duration::ZERO,
            frame_count: 0,
            shut_down: false,
        })
    }

    /// Overrides how the bound builder schedules punctual lights.
    pub fn with_build_strategy(mut self, strategy: BuildStrategy) -> Self {
        self.builder = LightBoundsBuilder::new(&self.settings).with_strategy(strategy);
        self
    }

    /// Runs the whole lighting pipeline for every camera, in order.
    ///
    /// Each camera's commands are submitted before the next camera writes
    /// the shared buffers. The published buffers are shared too: a camera's
    /// [`CameraFrame`] stays valid until the next camera is processed, so
    /// hosts that keep several frames alive must consume them in order.
    ///
    /// # Errors
    ///
    /// Fails on an empty camera target or a device failure. Invalid lights
    /// only degrade the affected camera, see [`CameraFrame::degraded`].
    pub fn render_frame(
        &mut self,
        cameras: &[CameraView],
        inputs: &FrameInputs<'_>,
    ) -> Result<Vec<CameraFrame>, AgentError> {
        if self.shut_down {
            return Err(AgentError::ShutDown);
        }
        let start = Instant::now();
        let frames = cameras
            .iter()
            .map(|camera| self.render_camera(camera, inputs))
            .collect::<Result<Vec<_>, _>>()?;

        self.last_frame_time = start.elapsed();
        self.frame_count += 1;
        log::debug!(
            "ClusteredLightingAgent: Frame {} culled {} camera(s) in {:?}",
            self.frame_count,
            frames.len(),
            self.last_frame_time
        );
        Ok(frames)
    }

    /// Runs the pipeline for a single camera.
    pub fn render_camera(
        &mut self,
        camera: &CameraView,
        inputs: &FrameInputs<'_>,
    ) -> Result<CameraFrame, AgentError> {
        if self.shut_down {
            return Err(AgentError::ShutDown);
        }
        let device = Arc::clone(&self.device);
        let device = device.as_ref();
        let ctx = BuildContext::new(&camera.view, &self.settings, inputs.shadows, inputs.cookies);

        let degraded = match self.build_bounds(inputs, &ctx) {
            Ok(()) => false,
            Err(e @ LightingError::InvalidLight { .. }) => {
                log::warn!("ClusteredLightingAgent: Culling camera without lights: {}", e);
                self.builder.new_frame(0);
                true
            }
            Err(e) => return Err(e.into()),
        };

        self.culling
            .on_camera_setup(device, &mut self.pool, camera, self.builder.bound_count())?;
        let mut encoder = device.create_command_encoder(Some("Lucerna Light Culling"));
        let stats = self
            .culling
            .encode(device, &self.pool, encoder.as_mut(), &self.builder)?;
        device.submit_command_buffer(encoder.finish())?;

        let setup = self.culling.setup().ok_or(LightingError::CameraNotSetup)?;
        let lighting = self
            .resolver
            .resolve(device, &mut self.pool, &self.builder, setup)?
            .clone();

        Ok(CameraFrame {
            lighting,
            stats,
            degraded,
        })
    }

    fn build_bounds(&mut self, inputs: &FrameInputs<'_>, ctx: &BuildContext<'_>) -> Result<(), LightingError> {
        self.builder
            .new_frame(inputs.lights.len() + inputs.probes.len());
        self.builder.build_light_list(inputs.lights, ctx)?;
        self.builder.add_probes(inputs.probes, &ctx.cull_view);
        Ok(())
    }

    /// Releases every pooled buffer and compute kernel.
    ///
    /// Further frames fail with [`AgentError::ShutDown`]. Calling it twice is harmless.
    pub fn shutdown(&mut self) {
        if std::mem::replace(&mut self.shut_down, true) {
            return;
        }
        let device = self.device.as_ref();
        self.resolver.on_shutdown(device);
        self.culling.on_shutdown(device);
        self.builder.on_shutdown(device);
        self.pool.release_all(device);
        log::info!(
            "ClusteredLightingAgent: Shut down after {} frame(s)",
            self.frame_count
        );
    }

    /// The shared buffer pool.
    pub fn pool(&self) -> &GpuBufferPool {
        &self.pool
    }

    /// The settings the agent was created with.
    pub fn settings(&self) -> &ClusteredLightingSettings {
        &self.settings
    }

    /// The device the agent records on.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The lanes in execution order.
    pub fn lanes(&self) -> [&dyn Lane; 3] {
        [&self.builder, &self.culling, &self.resolver]
    }

    /// Wall time of the last [`render_frame`](Self::render_frame).
    pub fn last_frame_time(&self) -> Duration {
        self.last_frame_time
    }

    /// Frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Drop for ClusteredLightingAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}
