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

//! The clustered light culling lanes.
//!
//! A frame runs the lanes in order for every camera: the
//! [`LightBoundsBuilder`] packs bounds on the CPU, the [`LightCullingLane`]
//! records the GPU culling stages, and the [`ShadingResourceResolver`]
//! publishes the results. All three share one [`GpuBufferPool`].

pub mod bounds_builder;
pub mod buffer_pool;
pub mod culling_lane;
pub mod resolve;
pub mod shaders;

#[cfg(test)]
mod mock_device;

pub use self::bounds_builder::{build_probe, build_punctual, BuildContext, BuildStrategy, LightBoundsBuilder};
pub use self::buffer_pool::{GpuBufferPool, PooledBuffer, PooledBufferId, PooledBufferKind, DEFAULT_MIN_CAPACITY};
pub use self::culling_lane::{plan_clear, CameraSetup, ClearChunk, CullingStats, LightCullingLane};
pub use self::resolve::{shading_names, PublishedLighting, ShadingResourceResolver};
