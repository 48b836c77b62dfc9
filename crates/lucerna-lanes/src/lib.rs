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

//! Hot-path lanes of the clustered light culling stack.
//!
//! - [`light_lane::GpuBufferPool`] keeps the persistent, grow-only GPU buffers
//!   shared by every camera.
//! - [`light_lane::LightBoundsBuilder`] turns visible lights and reflection
//!   probes into paired bounds and volumes, in parallel.
//! - [`light_lane::LightCullingLane`] records the compute pipeline
//!   (clear, screen-space AABB, coarse culling, cluster culling).
//! - [`light_lane::ShadingResourceResolver`] publishes the results to the
//!   shading consumer.

#![warn(missing_docs)]

pub mod error;
pub mod light_lane;

pub use error::LightingError;
