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

//! Provides the public, backend-agnostic contracts for the clustered lighting
//! stack.
//!
//! This module defines the "common language" for every GPU operation the
//! light culling pipeline performs: the abstract [`traits`] (like
//! [`GraphicsDevice`]), resource descriptors (like [`BufferDescriptor`]), the
//! scene-side light inputs, and the GPU data layouts shared between the CPU
//! builder, the compute kernels and the downstream shading consumer.
//!
//! The 'how' lives in `lucerna-infra`, which implements these traits for a
//! `wgpu` device and for a CPU software device.

pub mod api;
pub mod clustered;
pub mod error;
pub mod light;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{PipelineError, ResourceError, SettingsError, ShaderError};
pub use self::light::{
    CameraView, CookieLookup, LightKind, NoCookies, NoShadows, ProbeInfluence, ReflectionProbe,
    ShadowSliceLookup, VisibleLight,
};
pub use self::traits::{CommandEncoder, ComputePass, GraphicsDevice};
