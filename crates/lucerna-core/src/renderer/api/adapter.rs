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

//! Adapter and device information.

/// The graphics API backend an adapter runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphicsBackendType {
    /// Vulkan.
    Vulkan,
    /// Apple Metal.
    Metal,
    /// DirectX 12.
    Dx12,
    /// OpenGL / GLES.
    OpenGL,
    /// Browser WebGPU.
    WebGpu,
    /// The in-process CPU backend.
    Software,
    /// Unknown or not reported.
    #[default]
    Unknown,
}

/// Provides standardized, backend-agnostic information about a graphics adapter.
#[derive(Debug, Clone, Default)]
pub struct RendererAdapterInfo {
    /// The name of the adapter (e.g., "NVIDIA GeForce RTX 4090").
    pub name: String,
    /// The graphics API backend this adapter is associated with.
    pub backend_type: GraphicsBackendType,
}

/// Hard platform limits the culling pipeline has to respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Maximum workgroups per dispatch along one dimension.
    pub max_compute_workgroups_per_dimension: u32,
    /// Required alignment of uniform buffer binding offsets.
    pub min_uniform_buffer_offset_alignment: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_compute_workgroups_per_dimension: 65535,
            min_uniform_buffer_offset_alignment: 256,
        }
    }
}
