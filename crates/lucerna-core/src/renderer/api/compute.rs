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

//! Defines data structures for compute pipelines.
//!
//! Every stage of the light culling pipeline is a compute kernel addressed by
//! its WGSL entry point.

use std::borrow::Cow;

use crate::renderer::api::shader::ShaderModuleId;

/// An opaque handle to a compiled compute pipeline state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputePipelineId(pub u64);

/// A descriptor used to create a [`ComputePipelineId`].
///
/// The pipeline layout is always derived from the shader, so bind groups
/// are created against [`GraphicsDevice::compute_pipeline_bind_group_layout`](crate::renderer::GraphicsDevice::compute_pipeline_bind_group_layout).
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    /// An optional debug label for the compute pipeline.
    pub label: Option<Cow<'a, str>>,
    /// The compiled compute shader module.
    pub shader_module: ShaderModuleId,
    /// The name of the entry point function in the compute shader.
    pub entry_point: Cow<'a, str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_pipeline_id_ordering() {
        let id1 = ComputePipelineId(1);
        let id2 = ComputePipelineId(2);
        assert!(id1 < id2);
        assert_eq!(id1, ComputePipelineId(1));
    }

    #[test]
    fn compute_pipeline_descriptor_creation() {
        let descriptor = ComputePipelineDescriptor {
            label: Some(Cow::Borrowed("coarse_cull")),
            shader_module: ShaderModuleId(42),
            entry_point: Cow::Borrowed("coarse_cull"),
        };

        assert_eq!(descriptor.label.as_deref(), Some("coarse_cull"));
        assert_eq!(descriptor.shader_module, ShaderModuleId(42));
        assert_eq!(descriptor.entry_point, "coarse_cull");
    }
}
