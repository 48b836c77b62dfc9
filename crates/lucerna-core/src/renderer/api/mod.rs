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

//! Resource descriptors and opaque handles used by the GPU contracts.

pub mod adapter;
pub mod bind_group;
pub mod buffer;
pub mod command;
pub mod compute;
pub mod shader;

pub use self::adapter::{DeviceLimits, GraphicsBackendType, RendererAdapterInfo};
pub use self::bind_group::{BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId};
pub use self::buffer::{BufferDescriptor, BufferId, BufferUsage};
pub use self::command::{CommandBufferId, ComputePassDescriptor};
pub use self::compute::{ComputePipelineDescriptor, ComputePipelineId};
pub use self::shader::{ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData};
