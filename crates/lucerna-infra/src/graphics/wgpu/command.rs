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

use std::any::Any;

use lucerna_core::renderer::api::{BindGroupId, BufferId, CommandBufferId, ComputePassDescriptor, ComputePipelineId};
use lucerna_core::renderer::traits::{CommandEncoder, ComputePass};

use super::device::WgpuDevice;

pub struct WgpuComputePass<'a> {
    pub(crate) pass: wgpu::ComputePass<'a>,
    pub(crate) device: &'a WgpuDevice,
}

impl<'pass> ComputePass<'pass> for WgpuComputePass<'pass> {
    fn set_pipeline(&mut self, pipeline_id: ComputePipelineId) {
        if let Some(pipeline) = self.device.get_wgpu_compute_pipeline(pipeline_id) {
            self.pass.set_pipeline(&pipeline);
        } else {
            log::warn!(
                "WgpuComputePass: ComputePipelineId {:?} not found.",
                pipeline_id
            );
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group_id: BindGroupId, offsets: &[u32]) {
        if let Some(bind_group) = self.device.get_wgpu_bind_group(bind_group_id) {
            self.pass.set_bind_group(index, bind_group.as_ref(), offsets);
        } else {
            log::warn!(
                "WgpuComputePass: BindGroupId {:?} not found.",
                bind_group_id
            );
        }
    }

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.pass.dispatch_workgroups(x, y, z);
    }
}

pub struct WgpuCommandEncoder {
    pub(crate) encoder: wgpu::CommandEncoder,
    pub(crate) device: WgpuDevice,
}

impl WgpuCommandEncoder {
    /// Provides mutable access to the underlying `wgpu::CommandEncoder`.
    pub fn wgpu_encoder_mut(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }
}

impl CommandEncoder for WgpuCommandEncoder {
    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'encoder>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        let pass = self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: descriptor.label,
            timestamp_writes: None,
        });

        Box::new(WgpuComputePass {
            pass,
            device: &self.device,
        })
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: &BufferId,
        source_offset: u64,
        destination: &BufferId,
        destination_offset: u64,
        size: u64,
    ) {
        if let (Some(source_buffer), Some(destination_buffer)) = (
            self.device.get_wgpu_buffer(*source),
            self.device.get_wgpu_buffer(*destination),
        ) {
            self.encoder.copy_buffer_to_buffer(
                &source_buffer,
                source_offset,
                &destination_buffer,
                destination_offset,
                size,
            );
        } else {
            log::warn!(
                "WgpuCommandEncoder: Copy skipped, buffer {:?} or {:?} not found.",
                source,
                destination
            );
        }
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let Self { encoder, device } = *self;
        device.register_command_buffer(encoder.finish())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
