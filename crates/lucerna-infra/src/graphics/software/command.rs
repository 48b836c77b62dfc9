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

use super::device::SoftwareDevice;

/// A command recorded for later execution on submit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SoftwareCommand {
    Dispatch {
        pipeline: ComputePipelineId,
        bind_group: BindGroupId,
        groups: [u32; 3],
    },
    CopyBuffer {
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    },
}

pub struct SoftwareComputePass<'a> {
    commands: &'a mut Vec<SoftwareCommand>,
    pipeline: Option<ComputePipelineId>,
    bind_group: Option<BindGroupId>,
}

impl<'pass> ComputePass<'pass> for SoftwareComputePass<'pass> {
    fn set_pipeline(&mut self, pipeline: ComputePipelineId) {
        self.pipeline = Some(pipeline);
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId, offsets: &[u32]) {
        if index != 0 || !offsets.is_empty() {
            log::warn!(
                "SoftwareComputePass: Only group 0 without dynamic offsets is supported (got group {}, {} offsets).",
                index,
                offsets.len()
            );
            return;
        }
        self.bind_group = Some(bind_group);
    }

    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        match (self.pipeline, self.bind_group) {
            (Some(pipeline), Some(bind_group)) => self.commands.push(SoftwareCommand::Dispatch {
                pipeline,
                bind_group,
                groups: [x, y, z],
            }),
            _ => log::warn!("SoftwareComputePass: Dispatch without a pipeline and bind group, skipped."),
        }
    }
}

pub struct SoftwareCommandEncoder {
    pub(crate) commands: Vec<SoftwareCommand>,
    pub(crate) device: SoftwareDevice,
}

impl CommandEncoder for SoftwareCommandEncoder {
    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        _descriptor: &ComputePassDescriptor<'encoder>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder> {
        Box::new(SoftwareComputePass {
            commands: &mut self.commands,
            pipeline: None,
            bind_group: None,
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
        self.commands.push(SoftwareCommand::CopyBuffer {
            source: *source,
            source_offset,
            destination: *destination,
            destination_offset,
            size,
        });
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let Self { commands, device } = *self;
        device.register_command_buffer(commands)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
