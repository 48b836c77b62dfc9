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

use crate::renderer::api::{
    BindGroupId, BufferId, CommandBufferId, ComputePassDescriptor, ComputePipelineId,
};
use std::any::Any;

/// A trait representing an active compute pass, used for recording dispatch commands.
///
/// The pass ends when the object is dropped.
pub trait ComputePass<'pass> {
    /// Sets the active compute pipeline for subsequent dispatches.
    fn set_pipeline(&mut self, pipeline: ComputePipelineId);

    /// Binds a bind group at `index`, with optional dynamic offsets.
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId, offsets: &[u32]);

    /// Records a dispatch of `x * y * z` workgroups.
    fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32);
}

/// A trait for an object that records a sequence of GPU commands.
///
/// A `CommandEncoder` is the main tool for building a [`CommandBufferId`]. It creates
/// compute passes, and can also record commands that happen outside of a
/// pass, such as buffer copies.
pub trait CommandEncoder {
    /// Begins a new compute pass.
    ///
    /// The returned pass borrows the encoder mutably, so only one pass can be
    /// active at a time.
    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor<'encoder>,
    ) -> Box<dyn ComputePass<'encoder> + 'encoder>;

    /// Records a command to copy data from one buffer to another on the GPU.
    fn copy_buffer_to_buffer(
        &mut self,
        source: &BufferId,
        source_offset: u64,
        destination: &BufferId,
        destination_offset: u64,
        size: u64,
    );

    /// Finalizes the command recording and returns a handle to the resulting command buffer.
    ///
    /// This method consumes the encoder. The returned [`CommandBufferId`] can then
    /// be submitted to the [`GraphicsDevice`](crate::renderer::GraphicsDevice)'s queue.
    fn finish(self: Box<Self>) -> CommandBufferId;

    /// Returns a mutable reference to the underlying trait object as `Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
