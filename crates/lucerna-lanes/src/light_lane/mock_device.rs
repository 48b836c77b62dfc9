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

//! A bookkeeping graphics device for unit tests.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lucerna_core::renderer::{
    traits::{CommandEncoder, ComputePass},
    BindGroupDescriptor, BindGroupId, BindGroupLayoutId, BufferDescriptor, BufferId,
    CommandBufferId, ComputePassDescriptor, ComputePipelineDescriptor, ComputePipelineId,
    DeviceLimits, GraphicsBackendType, GraphicsDevice, RendererAdapterInfo, ResourceError,
    ShaderError, ShaderModuleDescriptor, ShaderModuleId,
};

/// A recorded dispatch: `(pipeline, bind group, groups x, groups y)`.
pub type RecordedDispatch = (ComputePipelineId, Option<BindGroupId>, u32, u32);

/// Produces unique ids and tracks live objects.
#[derive(Debug)]
pub struct MockGraphicsDevice {
    next_id: AtomicUsize,
    buffers: Mutex<HashMap<BufferId, Option<Vec<u8>>>>,
    bind_groups: Mutex<HashMap<BindGroupId, Vec<BufferId>>>,
    pipelines: Mutex<HashMap<ComputePipelineId, String>>,
    dispatches: Arc<Mutex<Vec<RecordedDispatch>>>,
    failing_entry_point: Option<&'static str>,
    max_buffer_size: Option<u64>,
    limits: DeviceLimits,
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            buffers: Mutex::new(HashMap::new()),
            bind_groups: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            dispatches: Arc::new(Mutex::new(Vec::new())),
            failing_entry_point: None,
            max_buffer_size: None,
            limits: DeviceLimits::default(),
        }
    }
}

impl MockGraphicsDevice {
    /// A device that refuses to create the kernel with `entry_point`.
    pub fn failing_kernel(entry_point: &'static str) -> Self {
        Self {
            failing_entry_point: Some(entry_point),
            ..Default::default()
        }
    }

    /// A device with a small dispatch limit.
    pub fn with_max_workgroups(max: u32) -> Self {
        Self {
            limits: DeviceLimits {
                max_compute_workgroups_per_dimension: max,
                ..DeviceLimits::default()
            },
            ..Default::default()
        }
    }

    /// A device that refuses buffers larger than `max` bytes.
    pub fn with_max_buffer_size(max: u64) -> Self {
        Self {
            max_buffer_size: Some(max),
            ..Default::default()
        }
    }

    fn check_size(&self, descriptor: &BufferDescriptor) -> Result<(), ResourceError> {
        match self.max_buffer_size {
            Some(max) if descriptor.size > max => Err(ResourceError::BackendError(format!(
                "buffer of {} bytes exceeds {max}",
                descriptor.size
            ))),
            _ => Ok(()),
        }
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    pub fn is_live(&self, id: BufferId) -> bool {
        self.buffers.lock().unwrap().contains_key(&id)
    }

    pub fn live_bind_groups(&self) -> usize {
        self.bind_groups.lock().unwrap().len()
    }

    pub fn live_pipelines(&self) -> usize {
        self.pipelines.lock().unwrap().len()
    }

    pub fn initial_data(&self, id: BufferId) -> Option<Vec<u8>> {
        self.buffers.lock().unwrap().get(&id).cloned().flatten()
    }

    pub fn pipeline_entry_point(&self, id: ComputePipelineId) -> Option<String> {
        self.pipelines.lock().unwrap().get(&id).cloned()
    }

    pub fn dispatches(&self) -> Vec<RecordedDispatch> {
        self.dispatches.lock().unwrap().clone()
    }
}

struct MockCommandEncoder {
    dispatches: Arc<Mutex<Vec<RecordedDispatch>>>,
}

struct MockComputePass {
    dispatches: Arc<Mutex<Vec<RecordedDispatch>>>,
    pipeline: Option<ComputePipelineId>,
    bind_group: Option<BindGroupId>,
}

impl ComputePass<'_> for MockComputePass {
    fn set_pipeline(&mut self, pipeline: ComputePipelineId) {
        self.pipeline = Some(pipeline);
    }

    fn set_bind_group(&mut self, _index: u32, bind_group: BindGroupId, _offsets: &[u32]) {
        self.bind_group = Some(bind_group);
    }

    fn dispatch_workgroups(&mut self, x: u32, y: u32, _z: u32) {
        if let Some(pipeline) = self.pipeline {
            self.dispatches
                .lock()
                .unwrap()
                .push((pipeline, self.bind_group, x, y));
        }
    }
}

impl CommandEncoder for MockCommandEncoder {
    fn begin_compute_pass<'enc>(
        &'enc mut self,
        _desc: &ComputePassDescriptor<'enc>,
    ) -> Box<dyn ComputePass<'enc> + 'enc> {
        Box::new(MockComputePass {
            dispatches: self.dispatches.clone(),
            pipeline: None,
            bind_group: None,
        })
    }

    fn copy_buffer_to_buffer(
        &mut self,
        _src: &BufferId,
        _src_off: u64,
        _dst: &BufferId,
        _dst_off: u64,
        _size: u64,
    ) {
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        CommandBufferId(0)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_shader_module(
        &self,
        _descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        Ok(ShaderModuleId(self.next()))
    }

    fn destroy_shader_module(&self, _id: ShaderModuleId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        if self.failing_entry_point == Some(descriptor.entry_point.as_ref()) {
            return Err(ShaderError::InvalidEntryPoint {
                id: descriptor.shader_module,
                entry_point: descriptor.entry_point.to_string(),
            }
            .into());
        }
        let id = ComputePipelineId(self.next() as u64);
        self.pipelines
            .lock()
            .unwrap()
            .insert(id, descriptor.entry_point.to_string());
        Ok(id)
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        self.pipelines
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn compute_pipeline_bind_group_layout(
        &self,
        _pipeline: ComputePipelineId,
        _index: u32,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        Ok(BindGroupLayoutId(self.next()))
    }

    fn create_bind_group(&self, descriptor: &BindGroupDescriptor) -> Result<BindGroupId, ResourceError> {
        let id = BindGroupId(self.next());
        let buffers = descriptor.entries.iter().map(|e| e.buffer).collect();
        self.bind_groups.lock().unwrap().insert(id, buffers);
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        self.bind_groups
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.check_size(descriptor)?;
        let id = BufferId(self.next());
        self.buffers.lock().unwrap().insert(id, None);
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        self.check_size(descriptor)?;
        let id = BufferId(self.next());
        self.buffers.lock().unwrap().insert(id, Some(data.to_vec()));
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.buffers
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn write_buffer(&self, id: BufferId, _offset: u64, _data: &[u8]) -> Result<(), ResourceError> {
        if self.buffers.lock().unwrap().contains_key(&id) {
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(MockCommandEncoder {
            dispatches: self.dispatches.clone(),
        })
    }

    fn submit_command_buffer(&self, _command_buffer: CommandBufferId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn get_adapter_info(&self) -> RendererAdapterInfo {
        RendererAdapterInfo {
            name: "Mock".to_string(),
            backend_type: GraphicsBackendType::Unknown,
        }
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }
}
