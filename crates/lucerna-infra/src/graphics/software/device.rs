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

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytemuck::Pod;
use lucerna_core::renderer::api::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutId, BufferDescriptor, BufferId,
    BufferUsage, CommandBufferId, ComputePipelineDescriptor, ComputePipelineId, DeviceLimits,
    GraphicsBackendType, RendererAdapterInfo, ShaderModuleDescriptor, ShaderModuleId,
    ShaderSourceData,
};
use lucerna_core::renderer::traits::CommandEncoder;
use lucerna_core::renderer::{GraphicsDevice, PipelineError, ResourceError, ShaderError};

use super::command::{SoftwareCommand, SoftwareCommandEncoder};
use super::kernels::{BoundResources, SoftwareKernel};
use crate::graphics::declares_entry_point;

#[derive(Debug)]
struct SoftwareBufferEntry {
    words: Vec<u32>,
    size: u64,
    usage: BufferUsage,
}

#[derive(Debug)]
struct SoftwarePipelineEntry {
    kernel: SoftwareKernel,
    module: ShaderModuleId,
}

#[derive(Debug)]
struct SoftwareBindGroupEntry {
    kernel: SoftwareKernel,
    entries: Vec<BindGroupEntry>,
}

/// The internal state of the [`SoftwareDevice`].
#[derive(Debug)]
pub struct SoftwareDeviceInternal {
    shader_modules: Mutex<HashMap<ShaderModuleId, String>>,
    pipelines: Mutex<HashMap<ComputePipelineId, SoftwarePipelineEntry>>,
    layouts: Mutex<HashMap<BindGroupLayoutId, SoftwareKernel>>,
    bind_groups: Mutex<HashMap<BindGroupId, SoftwareBindGroupEntry>>,
    buffers: Mutex<HashMap<BufferId, SoftwareBufferEntry>>,
    pending_command_buffers: Mutex<HashMap<CommandBufferId, Vec<SoftwareCommand>>>,

    next_id: AtomicUsize,
    command_buffer_id_counter: AtomicU64,
    dispatch_counter: AtomicU64,
    allocated_bytes: AtomicUsize,

    limits: DeviceLimits,
}

/// A clonable handle to the CPU compute device.
#[derive(Clone, Debug)]
pub struct SoftwareDevice {
    internal: Arc<SoftwareDeviceInternal>,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

/// The word range of `entry` inside a buffer of `len_words` words.
fn word_range(entry: &BindGroupEntry, len_words: usize) -> Result<Range<usize>, ResourceError> {
    let size = entry.size.unwrap_or((len_words as u64 * 4).saturating_sub(entry.offset));
    if entry.offset % 4 != 0 || size % 4 != 0 {
        return Err(ResourceError::BackendError(format!(
            "binding {} is not word aligned (offset {}, size {})",
            entry.binding, entry.offset, size
        )));
    }
    let start = (entry.offset / 4) as usize;
    let end = start + (size / 4) as usize;
    if end > len_words {
        return Err(ResourceError::OutOfBounds);
    }
    Ok(start..end)
}

impl SoftwareDevice {
    /// A device with the default limits.
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    /// A device reporting `limits`. Dispatches beyond them are rejected.
    pub fn with_limits(limits: DeviceLimits) -> Self {
        log::info!(
            "SoftwareDevice: Created ({} workgroups per dimension)",
            limits.max_compute_workgroups_per_dimension
        );
        Self {
            internal: Arc::new(SoftwareDeviceInternal {
                shader_modules: Mutex::new(HashMap::new()),
                pipelines: Mutex::new(HashMap::new()),
                layouts: Mutex::new(HashMap::new()),
                bind_groups: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                pending_command_buffers: Mutex::new(HashMap::new()),
                next_id: AtomicUsize::new(0),
                command_buffer_id_counter: AtomicU64::new(0),
                dispatch_counter: AtomicU64::new(0),
                allocated_bytes: AtomicUsize::new(0),
                limits,
            }),
        }
    }

    fn generate_id(&self) -> usize {
        self.internal.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Copies the whole contents of a buffer.
    pub fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>, ResourceError> {
        let buffers = lock(&self.internal.buffers, "buffers")?;
        let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
        let bytes: &[u8] = bytemuck::cast_slice(&entry.words);
        Ok(bytes[..entry.size as usize].to_vec())
    }

    /// Reads a buffer as an array of `T`, dropping a trailing partial element.
    pub fn read_pod<T: Pod>(&self, id: BufferId) -> Result<Vec<T>, ResourceError> {
        let bytes = self.read_buffer(id)?;
        Ok(bytes
            .chunks_exact(size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Total dispatches executed so far.
    pub fn dispatch_count(&self) -> u64 {
        self.internal.dispatch_counter.load(Ordering::Relaxed)
    }

    /// Live buffers.
    pub fn buffer_count(&self) -> usize {
        self.internal.buffers.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Bytes held by live buffers.
    pub fn allocated_bytes(&self) -> usize {
        self.internal.allocated_bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn register_command_buffer(&self, commands: Vec<SoftwareCommand>) -> CommandBufferId {
        let id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        match self.internal.pending_command_buffers.lock() {
            Ok(mut pending) => {
                pending.insert(id, commands);
            }
            Err(e) => log::error!("SoftwareDevice: Dropping command buffer, mutex poisoned: {}", e),
        }
        id
    }

    fn insert_buffer(&self, descriptor: &BufferDescriptor, words: Vec<u32>) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.generate_id());
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            SoftwareBufferEntry {
                words,
                size: descriptor.size,
                usage: descriptor.usage,
            },
        );
        self.internal
            .allocated_bytes
            .fetch_add(descriptor.size as usize, Ordering::Relaxed);
        log::debug!(
            "SoftwareDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn execute(&self, command: &SoftwareCommand) -> Result<(), ResourceError> {
        match *command {
            SoftwareCommand::Dispatch {
                pipeline,
                bind_group,
                groups,
            } => self.execute_dispatch(pipeline, bind_group, groups),
            SoftwareCommand::CopyBuffer {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
            } => {
                let mut buffers = lock(&self.internal.buffers, "buffers")?;
                let src = buffers.get(&source).ok_or(ResourceError::NotFound)?;
                let src_bytes: &[u8] = bytemuck::cast_slice(&src.words);
                let range = source_offset as usize..(source_offset + size) as usize;
                let data = src_bytes.get(range).ok_or(ResourceError::OutOfBounds)?.to_vec();
                let dst = buffers.get_mut(&destination).ok_or(ResourceError::NotFound)?;
                let dst_bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut dst.words);
                dst_bytes
                    .get_mut(destination_offset as usize..destination_offset as usize + data.len())
                    .ok_or(ResourceError::OutOfBounds)?
                    .copy_from_slice(&data);
                Ok(())
            }
        }
    }

    fn execute_dispatch(
        &self,
        pipeline: ComputePipelineId,
        bind_group: BindGroupId,
        groups: [u32; 3],
    ) -> Result<(), ResourceError> {
        let max = self.internal.limits.max_compute_workgroups_per_dimension;
        if groups.iter().any(|&g| g > max) {
            return Err(ResourceError::BackendError(format!(
                "dispatch of {groups:?} workgroups exceeds the limit of {max}"
            )));
        }
        let kernel = lock(&self.internal.pipelines, "pipelines")?
            .get(&pipeline)
            .map(|p| p.kernel)
            .ok_or(PipelineError::InvalidComputePipeline { id: pipeline })?;
        let entries = {
            let bind_groups = lock(&self.internal.bind_groups, "bind_groups")?;
            let group = bind_groups.get(&bind_group).ok_or(ResourceError::InvalidHandle)?;
            if group.kernel != kernel {
                return Err(PipelineError::BindGroupMismatch(format!(
                    "bind group {bind_group:?} was created for another kernel"
                ))
                .into());
            }
            group.entries.clone()
        };
        if groups.contains(&0) {
            return Ok(());
        }

        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        let writable = kernel.writable_bindings();

        let mut taken: Vec<(BufferId, u32, Range<usize>, SoftwareBufferEntry)> = Vec::new();
        for entry in entries.iter().filter(|e| writable.contains(&e.binding)) {
            let Some(buffer) = buffers.remove(&entry.buffer) else {
                let aliased = taken.iter().any(|(id, ..)| *id == entry.buffer);
                for (id, _, _, buffer) in taken {
                    buffers.insert(id, buffer);
                }
                return Err(if aliased {
                    ResourceError::BackendError(format!("buffer {:?} is bound for writing twice", entry.buffer))
                } else {
                    ResourceError::NotFound
                });
            };
            let range = match word_range(entry, buffer.words.len()) {
                Ok(range) => range,
                Err(e) => {
                    buffers.insert(entry.buffer, buffer);
                    for (id, _, _, buffer) in taken {
                        buffers.insert(id, buffer);
                    }
                    return Err(e);
                }
            };
            taken.push((entry.buffer, entry.binding, range, buffer));
        }

        let result = (|| {
            let mut bound = BoundResources::default();
            for entry in entries.iter().filter(|e| !writable.contains(&e.binding)) {
                let buffer = buffers.get(&entry.buffer).ok_or_else(|| {
                    ResourceError::BackendError(format!(
                        "buffer {:?} is bound for reading and writing",
                        entry.buffer
                    ))
                })?;
                let range = word_range(entry, buffer.words.len())?;
                bound.read.insert(entry.binding, &buffer.words[range]);
            }
            for (_, binding, range, buffer) in taken.iter_mut() {
                bound.write.insert(*binding, &mut buffer.words[range.clone()]);
            }
            kernel.run(groups, &mut bound)
        })();

        for (id, _, _, buffer) in taken {
            buffers.insert(id, buffer);
        }
        if result.is_ok() {
            self.internal.dispatch_counter.fetch_add(1, Ordering::Relaxed);
            log::trace!("SoftwareDevice: Ran {:?} over {:?} workgroups", kernel, groups);
        }
        result
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let ShaderSourceData::Wgsl(source) = &descriptor.source;
        let id = ShaderModuleId(self.generate_id());
        lock(&self.internal.shader_modules, "shader_modules")?.insert(id, source.to_string());
        log::debug!(
            "SoftwareDevice: Created shader module '{}' with ID: {:?}",
            descriptor.label.unwrap_or_default(),
            id
        );
        Ok(id)
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        match lock(&self.internal.shader_modules, "shader_modules")?.remove(&id) {
            Some(_) => Ok(()),
            None => Err(ShaderError::NotFound { id }.into()),
        }
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let module = descriptor.shader_module;
        let entry_point = descriptor.entry_point.as_ref();
        let declared = {
            let modules = lock(&self.internal.shader_modules, "shader_modules")?;
            let source = modules.get(&module).ok_or_else(|| {
                PipelineError::InvalidShaderModuleForPipeline {
                    id: module,
                    pipeline_label: descriptor.label.as_deref().map(str::to_string),
                }
            })?;
            declares_entry_point(source, entry_point)
        };
        let kernel = SoftwareKernel::from_entry_point(entry_point)
            .filter(|_| declared)
            .ok_or_else(|| ShaderError::InvalidEntryPoint {
                id: module,
                entry_point: entry_point.to_string(),
            })?;

        let id = ComputePipelineId(self.generate_id() as u64);
        lock(&self.internal.pipelines, "pipelines")?.insert(id, SoftwarePipelineEntry { kernel, module });
        log::debug!("SoftwareDevice: Created compute pipeline '{}' with ID: {:?}", entry_point, id);
        Ok(id)
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        match lock(&self.internal.pipelines, "pipelines")?.remove(&id) {
            Some(entry) => {
                log::debug!("SoftwareDevice: Destroyed pipeline {:?} (module {:?})", id, entry.module);
                Ok(())
            }
            None => Err(PipelineError::InvalidComputePipeline { id }.into()),
        }
    }

    fn compute_pipeline_bind_group_layout(
        &self,
        pipeline: ComputePipelineId,
        index: u32,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        if index != 0 {
            return Err(PipelineError::BindGroupMismatch(format!("kernels only declare group 0, not {index}")).into());
        }
        let kernel = lock(&self.internal.pipelines, "pipelines")?
            .get(&pipeline)
            .map(|p| p.kernel)
            .ok_or(PipelineError::InvalidComputePipeline { id: pipeline })?;
        let id = BindGroupLayoutId(self.generate_id());
        lock(&self.internal.layouts, "layouts")?.insert(id, kernel);
        Ok(id)
    }

    fn create_bind_group(&self, descriptor: &BindGroupDescriptor) -> Result<BindGroupId, ResourceError> {
        let kernel = lock(&self.internal.layouts, "layouts")?
            .get(&descriptor.layout)
            .copied()
            .ok_or(ResourceError::InvalidHandle)?;

        let expected = kernel.bindings();
        let mut bound: Vec<u32> = descriptor.entries.iter().map(|e| e.binding).collect();
        bound.sort_unstable();
        let mut wanted = expected.to_vec();
        wanted.sort_unstable();
        if bound != wanted {
            return Err(PipelineError::BindGroupMismatch(format!(
                "{kernel:?} expects bindings {wanted:?}, got {bound:?}"
            ))
            .into());
        }

        let buffers = lock(&self.internal.buffers, "buffers")?;
        let alignment = self.internal.limits.min_uniform_buffer_offset_alignment as u64;
        for entry in descriptor.entries {
            let buffer = buffers.get(&entry.buffer).ok_or(ResourceError::NotFound)?;
            if buffer.usage.contains(BufferUsage::UNIFORM) && entry.offset % alignment != 0 {
                return Err(PipelineError::BindGroupMismatch(format!(
                    "uniform binding {} offset {} is not {}-byte aligned",
                    entry.binding, entry.offset, alignment
                ))
                .into());
            }
            word_range(entry, buffer.words.len())?;
        }
        drop(buffers);

        let id = BindGroupId(self.generate_id());
        lock(&self.internal.bind_groups, "bind_groups")?.insert(
            id,
            SoftwareBindGroupEntry {
                kernel,
                entries: descriptor.entries.to_vec(),
            },
        );
        Ok(id)
    }

    fn destroy_bind_group(&self, id: BindGroupId) -> Result<(), ResourceError> {
        lock(&self.internal.bind_groups, "bind_groups")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let words = vec![0u32; (descriptor.size as usize).div_ceil(4)];
        self.insert_buffer(descriptor, words)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        if data.len() as u64 > descriptor.size {
            return Err(ResourceError::OutOfBounds);
        }
        let mut words = vec![0u32; (descriptor.size as usize).div_ceil(4)];
        bytemuck::cast_slice_mut::<u32, u8>(&mut words)[..data.len()].copy_from_slice(data);
        self.insert_buffer(descriptor, words)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.buffers, "buffers")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.internal
            .allocated_bytes
            .fetch_sub(entry.size as usize, Ordering::Relaxed);
        log::debug!("SoftwareDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        let entry = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let end = offset + data.len() as u64;
        if end > entry.size {
            return Err(ResourceError::OutOfBounds);
        }
        bytemuck::cast_slice_mut::<u32, u8>(&mut entry.words)[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(SoftwareCommandEncoder {
            commands: Vec::new(),
            device: self.clone(),
        })
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) -> Result<(), ResourceError> {
        let commands = lock(&self.internal.pending_command_buffers, "pending_command_buffers")?
            .remove(&command_buffer);
        let Some(commands) = commands else {
            log::error!(
                "Attempted to submit a CommandBufferId ({:?}) that does not exist.",
                command_buffer
            );
            return Err(ResourceError::InvalidHandle);
        };
        for command in &commands {
            if let Err(e) = self.execute(command) {
                log::error!("SoftwareDevice: Command {:?} failed: {}", command, e);
                return Err(e);
            }
        }
        Ok(())
    }

    fn get_adapter_info(&self) -> RendererAdapterInfo {
        RendererAdapterInfo {
            name: "Lucerna Software Rasterizer".to_string(),
            backend_type: GraphicsBackendType::Software,
        }
    }

    fn limits(&self) -> DeviceLimits {
        self.internal.limits
    }
}
