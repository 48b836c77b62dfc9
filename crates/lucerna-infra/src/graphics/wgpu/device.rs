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
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use wgpu::util::DeviceExt;

use lucerna_core::renderer::api::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutId, BufferDescriptor, BufferId, CommandBufferId,
    ComputePipelineDescriptor, ComputePipelineId, DeviceLimits, GraphicsBackendType,
    RendererAdapterInfo, ShaderModuleDescriptor, ShaderModuleId, ShaderSourceData,
};
use lucerna_core::renderer::traits::CommandEncoder;
use lucerna_core::renderer::{GraphicsDevice, PipelineError, ResourceError, ShaderError};

use super::command::WgpuCommandEncoder;
use super::context::WgpuComputeContext;
use super::validation::{check_compute_entry_point, compile_wgsl, DeclaredEntryPoint};

#[derive(Debug)]
struct WgpuShaderModuleEntry {
    wgpu_module: Arc<wgpu::ShaderModule>,
    entry_points: Vec<DeclaredEntryPoint>,
}

#[derive(Debug)]
pub(crate) struct WgpuComputePipelineEntry {
    pub(crate) wgpu_pipeline: Arc<wgpu::ComputePipeline>,
}

#[derive(Debug)]
pub(crate) struct WgpuBindGroupEntry {
    pub(crate) wgpu_bind_group: Arc<wgpu::BindGroup>,
}

#[derive(Debug)]
pub(crate) struct WgpuBufferEntry {
    pub(crate) wgpu_buffer: Arc<wgpu::Buffer>,
    pub(crate) size: u64, // To track memory accurately on destruction
}

/// The internal, non-clonable state of the WgpuDevice.
#[derive(Debug)]
pub struct WgpuDeviceInternal {
    context: Arc<Mutex<WgpuComputeContext>>,
    shader_modules: Mutex<HashMap<ShaderModuleId, WgpuShaderModuleEntry>>,
    pipelines: Mutex<HashMap<ComputePipelineId, WgpuComputePipelineEntry>>,
    layouts: Mutex<HashMap<BindGroupLayoutId, wgpu::BindGroupLayout>>,
    bind_groups: Mutex<HashMap<BindGroupId, WgpuBindGroupEntry>>,
    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,

    next_id: AtomicUsize,
    allocated_bytes: AtomicUsize,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<CommandBufferId, wgpu::CommandBuffer>>,
    /// A thread-safe counter to generate unique command buffer IDs.
    command_buffer_id_counter: AtomicU64,
}

/// A clonable, thread-safe handle to the WGPU compute device.
///
/// Encoders hold a clone so passes can resolve ids while recording.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

/// Buffer sizes are rounded up to the copy alignment.
fn aligned_size(size: u64) -> u64 {
    size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT).max(1) * wgpu::COPY_BUFFER_ALIGNMENT
}

impl WgpuDevice {
    pub fn new(context: Arc<Mutex<WgpuComputeContext>>) -> Self {
        Self {
            internal: Arc::new(WgpuDeviceInternal {
                context,
                shader_modules: Mutex::new(HashMap::new()),
                pipelines: Mutex::new(HashMap::new()),
                layouts: Mutex::new(HashMap::new()),
                bind_groups: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                next_id: AtomicUsize::new(0),
                allocated_bytes: AtomicUsize::new(0),
                pending_command_buffers: Mutex::new(HashMap::new()),
                command_buffer_id_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a device on the best available adapter, without a window.
    pub fn new_headless() -> anyhow::Result<Self> {
        let context = pollster::block_on(WgpuComputeContext::new_headless())?;
        Ok(Self::new(Arc::new(Mutex::new(context))))
    }

    fn generate_id(&self) -> usize {
        self.internal.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Helper function to execute an operation with the wgpu::Device locked.
    fn with_wgpu_device<F, R>(&self, operation: F) -> Result<R, ResourceError>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue) -> Result<R, ResourceError>,
    {
        let context_guard = lock(&self.internal.context, "context")?;
        operation(&context_guard.device, &context_guard.queue)
    }

    /// Retrieves the internal WGPU compute pipeline. Returns `None` if the ID is invalid.
    pub fn get_wgpu_compute_pipeline(&self, id: ComputePipelineId) -> Option<Arc<wgpu::ComputePipeline>> {
        let pipelines = self.internal.pipelines.lock().ok()?;
        pipelines.get(&id).map(|entry| Arc::clone(&entry.wgpu_pipeline))
    }

    /// Retrieves the internal WGPU bind group. Returns `None` if the ID is invalid.
    pub fn get_wgpu_bind_group(&self, id: BindGroupId) -> Option<Arc<wgpu::BindGroup>> {
        let bind_groups = self.internal.bind_groups.lock().ok()?;
        bind_groups.get(&id).map(|entry| Arc::clone(&entry.wgpu_bind_group))
    }

    /// Retrieves the internal WGPU buffer. Returns `None` if the ID is invalid.
    pub fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        let buffers = self.internal.buffers.lock().ok()?;
        buffers.get(&id).map(|entry| Arc::clone(&entry.wgpu_buffer))
    }

    /// Polls the underlying wgpu::Device in a blocking manner.
    /// Used before teardown and by readbacks, so every submitted dispatch has
    /// finished before its buffers are touched.
    pub fn poll_device_blocking(&self) {
        if let Ok(context_guard) = self.internal.context.lock() {
            if let Err(e) = context_guard.device.poll(wgpu::PollType::Wait) {
                log::warn!("Failed to poll device: {:?}", e);
            }
        } else {
            log::error!("WgpuDevice context mutex was poisoned during poll.");
        }
    }

    /// Copies a buffer back to the host. Blocks until the GPU is done with it.
    pub fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>, ResourceError> {
        let (source, size) = {
            let buffers = lock(&self.internal.buffers, "buffers")?;
            let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
            (Arc::clone(&entry.wgpu_buffer), entry.size)
        };
        let staging = self.with_wgpu_device(|device, queue| {
            let staging = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Lucerna Readback"),
                size: source.size(),
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Lucerna Readback Encoder"),
            });
            encoder.copy_buffer_to_buffer(&source, 0, &staging, 0, source.size());
            queue.submit(std::iter::once(encoder.finish()));
            Ok(staging)
        })?;

        let (sender, receiver) = mpsc::channel();
        let slice = staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.poll_device_blocking();
        receiver
            .recv()
            .map_err(|e| ResourceError::BackendError(format!("readback callback dropped: {e}")))?
            .map_err(|e| ResourceError::BackendError(format!("map_async failed: {e:?}")))?;

        let data = slice.get_mapped_range()[..size as usize].to_vec();
        staging.unmap();
        Ok(data)
    }

    /// (crate-internal) Registers a finished wgpu::CommandBuffer, storing it
    /// in a map and returning an abstract ID for it.
    pub(crate) fn register_command_buffer(&self, buffer: wgpu::CommandBuffer) -> CommandBufferId {
        let id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        match self.internal.pending_command_buffers.lock() {
            Ok(mut guard) => {
                guard.insert(id, buffer);
            }
            Err(e) => log::error!("WgpuDevice: Dropping command buffer, mutex poisoned: {}", e),
        }
        id
    }

    fn insert_buffer(&self, wgpu_buffer: wgpu::Buffer, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.generate_id());
        let size = wgpu_buffer.size();
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer: Arc::new(wgpu_buffer),
                size: descriptor.size,
            },
        );
        self.internal
            .allocated_bytes
            .fetch_add(size as usize, Ordering::Relaxed);
        log::debug!(
            "WgpuDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            size
        );
        Ok(id)
    }
}

impl GraphicsDevice for WgpuDevice {
    // --- Shader Module Operations ---

    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let ShaderSourceData::Wgsl(cow_str) = &descriptor.source;
        let label = descriptor.label;
        let entry_points = compile_wgsl(label, cow_str)?;

        let wgpu_module = self.with_wgpu_device(|device, _| {
            log::debug!("WgpuDevice: Creating wgpu::ShaderModule with label: {:?}", label);
            Ok(Arc::new(device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label,
                source: wgpu::ShaderSource::Wgsl(cow_str.clone()),
            })))
        })?;

        let id = ShaderModuleId(self.generate_id());
        lock(&self.internal.shader_modules, "shader_modules")?.insert(
            id,
            WgpuShaderModuleEntry {
                wgpu_module,
                entry_points,
            },
        );
        log::info!(
            "WgpuDevice: Successfully created shader module '{}' with ID: {:?}",
            label.unwrap_or_default(),
            id
        );
        Ok(id)
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        match lock(&self.internal.shader_modules, "shader_modules")?.remove(&id) {
            Some(_) => {
                log::debug!("WgpuDevice: Destroyed shader module with ID: {id:?}");
                Ok(())
            }
            None => Err(ShaderError::NotFound { id }.into()),
        }
    }

    // --- Compute Pipeline Operations ---

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineId, ResourceError> {
        let module_id = descriptor.shader_module;
        let entry_point = descriptor.entry_point.as_ref();
        let module = {
            let modules = lock(&self.internal.shader_modules, "shader_modules")?;
            let entry = modules.get(&module_id).ok_or_else(|| {
                PipelineError::InvalidShaderModuleForPipeline {
                    id: module_id,
                    pipeline_label: descriptor.label.as_deref().map(str::to_string),
                }
            })?;
            check_compute_entry_point(
                module_id,
                &entry.entry_points,
                entry_point,
                descriptor.label.as_deref(),
            )?;
            Arc::clone(&entry.wgpu_module)
        };

        let wgpu_pipeline = self.with_wgpu_device(|device, _| {
            Ok(device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: descriptor.label.as_deref(),
                layout: None,
                module: &module,
                entry_point: Some(entry_point),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            }))
        })?;

        let id = ComputePipelineId(self.generate_id() as u64);
        lock(&self.internal.pipelines, "pipelines")?.insert(
            id,
            WgpuComputePipelineEntry {
                wgpu_pipeline: Arc::new(wgpu_pipeline),
            },
        );
        log::info!("WgpuDevice: Created compute pipeline '{}' with ID: {:?}", entry_point, id);
        Ok(id)
    }

    fn destroy_compute_pipeline(&self, id: ComputePipelineId) -> Result<(), ResourceError> {
        lock(&self.internal.pipelines, "pipelines")?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PipelineError::InvalidComputePipeline { id }.into())
    }

    fn compute_pipeline_bind_group_layout(
        &self,
        pipeline: ComputePipelineId,
        index: u32,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let wgpu_pipeline = self
            .get_wgpu_compute_pipeline(pipeline)
            .ok_or(PipelineError::InvalidComputePipeline { id: pipeline })?;
        let layout = wgpu_pipeline.get_bind_group_layout(index);
        let id = BindGroupLayoutId(self.generate_id());
        lock(&self.internal.layouts, "layouts")?.insert(id, layout);
        Ok(id)
    }

    fn create_bind_group(&self, descriptor: &BindGroupDescriptor) -> Result<BindGroupId, ResourceError> {
        let layout = lock(&self.internal.layouts, "layouts")?
            .get(&descriptor.layout)
            .cloned()
            .ok_or(ResourceError::InvalidHandle)?;
        let buffers = descriptor
            .entries
            .iter()
            .map(|entry| self.get_wgpu_buffer(entry.buffer).ok_or(ResourceError::NotFound))
            .collect::<Result<Vec<_>, _>>()?;

        let wgpu_entries: Vec<wgpu::BindGroupEntry> = descriptor
            .entries
            .iter()
            .zip(&buffers)
            .map(|(entry, buffer)| wgpu::BindGroupEntry {
                binding: entry.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: entry.offset,
                    size: entry.size.and_then(wgpu::BufferSize::new),
                }),
            })
            .collect();

        let wgpu_bind_group = self.with_wgpu_device(|device, _| {
            Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: descriptor.label,
                layout: &layout,
                entries: &wgpu_entries,
            }))
        })?;

        let id = BindGroupId(self.generate_id());
        lock(&self.internal.bind_groups, "bind_groups")?.insert(
            id,
            WgpuBindGroupEntry {
                wgpu_bind_group: Arc::new(wgpu_bind_group),
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

    // --- Buffer Operations ---

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let wgpu_buffer = self.with_wgpu_device(|device, _| {
            Ok(device.create_buffer(&wgpu::BufferDescriptor {
                label: descriptor.label.as_deref(),
                size: aligned_size(descriptor.size),
                usage: wgpu::BufferUsages::from_bits_truncate(descriptor.usage.bits()),
                mapped_at_creation: descriptor.mapped_at_creation,
            }))
        })?;
        self.insert_buffer(wgpu_buffer, descriptor)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        if data.len() as u64 > descriptor.size {
            return Err(ResourceError::OutOfBounds);
        }
        let mut contents = data.to_vec();
        contents.resize(aligned_size(descriptor.size) as usize, 0);
        let wgpu_buffer = self.with_wgpu_device(|device, _| {
            Ok(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: descriptor.label.as_deref(),
                contents: &contents,
                usage: wgpu::BufferUsages::from_bits_truncate(descriptor.usage.bits()),
            }))
        })?;
        self.insert_buffer(wgpu_buffer, descriptor)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.buffers, "buffers")?
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.internal
            .allocated_bytes
            .fetch_sub(entry.wgpu_buffer.size() as usize, Ordering::Relaxed);
        log::debug!("WgpuDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = {
            let buffers = lock(&self.internal.buffers, "buffers")?;
            let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
            if offset + data.len() as u64 > entry.size {
                return Err(ResourceError::OutOfBounds);
            }
            Arc::clone(&entry.wgpu_buffer)
        };
        self.with_wgpu_device(|_, queue| {
            queue.write_buffer(&buffer, offset, data);
            Ok(())
        })
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        let encoder = match self.internal.context.lock() {
            Ok(context_guard) => context_guard
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label }),
            Err(poisoned) => poisoned
                .into_inner()
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label }),
        };
        Box::new(WgpuCommandEncoder {
            encoder,
            device: self.clone(),
        })
    }

    fn submit_command_buffer(&self, command_buffer: CommandBufferId) -> Result<(), ResourceError> {
        let buffer = lock(&self.internal.pending_command_buffers, "pending_command_buffers")?
            .remove(&command_buffer);
        match buffer {
            Some(buffer) => self.with_wgpu_device(|_, queue| {
                queue.submit(std::iter::once(buffer));
                Ok(())
            }),
            None => {
                log::error!(
                    "Attempted to submit a CommandBufferId ({:?}) that does not exist.",
                    command_buffer
                );
                Err(ResourceError::InvalidHandle)
            }
        }
    }

    fn get_adapter_info(&self) -> RendererAdapterInfo {
        let Ok(context_guard) = self.internal.context.lock() else {
            return RendererAdapterInfo::default();
        };
        RendererAdapterInfo {
            name: context_guard.adapter_name.clone(),
            backend_type: match context_guard.adapter_backend {
                wgpu::Backend::Vulkan => GraphicsBackendType::Vulkan,
                wgpu::Backend::Metal => GraphicsBackendType::Metal,
                wgpu::Backend::Dx12 => GraphicsBackendType::Dx12,
                wgpu::Backend::Gl => GraphicsBackendType::OpenGL,
                wgpu::Backend::BrowserWebGpu => GraphicsBackendType::WebGpu,
                wgpu::Backend::Noop => GraphicsBackendType::Unknown,
            },
        }
    }

    fn limits(&self) -> DeviceLimits {
        match self.internal.context.lock() {
            Ok(context_guard) => DeviceLimits {
                max_compute_workgroups_per_dimension: context_guard
                    .device_limits
                    .max_compute_workgroups_per_dimension,
                min_uniform_buffer_offset_alignment: context_guard
                    .device_limits
                    .min_uniform_buffer_offset_alignment,
            },
            Err(_) => DeviceLimits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_round_up_to_copy_alignment() {
        assert_eq!(aligned_size(0), 4);
        assert_eq!(aligned_size(5), 8);
        assert_eq!(aligned_size(496), 496);
    }

    // Needs a GPU; run with `--features wgpu -- --ignored`.
    #[test]
    #[ignore]
    fn headless_device_round_trips_a_buffer() {
        let device = WgpuDevice::new_headless().unwrap();
        let id = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 16,
                usage: lucerna_core::renderer::BufferUsage::STORAGE
                    | lucerna_core::renderer::BufferUsage::COPY_DST
                    | lucerna_core::renderer::BufferUsage::COPY_SRC,
                mapped_at_creation: false,
            })
            .unwrap();
        device.write_buffer(id, 0, &[7; 16]).unwrap();
        assert_eq!(device.read_buffer(id).unwrap(), vec![7; 16]);
        assert!(device.limits().max_compute_workgroups_per_dimension > 0);
    }
}
