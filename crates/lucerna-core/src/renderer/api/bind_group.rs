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

//! Defines data structures for bind groups.
//!
//! The culling kernels only bind buffers, so an entry is a buffer range.

use crate::renderer::api::buffer::BufferId;

/// An opaque handle to a bind group layout, as reflected from a compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutId(pub usize);

/// An opaque handle to a bind group resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupId(pub usize);

/// Binds a range of a buffer to a shader binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    /// The binding index (`@binding(N)` in WGSL).
    pub binding: u32,
    /// The bound buffer.
    pub buffer: BufferId,
    /// Byte offset into the buffer. Uniform offsets must respect the device alignment.
    pub offset: u64,
    /// Size of the bound range in bytes, or `None` for the rest of the buffer.
    pub size: Option<u64>,
}

impl BindGroupEntry {
    /// Binds the whole buffer.
    pub const fn whole(binding: u32, buffer: BufferId) -> Self {
        Self {
            binding,
            buffer,
            offset: 0,
            size: None,
        }
    }

    /// Binds `size` bytes starting at `offset`.
    pub const fn range(binding: u32, buffer: BufferId, offset: u64, size: u64) -> Self {
        Self {
            binding,
            buffer,
            offset,
            size: Some(size),
        }
    }
}

/// A descriptor used to create a [`BindGroupId`].
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<&'a str>,
    /// The layout the bind group must match.
    pub layout: BindGroupLayoutId,
    /// The bound resources.
    pub entries: &'a [BindGroupEntry],
}
