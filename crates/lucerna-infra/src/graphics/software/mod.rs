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

//! A CPU compute backend.
//!
//! Buffers live in host memory and recorded command buffers run on
//! `submit_command_buffer`, one dispatch after the other. Results can be
//! read back with [`SoftwareDevice::read_buffer`].

mod command;
mod device;
mod kernels;

pub use self::command::{SoftwareCommandEncoder, SoftwareComputePass};
pub use self::device::SoftwareDevice;
