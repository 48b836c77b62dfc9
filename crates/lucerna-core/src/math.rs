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

//! Math types used across the workspace.
//!
//! Vector and matrix types come from `glam`. GPU-facing structs never store
//! these types directly; they are flattened to `[f32; N]` arrays so their
//! layout is fixed regardless of SIMD alignment.

pub use glam::{Mat3, Mat4, Quat, UVec2, Vec2, Vec3, Vec4};

/// Converts a [`Mat4`] into the column-major array layout expected by WGSL.
#[inline]
pub fn mat4_to_cols(m: &Mat4) -> [[f32; 4]; 4] {
    m.to_cols_array_2d()
}

/// Flattens a [`Vec3`] into a plain array.
#[inline]
pub fn vec3_to_array(v: Vec3) -> [f32; 3] {
    v.to_array()
}
