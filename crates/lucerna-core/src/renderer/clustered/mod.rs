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

//! Data model of the clustered light culling pipeline.
//!
//! Big tiles (64 px) and clusters (32 px tiles sliced exponentially along
//! view depth) are derived index spaces, never stored entities. Every
//! culling result buffer is addressed through [`ClusterGrid`].
//!
//! # Culling view space
//!
//! Cameras hand us a right-handed view matrix looking down -Z. The culling
//! kernels work in a view space looking down +Z so depths are positive.
//! [`culling_view_matrix`] performs that conversion by negating the third
//! row of the view matrix, translation included. Porting code that assumes
//! the opposite convention silently flips spot light directions and depth
//! slice indices, so every matrix entering the builder goes through it.

pub mod bindings;
mod geometry;
mod layouts;
mod settings;

pub use self::geometry::*;
pub use self::layouts::*;
pub use self::settings::{ClusteredLightingSettings, MAX_AVG_LIGHTS_PER_VOXEL, MAX_BIG_TILE_LIGHTS};
