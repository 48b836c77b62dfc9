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

//! Error type of the lighting lanes.

use lucerna_core::renderer::{ResourceError, SettingsError};
use thiserror::Error;

/// Errors raised while building, culling or publishing lights.
///
/// Construction-time variants ([`LightingError::KernelCreation`],
/// [`LightingError::Settings`]) are configuration errors and are fatal. The
/// per-frame variants abort the current camera only.
#[derive(Debug, Error)]
pub enum LightingError {
    /// A compute kernel could not be created. Raised at lane construction.
    #[error("failed to create compute kernel `{entry_point}`: {source}")]
    KernelCreation {
        /// WGSL entry point of the kernel.
        entry_point: &'static str,
        /// Device error.
        #[source]
        source: ResourceError,
    },

    /// A light carries values no bound can be derived from.
    #[error("light {index} is invalid: {reason}")]
    InvalidLight {
        /// Index in the visible-light list.
        index: usize,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The lighting settings are invalid.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The camera's render target has no pixels.
    #[error("camera target {width}x{height} is empty")]
    EmptyTarget {
        /// Target width.
        width: u32,
        /// Target height.
        height: u32,
    },

    /// The camera's light lists would need more entries than a `u32` index addresses.
    #[error("camera target {width}x{height} needs a {list} larger than u32 indices allow")]
    TargetTooLarge {
        /// Target width.
        width: u32,
        /// Target height.
        height: u32,
        /// The list that overflowed.
        list: &'static str,
    },

    /// A device operation failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// `encode` was called before `on_camera_setup` for the frame.
    #[error("culling lane used before camera setup")]
    CameraNotSetup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_creation_names_the_entry_point() {
        let err = LightingError::KernelCreation {
            entry_point: "cluster_cull",
            source: ResourceError::NotFound,
        };
        let text = err.to_string();
        assert!(text.contains("cluster_cull"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn settings_errors_convert() {
        let err: LightingError = SettingsError::Invalid {
            field: "tile_size",
            reason: "must be a non-zero power of two".into(),
        }
        .into();
        assert!(matches!(err, LightingError::Settings(_)));
    }
}
