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

//! Tuning constants of the clustered lighting pipeline.

use serde::{Deserialize, Serialize};

use crate::renderer::error::SettingsError;

/// Every tunable constant of the clustered lighting stack.
///
/// The defaults match the reference tiling (64 px big tiles, 32 px clusters,
/// 64 exponential depth slices with log base 1.02). The spot squeeze scale
/// and the big tile light cap are empirical values meant to be calibrated
/// against the target hardware.
///
/// Settings can be loaded from RON:
///
/// ```
/// use lucerna_core::renderer::clustered::ClusteredLightingSettings;
///
/// let settings = ClusteredLightingSettings::from_ron_str(
///     "(max_big_tile_lights: 255, adaptive_log_base: true)",
/// )
/// .unwrap();
/// assert_eq!(settings.max_big_tile_lights, 255);
/// assert_eq!(settings.cluster_tile_size, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteredLightingSettings {
    /// Fine tile size in pixels, published for the shading consumer.
    pub tile_size: u32,
    /// Coarse culling tile size in pixels.
    pub big_tile_size: u32,
    /// Cluster tile size in pixels.
    pub cluster_tile_size: u32,
    /// log2 of the number of depth slices.
    pub log2_num_clusters: u32,
    /// Base of the exponential depth slicing.
    pub cluster_log_base: f32,
    /// Light indices kept per big tile. Overflow is dropped.
    pub max_big_tile_lights: u32,
    /// Average light indices budgeted per voxel for the compacted list.
    pub avg_lights_per_voxel: u32,
    /// Bounds processed per camera. Excess bounds are dropped.
    pub max_lights_on_screen: u32,
    /// Directional lights packed per camera. Excess lights are dropped.
    pub max_directional_lights: u32,
    /// Upper bound of workgroups per dispatch. The device limit wins if lower.
    pub max_groups_per_dispatch: u32,
    /// Lights per scheduled batch in the parallel builder.
    pub parallel_chunk_size: usize,
    /// Below this many punctual lights the builder runs single-threaded.
    pub parallel_threshold: usize,
    /// XY scale of the apex face of a squeezed spot light bound.
    pub spot_squeeze_scale_xy: f32,
    /// Width of the fade band around box volumes.
    pub box_culling_extent_threshold: f32,
    /// Derive a per-tile depth-slice log base from the farthest light in the tile.
    pub adaptive_log_base: bool,
    /// Minimum element count of a pooled buffer or builder array after growth.
    pub min_pool_capacity: usize,
}

/// Upper bound of [`ClusteredLightingSettings::max_big_tile_lights`].
pub const MAX_BIG_TILE_LIGHTS: u32 = 65_535;

/// Upper bound of [`ClusteredLightingSettings::avg_lights_per_voxel`].
pub const MAX_AVG_LIGHTS_PER_VOXEL: u32 = 1024;

impl Default for ClusteredLightingSettings {
    fn default() -> Self {
        Self {
            tile_size: 16,
            big_tile_size: 64,
            cluster_tile_size: 32,
            log2_num_clusters: 6,
            cluster_log_base: 1.02,
            max_big_tile_lights: 511,
            avg_lights_per_voxel: 32,
            max_lights_on_screen: 4096,
            max_directional_lights: 16,
            max_groups_per_dispatch: 65535,
            parallel_chunk_size: 32,
            parallel_threshold: 64,
            spot_squeeze_scale_xy: 0.01,
            box_culling_extent_threshold: 0.01,
            adaptive_log_base: false,
            min_pool_capacity: 100,
        }
    }
}

impl ClusteredLightingSettings {
    /// Parses and validates settings from a RON document. Missing fields take defaults.
    pub fn from_ron_str(source: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            ron::from_str(source).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serializes the settings to pretty RON.
    pub fn to_ron_string(&self) -> Result<String, SettingsError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// Number of depth slices.
    #[inline]
    pub const fn num_slices(&self) -> u32 {
        1 << self.log2_num_clusters
    }

    /// Words per big tile in the coarse list.
    #[inline]
    pub const fn max_big_tile_lights_plus_one(&self) -> u32 {
        self.max_big_tile_lights + 1
    }

    /// Checks the invariants the kernels rely on.
    pub fn validate(&self) -> Result<(), SettingsError> {
        fn invalid(field: &'static str, reason: &str) -> Result<(), SettingsError> {
            Err(SettingsError::Invalid {
                field,
                reason: reason.to_string(),
            })
        }

        for (field, size) in [
            ("tile_size", self.tile_size),
            ("big_tile_size", self.big_tile_size),
            ("cluster_tile_size", self.cluster_tile_size),
        ] {
            if size == 0 || !size.is_power_of_two() {
                return invalid(field, "must be a non-zero power of two");
            }
        }
        if self.big_tile_size % self.cluster_tile_size != 0 {
            return invalid("big_tile_size", "must be a multiple of cluster_tile_size");
        }
        if !(1..=8).contains(&self.log2_num_clusters) {
            return invalid("log2_num_clusters", "must be within 1..=8");
        }
        if !(self.cluster_log_base > 1.0 && self.cluster_log_base.is_finite()) {
            return invalid("cluster_log_base", "must be a finite value above 1");
        }
        if !(1..=MAX_BIG_TILE_LIGHTS).contains(&self.max_big_tile_lights) {
            return invalid("max_big_tile_lights", "must be within 1..=65535");
        }
        if !(1..=MAX_AVG_LIGHTS_PER_VOXEL).contains(&self.avg_lights_per_voxel) {
            return invalid("avg_lights_per_voxel", "must be within 1..=1024");
        }
        if self.max_groups_per_dispatch == 0 {
            return invalid("max_groups_per_dispatch", "must be at least 1");
        }
        if self.parallel_chunk_size == 0 {
            return invalid("parallel_chunk_size", "must be at least 1");
        }
        if !(self.spot_squeeze_scale_xy > 0.0 && self.spot_squeeze_scale_xy <= 1.0) {
            return invalid("spot_squeeze_scale_xy", "must be within (0, 1]");
        }
        if !(self.box_culling_extent_threshold > 0.0) {
            return invalid("box_culling_extent_threshold", "must be positive");
        }
        if self.min_pool_capacity == 0 {
            return invalid("min_pool_capacity", "must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = ClusteredLightingSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.num_slices(), 64);
        assert_eq!(settings.max_big_tile_lights_plus_one(), 512);
    }

    #[test]
    fn ron_round_trip_keeps_values() {
        let settings = ClusteredLightingSettings {
            adaptive_log_base: true,
            max_groups_per_dispatch: 1024,
            ..Default::default()
        };
        let text = settings.to_ron_string().unwrap();
        let parsed = ClusteredLightingSettings::from_ron_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn rejects_misaligned_tiles() {
        let err = ClusteredLightingSettings::from_ron_str("(big_tile_size: 48)").unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                field: "big_tile_size",
                ..
            }
        ));
    }

    #[test]
    fn rejects_flat_log_base() {
        let settings = ClusteredLightingSettings {
            cluster_log_base: 1.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_list_sizes_past_their_caps() {
        let err = ClusteredLightingSettings::from_ron_str("(max_big_tile_lights: 4294967295)").unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                field: "max_big_tile_lights",
                ..
            }
        ));
        let settings = ClusteredLightingSettings {
            avg_lights_per_voxel: MAX_AVG_LIGHTS_PER_VOXEL + 1,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        let at_cap = ClusteredLightingSettings {
            max_big_tile_lights: MAX_BIG_TILE_LIGHTS,
            avg_lights_per_voxel: MAX_AVG_LIGHTS_PER_VOXEL,
            ..Default::default()
        };
        assert!(at_cap.validate().is_ok());
        assert_eq!(at_cap.max_big_tile_lights_plus_one(), 65_536);
    }

    #[test]
    fn parse_errors_are_reported() {
        let err = ClusteredLightingSettings::from_ron_str("(tile_size: \"big\")").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
