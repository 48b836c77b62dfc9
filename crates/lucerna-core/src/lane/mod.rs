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

//! Lanes: the units of work a culling agent orchestrates.
//!
//! Each lane owns one concrete strategy for one stage of the per-camera
//! lighting work. Lanes keep GPU objects alive between frames and release
//! them in [`Lane::on_shutdown`].

use std::fmt;

use crate::renderer::GraphicsDevice;

/// The stage a lane takes care of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// CPU light bounding-volume construction.
    Bounds,
    /// GPU light culling.
    Culling,
    /// Publication of shading resources.
    Resolve,
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneKind::Bounds => write!(f, "Bounds"),
            LaneKind::Culling => write!(f, "Culling"),
            LaneKind::Resolve => write!(f, "Resolve"),
        }
    }
}

/// Common interface of every lane.
pub trait Lane: Send + Sync {
    /// A unique, human-readable name for the strategy this lane implements.
    fn strategy_name(&self) -> &'static str;

    /// The stage this lane takes care of.
    fn lane_kind(&self) -> LaneKind;

    /// Releases every GPU object the lane owns.
    ///
    /// Safe to call more than once and before any frame was processed.
    fn on_shutdown(&mut self, device: &dyn GraphicsDevice) {
        let _ = device;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_kind_display() {
        assert_eq!(LaneKind::Bounds.to_string(), "Bounds");
        assert_eq!(LaneKind::Culling.to_string(), "Culling");
        assert_eq!(LaneKind::Resolve.to_string(), "Resolve");
    }
}
