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

//! Errors reported by the agents.

use lucerna_core::renderer::ResourceError;
use lucerna_lanes::LightingError;
use thiserror::Error;

/// Failure of a frame or of the agent's construction.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A lane failed.
    #[error(transparent)]
    Lighting(#[from] LightingError),

    /// A device call made by the agent itself failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The agent was used after [`shutdown`](crate::ClusteredLightingAgent::shutdown).
    #[error("the lighting agent has been shut down")]
    ShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_errors_stay_transparent() {
        let err: AgentError = LightingError::CameraNotSetup.into();
        assert_eq!(err.to_string(), LightingError::CameraNotSetup.to_string());
    }
}
