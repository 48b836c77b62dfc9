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

pub mod software;
#[cfg(feature = "wgpu")]
pub mod wgpu;

/// Whether `source` declares a function named `entry_point`.
///
/// Both backends check this before building a pipeline so a missing kernel
/// fails at creation instead of at the first dispatch.
pub(crate) fn declares_entry_point(source: &str, entry_point: &str) -> bool {
    source.match_indices(entry_point).any(|(at, _)| {
        let before = source[..at].trim_end();
        let after = source[at + entry_point.len()..].trim_start();
        before.ends_with("fn") && after.starts_with('(')
    })
}

#[cfg(test)]
mod tests {
    use super::declares_entry_point;

    #[test]
    fn finds_declared_functions_only() {
        let source = "fn helper() {}\n@compute @workgroup_size(64)\nfn coarse_cull (@builtin(workgroup_id) wid: vec3<u32>) {}";
        assert!(declares_entry_point(source, "coarse_cull"));
        assert!(declares_entry_point(source, "helper"));
        assert!(!declares_entry_point(source, "cluster_cull"));
        assert!(!declares_entry_point("let coarse_cull_count = 1;", "coarse_cull"));
    }
}
