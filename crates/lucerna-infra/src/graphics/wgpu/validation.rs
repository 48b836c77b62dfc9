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

//! WGSL front-end checks run before a module or a pipeline reaches wgpu.
//!
//! wgpu reports shader validation failures through its uncaptured-error
//! handler. Running naga up front turns them into typed errors at creation.

use lucerna_core::renderer::{PipelineError, ResourceError, ShaderError, ShaderModuleId};

/// An entry point declared by a validated module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeclaredEntryPoint {
    pub(crate) name: String,
    pub(crate) stage: naga::ShaderStage,
}

/// Parses and validates `source`, returning its entry points.
pub(crate) fn compile_wgsl(
    label: Option<&str>,
    source: &str,
) -> Result<Vec<DeclaredEntryPoint>, ShaderError> {
    let label = label.unwrap_or("Unnamed").to_string();
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::CompilationError {
        label: label.clone(),
        details: e.emit_to_string(source),
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::CompilationError {
        label,
        details: e.emit_to_string(source),
    })?;

    Ok(module
        .entry_points
        .iter()
        .map(|ep| DeclaredEntryPoint {
            name: ep.name.clone(),
            stage: ep.stage,
        })
        .collect())
}

/// Checks that `entry_point` is a compute entry point of the module.
pub(crate) fn check_compute_entry_point(
    module: ShaderModuleId,
    declared: &[DeclaredEntryPoint],
    entry_point: &str,
    pipeline_label: Option<&str>,
) -> Result<(), ResourceError> {
    match declared.iter().find(|ep| ep.name == entry_point) {
        None => Err(ShaderError::InvalidEntryPoint {
            id: module,
            entry_point: entry_point.to_string(),
        }
        .into()),
        Some(ep) if ep.stage != naga::ShaderStage::Compute => Err(PipelineError::CompilationFailed {
            label: pipeline_label.map(str::to_string),
            details: format!("entry point `{entry_point}` is a {:?} stage, not compute", ep.stage),
        }
        .into()),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KERNEL: &str = "@group(0) @binding(0) var<storage, read_write> data: array<u32>;\n\
        @compute @workgroup_size(64)\n\
        fn clear(@builtin(global_invocation_id) id: vec3<u32>) { data[id.x] = 0u; }\n\
        @vertex fn vs() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }\n";

    #[test]
    fn valid_source_lists_its_entry_points() {
        let declared = compile_wgsl(Some("Clear"), KERNEL).unwrap();
        assert!(declared.contains(&DeclaredEntryPoint {
            name: "clear".to_string(),
            stage: naga::ShaderStage::Compute,
        }));
        assert!(check_compute_entry_point(ShaderModuleId(1), &declared, "clear", None).is_ok());
    }

    #[test]
    fn syntax_errors_are_compilation_errors() {
        let err = compile_wgsl(Some("Broken"), "fn clear( {").unwrap_err();
        match err {
            ShaderError::CompilationError { label, details } => {
                assert_eq!(label, "Broken");
                assert!(!details.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn type_errors_are_compilation_errors() {
        let source = "@compute @workgroup_size(1) fn main() { let x: u32 = 1.5; }";
        assert!(matches!(
            compile_wgsl(None, source),
            Err(ShaderError::CompilationError { .. })
        ));
    }

    #[test]
    fn entry_points_must_exist_and_be_compute() {
        let declared = compile_wgsl(None, KERNEL).unwrap();
        assert!(matches!(
            check_compute_entry_point(ShaderModuleId(3), &declared, "missing", None),
            Err(ResourceError::Shader(ShaderError::InvalidEntryPoint { .. }))
        ));
        assert!(matches!(
            check_compute_entry_point(ShaderModuleId(3), &declared, "vs", Some("Raster")),
            Err(ResourceError::Pipeline(PipelineError::CompilationFailed { .. }))
        ));
    }
}
