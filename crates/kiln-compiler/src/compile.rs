//! Source unit to validated artifact.

use kiln_binder::{bind, BindOptions, Catalog};
use kiln_codegen::{emit, CompiledArtifact, EmitOptions};
use kiln_types::{Diagnostics, ReferenceSet, SourceFile};
use tracing::debug;

use crate::config::CompileOptions;
use crate::error::CompileError;

/// Parse and bind `source` against `refs`, returning every diagnostic.
pub fn diagnose(source: &SourceFile, refs: &ReferenceSet, options: CompileOptions) -> Diagnostics {
    compile_to_result(source, refs, options).diagnostics
}

/// Compile `source` against `refs` into an in-memory artifact.
///
/// Fails with [`CompileError::Compilation`] when any error diagnostic was
/// reported; warnings never block compilation.
pub fn compile(
    source: &SourceFile,
    refs: &ReferenceSet,
    options: CompileOptions,
) -> Result<CompiledArtifact, CompileError> {
    let result = compile_to_result(source, refs, options);
    match result.artifact {
        Some(artifact) => artifact,
        None => Err(CompileError::Compilation(
            result.diagnostics.error_lines().join("\n"),
        )),
    }
}

/// Diagnostics plus the artifact, when there were no errors.
#[derive(Debug)]
pub struct CompileResult {
    pub diagnostics: Diagnostics,
    pub artifact: Option<Result<CompiledArtifact, CompileError>>,
}

pub fn compile_to_result(
    source: &SourceFile,
    refs: &ReferenceSet,
    options: CompileOptions,
) -> CompileResult {
    let parsed = kiln_parser::parse(source);
    let bind_options = BindOptions {
        ignore_accessibility: false,
        output: options.output,
    };
    let bound = bind(&parsed.program, source, &Catalog::standard(), refs, bind_options);

    let mut diagnostics = parsed.diagnostics;
    diagnostics.merge(bound.diagnostics);
    if diagnostics.has_errors() {
        debug!(
            file = %source.name,
            errors = diagnostics.total_errors,
            "compilation failed"
        );
        return CompileResult {
            diagnostics,
            artifact: None,
        };
    }

    let emitted = emit(
        &parsed.program,
        &bound.model,
        refs,
        EmitOptions {
            optimization: options.optimization,
        },
    )
    .map(|bytes| CompiledArtifact::new(bytes, bound.model.entry_point().cloned()))
    .map_err(CompileError::from);

    if let Ok(artifact) = &emitted {
        debug!(
            file = %source.name,
            bytes = artifact.len(),
            digest = %artifact.digest(),
            "compiled"
        );
    }
    CompileResult {
        diagnostics,
        artifact: Some(emitted),
    }
}
