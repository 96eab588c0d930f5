//! WebAssembly code generation.
//!
//! Compilation is two passes over the parsed files:
//! - `declarations` (pass 1) materializes function, class and enum symbols
//!   and registers wasm function types, so forward references resolve.
//! - `bodies` (pass 2) compiles each function body; `expr` holds the
//!   contextually-typed expression lowerer and `convert` the numeric
//!   conversion engine.
//!
//! `module` is the thin façade over `wasm-encoder` that assembles the final
//! binary.

pub mod bodies;
pub mod convert;
pub mod declarations;
pub mod expr;
pub mod module;

pub use module::ModuleBuilder;

use crate::context::CompilerContext;
use crate::syntax::ast::TyExpr;
use crate::types::Ty;
use thiserror::Error;

/// Structural code generation errors.
///
/// These abort compilation outright; everything recoverable is reported
/// through [`crate::diagnostic::Diagnostics`] instead.
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("malformed pointer type: {0}")]
    MalformedPointer(String),

    #[error("unsupported top-level declaration: {0}")]
    UnsupportedDeclaration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Resolve a surface type annotation to a registry type.
///
/// `void` is accepted only when `allow_void` is set (return types). The one
/// recognized generic is `Ptr<T>` where `T` is a plain primitive reference;
/// it resolves to the pointer type with `T` preserved as the element type.
pub(crate) fn resolve_type(
    ctx: &mut CompilerContext,
    ty: &TyExpr,
    allow_void: bool,
) -> Result<Ty, CodegenError> {
    if ty.name == "Ptr" {
        if ty.args.len() != 1 {
            return Err(CodegenError::MalformedPointer(
                "Ptr takes exactly one type argument".into(),
            ));
        }
        let arg = &ty.args[0];
        if !arg.args.is_empty() {
            return Err(CodegenError::MalformedPointer(format!(
                "Ptr element must be a plain type reference, found `{}<...>`",
                arg.name
            )));
        }
        let elem = ctx
            .types
            .lookup_name(&arg.name)
            .filter(|&t| t != Ty::VOID)
            .ok_or_else(|| CodegenError::UnsupportedType(arg.name.clone()))?;
        return Ok(ctx.types.ptr_to(elem));
    }

    if !ty.args.is_empty() {
        return Err(CodegenError::UnsupportedType(format!("{}<...>", ty.name)));
    }

    match ctx.types.lookup_name(&ty.name) {
        Some(t) if t == Ty::VOID && !allow_void => Err(CodegenError::UnsupportedType(
            "void is only valid as a return type".into(),
        )),
        Some(t) => Ok(t),
        None => Err(CodegenError::UnsupportedType(ty.name.clone())),
    }
}
