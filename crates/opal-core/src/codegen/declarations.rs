//! Declaration scan (pass 1).
//!
//! Walks every top-level declaration and materializes the symbols the body
//! pass needs: function signatures (registered and deduplicated in the
//! module's type section), export/import flags, method name mangling, and
//! enum constants. Bodies are not touched here, so forward references
//! resolve naturally in pass 2.

use super::{resolve_type, CodegenError, ModuleBuilder};
use crate::context::CompilerContext;
use crate::symbols::{Constant, FunctionSymbol};
use crate::syntax::ast::{ClassDecl, EnumDecl, Expr, ExprKind, File, FunctionDecl, Item, UnaryOp};
use crate::types::Ty;

struct MethodContext<'a> {
    class_name: &'a str,
    is_static: bool,
}

pub(crate) fn run(
    ctx: &mut CompilerContext,
    builder: &mut ModuleBuilder,
    file: &File,
) -> Result<(), CodegenError> {
    for item in &file.items {
        match &item.node {
            Item::Function(decl) => declare_function(ctx, builder, decl, None)?,
            Item::Class(decl) => declare_class(ctx, builder, decl)?,
            Item::Enum(decl) => declare_enum(ctx, decl),
            Item::Let(_) => {
                // Top-level variables are accepted but not yet emitted; no
                // wasm global is registered for them.
            }
            Item::Stmt(_) => {
                return Err(CodegenError::UnsupportedDeclaration(
                    "statements are not allowed at the top level".into(),
                ));
            }
        }
    }
    Ok(())
}

fn declare_function(
    ctx: &mut CompilerContext,
    builder: &mut ModuleBuilder,
    decl: &FunctionDecl,
    method: Option<MethodContext<'_>>,
) -> Result<(), CodegenError> {
    if !decl.type_params.is_empty() {
        ctx.diagnostics
            .error(decl.name_span, "type parameters are not supported");
        return Ok(());
    }

    let mut param_names = Vec::with_capacity(decl.params.len() + 1);
    let mut param_types = Vec::with_capacity(decl.params.len() + 1);

    // Instance methods receive a pointer-typed `this` at slot 0.
    if let Some(MethodContext { is_static: false, .. }) = &method {
        param_names.push(ctx.intern("this"));
        param_types.push(Ty::UINTPTR);
    }

    for param in &decl.params {
        param_names.push(ctx.intern(&param.name));
        param_types.push(resolve_type(ctx, &param.ty, false)?);
    }

    let ret = match &decl.ret {
        Some(ty) => resolve_type(ctx, ty, true)?,
        None => Ty::VOID,
    };

    let mut key = String::with_capacity(param_types.len() + 1);
    for &ty in &param_types {
        key.push(ctx.types.sig_char(ty));
    }
    key.push(ctx.types.sig_char(ret));

    let params_vt = param_types
        .iter()
        .filter_map(|&ty| ctx.types.val_type(ty))
        .collect();
    let results_vt = ctx.types.val_type(ret).into_iter().collect();
    let type_index = builder.add_function_type(&key, params_vt, results_vt);

    let mangled = match &method {
        Some(m) => format!("{}${}", m.class_name, decl.name),
        None => decl.name.clone(),
    };
    let name = ctx.intern(&mangled);

    let symbol = FunctionSymbol {
        name,
        span: decl.name_span,
        param_names,
        param_types,
        ret,
        exported: decl.modifiers.export && method.is_none(),
        imported: decl.modifiers.declare && method.is_none(),
        type_index,
    };
    if ctx.symbols.declare_function(symbol).is_none() {
        ctx.diagnostics
            .error(decl.name_span, format!("duplicate function `{}`", mangled));
    }
    Ok(())
}

fn declare_class(
    ctx: &mut CompilerContext,
    builder: &mut ModuleBuilder,
    decl: &ClassDecl,
) -> Result<(), CodegenError> {
    for method in &decl.methods {
        if method.modifiers.export || method.modifiers.declare {
            ctx.diagnostics.error(
                method.name_span,
                "methods cannot carry `export` or `declare` modifiers",
            );
        }
        declare_function(
            ctx,
            builder,
            method,
            Some(MethodContext {
                class_name: &decl.name,
                is_static: method.modifiers.is_static,
            }),
        )?;
    }
    Ok(())
}

fn declare_enum(ctx: &mut CompilerContext, decl: &EnumDecl) {
    let mut next = 0i64;
    for member in &decl.members {
        let value = match &member.value {
            None => next,
            Some(expr) => match eval_enum_value(expr) {
                Some(v) => v,
                None => {
                    ctx.diagnostics
                        .error(expr.span, "enum initializer must be an integer literal");
                    next
                }
            },
        };
        next = value + 1;

        let key = ctx.intern(&format!("{}${}", decl.name, member.name));
        ctx.symbols.define_constant(
            key,
            Constant {
                ty: Ty::INT,
                value,
            },
        );
    }
}

/// Evaluate an enum member initializer: an integer literal, optionally
/// negated or parenthesized.
fn eval_enum_value(expr: &Expr) -> Option<i64> {
    match &expr.kind {
        ExprKind::Number { text } => parse_int(text),
        ExprKind::Paren(inner) => eval_enum_value(inner),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            expr: inner,
        } => eval_enum_value(inner).map(|v| -v),
        _ => None,
    }
}

fn parse_int(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}
