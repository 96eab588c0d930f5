//! Body compilation (pass 2).
//!
//! Every function declared in pass 1 gets its body compiled here, against a
//! per-function map from parameter/local name to (slot, type). Imports
//! produce an import record instead of a body; a top-level function named
//! `start` is installed as the module's start function.

use super::expr::NodeTypes;
use super::{convert::convert, CodegenError, ModuleBuilder};
use crate::context::CompilerContext;
use crate::interner::Name;
use crate::source::Span;
use crate::symbols::FunctionSymbol;
use crate::syntax::ast::{Expr, File, FunctionDecl, Item, Spanned, Stmt};
use crate::types::Ty;
use std::collections::HashMap;
use wasm_encoder::Instruction;

/// Per-function map from local name to (slot index, type).
#[derive(Debug, Default)]
pub(crate) struct LocalMap {
    slots: HashMap<Name, (u32, Ty)>,
}

impl LocalMap {
    fn define(&mut self, name: Name, ty: Ty) -> u32 {
        let slot = self.slots.len() as u32;
        self.slots.insert(name, (slot, ty));
        slot
    }

    pub(crate) fn lookup(&self, name: Name) -> Option<(u32, Ty)> {
        self.slots.get(&name).copied()
    }
}

/// Compilation state for one function body.
pub(crate) struct BodyCompiler<'ctx> {
    pub(crate) ctx: &'ctx mut CompilerContext,
    pub(crate) locals: LocalMap,
    /// Inferred types, recorded per expression node for parents to consume.
    pub(crate) types: NodeTypes,
    ret: Ty,
}

pub(crate) fn run(
    ctx: &mut CompilerContext,
    builder: &mut ModuleBuilder,
    file: &File,
) -> Result<(), CodegenError> {
    for item in &file.items {
        match &item.node {
            Item::Function(decl) => compile_function(ctx, builder, decl, None)?,
            Item::Class(decl) => {
                for method in &decl.methods {
                    compile_function(ctx, builder, method, Some(&decl.name))?;
                }
            }
            Item::Enum(_) | Item::Let(_) | Item::Stmt(_) => {}
        }
    }
    Ok(())
}

fn compile_function(
    ctx: &mut CompilerContext,
    builder: &mut ModuleBuilder,
    decl: &FunctionDecl,
    class: Option<&str>,
) -> Result<(), CodegenError> {
    let mangled = match class {
        Some(class) => format!("{}${}", class, decl.name),
        None => decl.name.clone(),
    };
    let name = ctx.intern(&mangled);
    // Functions pass 1 skipped (e.g. generic ones) have no symbol.
    let Some(symbol) = ctx.symbols.lookup_function(name) else {
        return Ok(());
    };
    let symbol = symbol.clone();

    if symbol.imported {
        let (module, field) = match mangled.split_once('$') {
            Some((module, field)) => (module.to_string(), field.to_string()),
            None => ("env".to_string(), mangled.clone()),
        };
        builder.add_import(&mangled, &module, &field, symbol.type_index);
        return Ok(());
    }

    let Some(body) = &decl.body else {
        ctx.diagnostics
            .error(decl.name_span, "function implementation is missing");
        return Ok(());
    };

    let code = {
        let mut compiler = BodyCompiler::new(ctx, &symbol);
        let mut code = Vec::new();
        for stmt in body {
            compiler.compile_stmt(stmt, &mut code)?;
        }
        // A non-void body that falls off the end would not validate.
        if symbol.ret != Ty::VOID && !matches!(code.last(), Some(Instruction::Return)) {
            code.push(Instruction::Unreachable);
        }
        code
    };

    builder.add_function(&mangled, symbol.type_index, Vec::new(), code);

    if symbol.exported {
        builder.add_export(&mangled, &mangled);
    }

    if mangled == "start" {
        if symbol.param_types.is_empty() && symbol.ret == Ty::VOID {
            builder.set_start(&mangled);
        } else {
            ctx.diagnostics.error(
                decl.name_span,
                "`start` must take no parameters and return void",
            );
        }
    }

    Ok(())
}

impl<'ctx> BodyCompiler<'ctx> {
    pub(crate) fn new(ctx: &'ctx mut CompilerContext, symbol: &FunctionSymbol) -> Self {
        let mut locals = LocalMap::default();
        for (&name, &ty) in symbol.param_names.iter().zip(&symbol.param_types) {
            locals.define(name, ty);
        }
        Self {
            ctx,
            locals,
            types: NodeTypes::default(),
            ret: symbol.ret,
        }
    }

    fn compile_stmt(
        &mut self,
        stmt: &Spanned<Stmt>,
        code: &mut Vec<Instruction<'static>>,
    ) -> Result<(), CodegenError> {
        match &stmt.node {
            Stmt::Return { value } => self.compile_return(value.as_ref(), stmt.span, code),
            Stmt::Let(_) | Stmt::Expr(_) => {
                self.ctx.diagnostics.error(stmt.span, "unsupported statement");
                Ok(())
            }
        }
    }

    fn compile_return(
        &mut self,
        value: Option<&Expr>,
        span: Span,
        code: &mut Vec<Instruction<'static>>,
    ) -> Result<(), CodegenError> {
        if self.ret == Ty::VOID {
            if value.is_some() {
                self.ctx
                    .diagnostics
                    .error(span, "void function cannot return a value");
                code.push(Instruction::Unreachable);
                return Ok(());
            }
            code.push(Instruction::Return);
            return Ok(());
        }

        let Some(value) = value else {
            self.ctx.diagnostics.error(
                span,
                format!(
                    "function returning `{}` must return a value",
                    self.ctx.types.display(self.ret)
                ),
            );
            code.push(Instruction::Unreachable);
            return Ok(());
        };

        let inferred = self.lower_expr(value, self.ret, code)?;
        convert(self.ctx, code, inferred, self.ret, false, value.span);
        code.push(Instruction::Return);
        Ok(())
    }
}
