//! Expression lowering with contextual typing.
//!
//! Lowering is recursive descent over the AST with a contextual type
//! threaded downward (so numeric literals pick the width their context
//! expects) and the inferred type of every node recorded upward in a side
//! map keyed by node identity. Operand types steer opcode family selection
//! (`i32` / `i64` / `f32` / `f64`, signed vs unsigned variants), and any
//! mismatch between an operand and the chosen result type goes through the
//! conversion engine.

use super::bodies::BodyCompiler;
use super::convert::convert;
use super::resolve_type;
use super::CodegenError;
use crate::source::Span;
use crate::symbols::Constant;
use crate::syntax::ast::{BinOp, Expr, ExprKind, NodeId};
use crate::types::Ty;
use std::collections::HashMap;
use wasm_encoder::Instruction;

/// Side map from expression node to its inferred type.
///
/// After lowering, every visited node has exactly one entry.
#[derive(Debug, Default)]
pub(crate) struct NodeTypes {
    map: HashMap<NodeId, Ty>,
}

impl NodeTypes {
    pub(crate) fn insert(&mut self, id: NodeId, ty: Ty) {
        self.map.insert(id, ty);
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<Ty> {
        self.map.get(&id).copied()
    }
}

impl BodyCompiler<'_> {
    /// Lower `expr` under `contextual` into `code`, returning the inferred
    /// type of the value left on the stack.
    pub(crate) fn lower_expr(
        &mut self,
        expr: &Expr,
        contextual: Ty,
        code: &mut Vec<Instruction<'static>>,
    ) -> Result<Ty, CodegenError> {
        let ty = match &expr.kind {
            // Parentheses are transparent to both contextual and inferred
            // types.
            ExprKind::Paren(inner) => self.lower_expr(inner, contextual, code)?,

            ExprKind::Cast { expr: inner, ty } => {
                let target = resolve_type(self.ctx, ty, false)?;
                let from = self.lower_expr(inner, contextual, code)?;
                convert(self.ctx, code, from, target, true, expr.span)
            }

            ExprKind::Binary { op, lhs, rhs } => {
                self.lower_binary(*op, lhs, rhs, contextual, expr.span, code)?
            }

            ExprKind::Number { text } => self.lower_number(text, contextual, expr.span, code),

            ExprKind::Bool(value) => {
                code.push(Instruction::I32Const(i32::from(*value)));
                Ty::BOOL
            }

            ExprKind::Ident(name) => {
                let interned = self.ctx.intern(name);
                match self.locals.lookup(interned) {
                    Some((slot, ty)) => {
                        code.push(Instruction::LocalGet(slot));
                        ty
                    }
                    None => {
                        self.ctx
                            .diagnostics
                            .error(expr.span, format!("unknown identifier `{}`", name));
                        code.push(Instruction::Unreachable);
                        contextual
                    }
                }
            }

            ExprKind::Member { base, member } => {
                self.lower_member(base, member, contextual, expr.span, code)
            }

            ExprKind::Unary { .. } | ExprKind::Call { .. } => {
                self.ctx
                    .diagnostics
                    .error(expr.span, "unsupported expression");
                code.push(Instruction::Unreachable);
                contextual
            }
        };

        self.types.insert(expr.id, ty);
        Ok(ty)
    }

    fn lower_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        contextual: Ty,
        span: Span,
        code: &mut Vec<Instruction<'static>>,
    ) -> Result<Ty, CodegenError> {
        // Decide the result type from both operands as seen under the outer
        // context, then lower each side under that result type so literals
        // come out at the right width.
        let lt = self.infer_type(lhs, contextual);
        let rt = self.infer_type(rhs, contextual);
        let result = self.wider(lt, rt);

        let actual = self.lower_expr(lhs, result, code)?;
        convert(self.ctx, code, actual, result, false, lhs.span);
        let actual = self.lower_expr(rhs, result, code)?;
        convert(self.ctx, code, actual, result, false, rhs.span);

        match self.binary_instruction(op, result) {
            Some(instruction) => code.push(instruction),
            None => {
                self.ctx.diagnostics.error(
                    span,
                    format!(
                        "operator `{}` is not supported for `{}` operands",
                        op.symbol(),
                        self.ctx.types.display(result)
                    ),
                );
                code.push(Instruction::Unreachable);
            }
        }
        Ok(result)
    }

    /// The opcode for `op` at the given result type, or `None` when the
    /// operator has no instruction in that family (bitwise and remainder
    /// operators on floats).
    fn binary_instruction(&self, op: BinOp, result: Ty) -> Option<Instruction<'static>> {
        let types = &self.ctx.types;

        if types.is_float(result) {
            let wide = types.size_of(result) == 8;
            return match op {
                BinOp::Add => Some(if wide { Instruction::F64Add } else { Instruction::F32Add }),
                BinOp::Sub => Some(if wide { Instruction::F64Sub } else { Instruction::F32Sub }),
                BinOp::Mul => Some(if wide { Instruction::F64Mul } else { Instruction::F32Mul }),
                BinOp::Div => Some(if wide { Instruction::F64Div } else { Instruction::F32Div }),
                _ => None,
            };
        }

        let signed = types.is_signed(result);
        if types.is_long(result) {
            return Some(match op {
                BinOp::Add => Instruction::I64Add,
                BinOp::Sub => Instruction::I64Sub,
                BinOp::Mul => Instruction::I64Mul,
                BinOp::Div => {
                    if signed {
                        Instruction::I64DivS
                    } else {
                        Instruction::I64DivU
                    }
                }
                BinOp::Rem => {
                    if signed {
                        Instruction::I64RemS
                    } else {
                        Instruction::I64RemU
                    }
                }
                BinOp::BitAnd => Instruction::I64And,
                BinOp::BitOr => Instruction::I64Or,
                BinOp::BitXor => Instruction::I64Xor,
                BinOp::Shl => Instruction::I64Shl,
                BinOp::Shr => {
                    if signed {
                        Instruction::I64ShrS
                    } else {
                        Instruction::I64ShrU
                    }
                }
            });
        }

        Some(match op {
            BinOp::Add => Instruction::I32Add,
            BinOp::Sub => Instruction::I32Sub,
            BinOp::Mul => Instruction::I32Mul,
            BinOp::Div => {
                if signed {
                    Instruction::I32DivS
                } else {
                    Instruction::I32DivU
                }
            }
            BinOp::Rem => {
                if signed {
                    Instruction::I32RemS
                } else {
                    Instruction::I32RemU
                }
            }
            BinOp::BitAnd => Instruction::I32And,
            BinOp::BitOr => Instruction::I32Or,
            BinOp::BitXor => Instruction::I32Xor,
            BinOp::Shl => Instruction::I32Shl,
            BinOp::Shr => {
                if signed {
                    Instruction::I32ShrS
                } else {
                    Instruction::I32ShrU
                }
            }
        })
    }

    fn lower_number(
        &mut self,
        text: &str,
        contextual: Ty,
        span: Span,
        code: &mut Vec<Instruction<'static>>,
    ) -> Ty {
        let hex = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"));
        let float_literal = hex.is_none() && text.contains(['.', 'e', 'E']);

        // An unambiguously floating-point literal overrides an integer
        // context and comes out as a double.
        if float_literal && !self.ctx.types.is_float(contextual) {
            return match text.parse::<f64>() {
                Ok(value) => {
                    code.push(Instruction::F64Const(value));
                    Ty::DOUBLE
                }
                Err(_) => self.bad_literal(text, span, Ty::DOUBLE, code),
            };
        }

        if self.ctx.types.is_float(contextual) {
            return match text.parse::<f64>() {
                Ok(value) => {
                    if self.ctx.types.size_of(contextual) == 4 {
                        code.push(Instruction::F32Const(value as f32));
                    } else {
                        code.push(Instruction::F64Const(value));
                    }
                    contextual
                }
                Err(_) => self.bad_literal(text, span, contextual, code),
            };
        }

        let parsed = match hex {
            Some(digits) => u64::from_str_radix(digits, 16),
            None => text.parse::<u64>(),
        };
        let value = match parsed {
            Ok(value) => value,
            Err(_) => return self.bad_literal(text, span, contextual, code),
        };

        if contextual == Ty::BOOL {
            code.push(Instruction::I32Const(i32::from(value != 0)));
            return Ty::BOOL;
        }

        if self.ctx.types.is_long(contextual) {
            code.push(Instruction::I64Const(value as i64));
            return contextual;
        }

        if self.ctx.types.is_int(contextual) {
            // Truncate to the context's width.
            let masked = value & u64::from(self.ctx.types.mask32(contextual));
            code.push(Instruction::I32Const(masked as u32 as i32));
            return contextual;
        }

        // Non-numeric context (e.g. recovery paths): default to int.
        self.lower_number(text, Ty::INT, span, code)
    }

    fn bad_literal(
        &mut self,
        text: &str,
        span: Span,
        ty: Ty,
        code: &mut Vec<Instruction<'static>>,
    ) -> Ty {
        self.ctx
            .diagnostics
            .error(span, format!("unsupported literal `{}`", text));
        code.push(Instruction::Unreachable);
        ty
    }

    /// `A.B` resolves against the constant table when `A` is an identifier
    /// and `A$B` names an enum constant. No other property access is
    /// supported yet.
    fn lower_member(
        &mut self,
        base: &Expr,
        member: &str,
        contextual: Ty,
        span: Span,
        code: &mut Vec<Instruction<'static>>,
    ) -> Ty {
        if let ExprKind::Ident(base_name) = &base.kind {
            let key = self.ctx.intern(&format!("{}${}", base_name, member));
            if let Some(constant) = self.ctx.symbols.constant(key) {
                self.emit_constant(constant, code);
                return constant.ty;
            }
        }
        self.ctx
            .diagnostics
            .error(span, "unsupported property access");
        code.push(Instruction::Unreachable);
        contextual
    }

    fn emit_constant(&mut self, constant: Constant, code: &mut Vec<Instruction<'static>>) {
        if self.ctx.types.is_float(constant.ty) {
            if self.ctx.types.size_of(constant.ty) == 4 {
                code.push(Instruction::F32Const(constant.value as f32));
            } else {
                code.push(Instruction::F64Const(constant.value as f64));
            }
        } else if self.ctx.types.is_long(constant.ty) {
            code.push(Instruction::I64Const(constant.value));
        } else {
            code.push(Instruction::I32Const(constant.value as i32));
        }
    }

    /// Predict the type `lower_expr` would infer, without emitting code or
    /// diagnostics. Used to pick a binary result type before the operands
    /// are lowered for real.
    pub(crate) fn infer_type(&self, expr: &Expr, contextual: Ty) -> Ty {
        match &expr.kind {
            ExprKind::Paren(inner) => self.infer_type(inner, contextual),
            ExprKind::Cast { ty, .. } => {
                if ty.name == "Ptr" {
                    Ty::UINTPTR
                } else {
                    self.ctx
                        .types
                        .lookup_name(&ty.name)
                        .filter(|&t| t != Ty::VOID)
                        .unwrap_or(contextual)
                }
            }
            ExprKind::Number { text } => {
                let hex = text.starts_with("0x") || text.starts_with("0X");
                if !hex
                    && text.contains(['.', 'e', 'E'])
                    && !self.ctx.types.is_float(contextual)
                {
                    Ty::DOUBLE
                } else {
                    contextual
                }
            }
            ExprKind::Bool(_) => Ty::BOOL,
            ExprKind::Ident(name) => {
                let interned = self.ctx.intern(name);
                self.locals
                    .lookup(interned)
                    .map(|(_, ty)| ty)
                    .unwrap_or(contextual)
            }
            ExprKind::Member { base, member } => {
                if let ExprKind::Ident(base_name) = &base.kind {
                    let key = self.ctx.intern(&format!("{}${}", base_name, member));
                    if let Some(constant) = self.ctx.symbols.constant(key) {
                        return constant.ty;
                    }
                }
                contextual
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                let lt = self.infer_type(lhs, contextual);
                let rt = self.infer_type(rhs, contextual);
                self.wider(lt, rt)
            }
            ExprKind::Unary { .. } | ExprKind::Call { .. } => contextual,
        }
    }

    /// Binary result type: a float side wins (the wider float when both
    /// are), otherwise the wider integer; 64-bit beats 32-bit. On equal
    /// width the left operand's type is kept.
    fn wider(&self, a: Ty, b: Ty) -> Ty {
        let types = &self.ctx.types;

        let a_float = types.is_float(a);
        let b_float = types.is_float(b);
        if a_float || b_float {
            if a_float && b_float {
                return if types.size_of(b) > types.size_of(a) { b } else { a };
            }
            return if a_float { a } else { b };
        }

        if types.is_long(a) || types.is_long(b) {
            if !types.is_long(b) {
                return a;
            }
            if !types.is_long(a) {
                return b;
            }
            return a;
        }

        if types.size_of(b) > types.size_of(a) {
            b
        } else {
            a
        }
    }
}
