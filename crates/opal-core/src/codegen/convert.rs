//! Numeric conversion engine.
//!
//! [`convert`] appends the minimal instruction sequence that turns a value
//! of one primitive type into another, and diagnoses conversions that lose
//! information when they were not written as an explicit cast. After the
//! first report in a chain the conversion proceeds as if explicit, so a
//! nested narrowing is reported exactly once and downstream code still sees
//! a well-typed value.

use crate::context::CompilerContext;
use crate::source::Span;
use crate::types::{Ty, TyKind};
use wasm_encoder::Instruction;

/// Convert the value on top of the stack from `from` to `to`.
///
/// Returns the target type so callers can thread it along.
pub(crate) fn convert(
    ctx: &mut CompilerContext,
    code: &mut Vec<Instruction<'static>>,
    from: Ty,
    to: Ty,
    explicit: bool,
    span: Span,
) -> Ty {
    convert_inner(ctx, code, from, to, explicit, span);
    to
}

fn convert_inner(
    ctx: &mut CompilerContext,
    code: &mut Vec<Instruction<'static>>,
    from: Ty,
    to: Ty,
    explicit: bool,
    span: Span,
) {
    // Identity. Two pointer types with different element annotations share a
    // machine representation and pass through as well.
    if from == to {
        return;
    }
    if matches!(ctx.types.kind(from), TyKind::Uintptr { .. })
        && matches!(ctx.types.kind(to), TyKind::Uintptr { .. })
    {
        return;
    }

    if ctx.types.is_float(from) {
        if ctx.types.is_float(to) {
            if ctx.types.size_of(to) > ctx.types.size_of(from) {
                // The one implicit-safe float conversion.
                code.push(Instruction::F64PromoteF32);
            } else {
                require_explicit(ctx, explicit, from, to, span);
                code.push(Instruction::F32DemoteF64);
            }
            return;
        }

        // Float to integer truncation always loses information.
        let explicit = require_explicit(ctx, explicit, from, to, span);
        let from_f64 = ctx.types.size_of(from) == 8;
        if ctx.types.is_long(to) {
            code.push(match (from_f64, ctx.types.is_signed(to)) {
                (false, true) => Instruction::I64TruncF32S,
                (false, false) => Instruction::I64TruncF32U,
                (true, true) => Instruction::I64TruncF64S,
                (true, false) => Instruction::I64TruncF64U,
            });
        } else {
            code.push(match (from_f64, ctx.types.is_signed(to)) {
                (false, true) => Instruction::I32TruncF32S,
                (false, false) => Instruction::I32TruncF32U,
                (true, true) => Instruction::I32TruncF64S,
                (true, false) => Instruction::I32TruncF64U,
            });
            if ctx.types.size_of(to) < 4 {
                // Normalize the sub-word result.
                let via = if ctx.types.is_signed(to) { Ty::INT } else { Ty::UINT };
                convert_inner(ctx, code, via, to, explicit, span);
            }
        }
        return;
    }

    if ctx.types.is_float(to) {
        // Integer to float. Safe implicitly only when every source value is
        // exactly representable: widths <= 16 bits for f32, the whole 32-bit
        // family for f64.
        let from_long = ctx.types.is_long(from);
        let to_f64 = ctx.types.size_of(to) == 8;
        let implicit_ok = if to_f64 {
            !from_long
        } else {
            ctx.types.size_of(from) <= 2
        };
        if !implicit_ok {
            require_explicit(ctx, explicit, from, to, span);
        }

        let signed = ctx.types.is_signed(from);
        code.push(match (to_f64, from_long, signed) {
            (false, false, true) => Instruction::F32ConvertI32S,
            (false, false, false) => Instruction::F32ConvertI32U,
            (false, true, true) => Instruction::F32ConvertI64S,
            (false, true, false) => Instruction::F32ConvertI64U,
            (true, false, true) => Instruction::F64ConvertI32S,
            (true, false, false) => Instruction::F64ConvertI32U,
            (true, true, true) => Instruction::F64ConvertI64S,
            (true, true, false) => Instruction::F64ConvertI64U,
        });
        return;
    }

    // Integer widening to the 64-bit family extends by target signedness.
    if ctx.types.is_long(to) && ctx.types.is_int(from) {
        code.push(if ctx.types.is_signed(to) {
            Instruction::I64ExtendI32S
        } else {
            Instruction::I64ExtendI32U
        });
        return;
    }

    // 64-bit to 32-bit wraps, then narrows within the word if needed.
    if ctx.types.is_int(to) && ctx.types.is_long(from) {
        let explicit = require_explicit(ctx, explicit, from, to, span);
        code.push(Instruction::I32WrapI64);
        let via = if ctx.types.is_signed(from) { Ty::INT } else { Ty::UINT };
        if via != to {
            convert_inner(ctx, code, via, to, explicit, span);
        }
        return;
    }

    // Same or growing width within one register class passes through.
    if ctx.types.size_of(to) >= ctx.types.size_of(from) {
        return;
    }

    // Sub-word narrowing: sign-shrink for signed targets, mask otherwise.
    require_explicit(ctx, explicit, from, to, span);
    if ctx.types.is_signed(to) {
        let shift = ctx.types.shift32(to) as i32;
        code.push(Instruction::I32Const(shift));
        code.push(Instruction::I32Shl);
        code.push(Instruction::I32Const(shift));
        code.push(Instruction::I32ShrS);
    } else {
        code.push(Instruction::I32Const(ctx.types.mask32(to) as i32));
        code.push(Instruction::I32And);
    }
}

/// Report an illegal implicit conversion, once per chain.
///
/// Returns `true` so recursive continuations behave as if the cast had been
/// written explicitly.
fn require_explicit(
    ctx: &mut CompilerContext,
    explicit: bool,
    from: Ty,
    to: Ty,
    span: Span,
) -> bool {
    if !explicit {
        let message = format!(
            "implicit conversion from `{}` to `{}` requires an explicit cast",
            ctx.types.display(from),
            ctx.types.display(to)
        );
        ctx.diagnostics.error(span, message);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CompilerContext {
        CompilerContext::new(4).unwrap()
    }

    fn run(ctx: &mut CompilerContext, from: Ty, to: Ty, explicit: bool) -> Vec<Instruction<'static>> {
        let mut code = Vec::new();
        let result = convert(ctx, &mut code, from, to, explicit, Span::default());
        assert_eq!(result, to);
        code
    }

    #[test]
    fn identity_emits_nothing() {
        let mut ctx = ctx();
        assert!(run(&mut ctx, Ty::INT, Ty::INT, false).is_empty());
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn pointer_annotations_share_a_representation() {
        let mut ctx = ctx();
        let p = ctx.types.ptr_to(Ty::INT);
        assert!(run(&mut ctx, p, Ty::UINTPTR, false).is_empty());
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn float_promotion_is_implicit_safe() {
        let mut ctx = ctx();
        let code = run(&mut ctx, Ty::FLOAT, Ty::DOUBLE, false);
        assert!(matches!(code[..], [Instruction::F64PromoteF32]));
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn float_demotion_requires_a_cast() {
        let mut ctx = ctx();
        let code = run(&mut ctx, Ty::DOUBLE, Ty::FLOAT, false);
        assert!(matches!(code[..], [Instruction::F32DemoteF64]));
        assert_eq!(ctx.diagnostics.error_count(), 1);
    }

    #[test]
    fn float_to_integer_truncates_by_target_signedness() {
        let mut ctx = ctx();
        let code = run(&mut ctx, Ty::FLOAT, Ty::INT, true);
        assert!(matches!(code[..], [Instruction::I32TruncF32S]));

        let code = run(&mut ctx, Ty::DOUBLE, Ty::ULONG, true);
        assert!(matches!(code[..], [Instruction::I64TruncF64U]));
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn float_to_sub_word_normalizes_once() {
        let mut ctx = ctx();
        let code = run(&mut ctx, Ty::DOUBLE, Ty::BYTE, false);
        assert!(matches!(
            code[..],
            [
                Instruction::I32TruncF64U,
                Instruction::I32Const(0xFF),
                Instruction::I32And
            ]
        ));
        // One report for the whole chain.
        assert_eq!(ctx.diagnostics.error_count(), 1);
    }

    #[test]
    fn small_integers_convert_to_f32_implicitly() {
        let mut ctx = ctx();
        let code = run(&mut ctx, Ty::SHORT, Ty::FLOAT, false);
        assert!(matches!(code[..], [Instruction::F32ConvertI32S]));
        let code = run(&mut ctx, Ty::USHORT, Ty::FLOAT, false);
        assert!(matches!(code[..], [Instruction::F32ConvertI32U]));
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn int_to_f32_requires_a_cast_but_int_to_f64_does_not() {
        let mut ctx = ctx();
        run(&mut ctx, Ty::INT, Ty::FLOAT, false);
        assert_eq!(ctx.diagnostics.error_count(), 1);

        let mut ctx = self::ctx();
        let code = run(&mut ctx, Ty::INT, Ty::DOUBLE, false);
        assert!(matches!(code[..], [Instruction::F64ConvertI32S]));
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn long_to_float_requires_a_cast() {
        let mut ctx = ctx();
        let code = run(&mut ctx, Ty::ULONG, Ty::DOUBLE, false);
        assert!(matches!(code[..], [Instruction::F64ConvertI64U]));
        assert_eq!(ctx.diagnostics.error_count(), 1);
    }

    #[test]
    fn widening_extends_by_target_signedness() {
        let mut ctx = ctx();
        let code = run(&mut ctx, Ty::INT, Ty::LONG, false);
        assert!(matches!(code[..], [Instruction::I64ExtendI32S]));
        let code = run(&mut ctx, Ty::INT, Ty::ULONG, false);
        assert!(matches!(code[..], [Instruction::I64ExtendI32U]));
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn long_to_byte_wraps_then_masks_with_one_report() {
        let mut ctx = ctx();
        let code = run(&mut ctx, Ty::LONG, Ty::BYTE, false);
        assert!(matches!(
            code[..],
            [
                Instruction::I32WrapI64,
                Instruction::I32Const(0xFF),
                Instruction::I32And
            ]
        ));
        assert_eq!(ctx.diagnostics.error_count(), 1);
    }

    #[test]
    fn explicit_narrowing_sign_shrinks_signed_targets() {
        let mut ctx = ctx();
        let code = run(&mut ctx, Ty::INT, Ty::SBYTE, true);
        assert!(matches!(
            code[..],
            [
                Instruction::I32Const(24),
                Instruction::I32Shl,
                Instruction::I32Const(24),
                Instruction::I32ShrS
            ]
        ));
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn explicit_narrowing_masks_unsigned_targets() {
        let mut ctx = ctx();
        let code = run(&mut ctx, Ty::INT, Ty::USHORT, true);
        assert!(matches!(
            code[..],
            [Instruction::I32Const(0xFFFF), Instruction::I32And]
        ));
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn widening_within_the_word_passes_through() {
        let mut ctx = ctx();
        assert!(run(&mut ctx, Ty::BYTE, Ty::INT, false).is_empty());
        assert!(run(&mut ctx, Ty::SBYTE, Ty::SHORT, false).is_empty());
        // Same-size signedness change also passes through.
        assert!(run(&mut ctx, Ty::INT, Ty::UINT, false).is_empty());
        assert!(run(&mut ctx, Ty::LONG, Ty::ULONG, false).is_empty());
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn word_size_eight_treats_uintptr_as_long() {
        let mut ctx = CompilerContext::new(8).unwrap();
        let code = run(&mut ctx, Ty::INT, Ty::UINTPTR, false);
        assert!(matches!(code[..], [Instruction::I64ExtendI32U]));
        assert!(ctx.diagnostics.is_empty());
    }
}
