//! Integer constant folding over operator calls.

use crate::ast::{Expr, ExprKind};
use crate::error::CompileError;

/// Replace `expr` by a literal if it is an operator call whose operands
/// are all literals. Meant to be driven children-first, so nested
/// operator trees collapse bottom-up.
pub(super) fn fold_expr(expr: &mut Expr) -> Result<(), CompileError> {
    let ExprKind::Call { func, args } = &expr.kind else {
        return Ok(());
    };
    let ExprKind::Name(name) = &func.kind else {
        return Ok(());
    };
    let Some(arity) = operator_arity(name) else {
        return Ok(());
    };
    if args.len() != arity {
        return Ok(());
    }
    let Some(values) = args.iter().map(Expr::as_number).collect::<Option<Vec<_>>>() else {
        return Ok(());
    };

    let value = evaluate(name, &values).map_err(|message| CompileError::at(expr.span, message))?;
    tracing::trace!(op = %name, ?values, value, "folded constant");
    expr.kind = ExprKind::Number(value);
    Ok(())
}

fn operator_arity(name: &str) -> Option<usize> {
    match name {
        "neg" | "not" | "bit_not" => Some(1),
        "add" | "sub" | "mul" | "div" | "mod" | "pow" | "and" | "or" | "xor" | "lt" | "le"
        | "eq" | "ne" | "gt" | "ge" | "bit_and" | "bit_or" | "bit_xor" | "bit_shl"
        | "bit_shr" => Some(2),
        _ => None,
    }
}

fn evaluate(name: &str, values: &[i64]) -> Result<i64, String> {
    let overflow = || format!("integer overflow while folding '{name}'");
    match (name, values) {
        ("neg", [value]) => value.checked_neg().ok_or_else(overflow),
        ("not", [value]) => Ok(bool_to_i64(!truthy(*value))),
        ("bit_not", [value]) => Ok(!value),

        ("add", [l, r]) => l.checked_add(*r).ok_or_else(overflow),
        ("sub", [l, r]) => l.checked_sub(*r).ok_or_else(overflow),
        ("mul", [l, r]) => l.checked_mul(*r).ok_or_else(overflow),
        ("div", [_, 0]) => Err("division by zero".to_string()),
        ("div", [l, r]) => l.checked_div(*r).ok_or_else(overflow),
        ("mod", [_, 0]) => Err("modulo by zero".to_string()),
        ("mod", [l, r]) => l.checked_rem(*r).ok_or_else(overflow),
        ("pow", [_, r]) if *r < 0 => Err("negative exponent in constant power".to_string()),
        ("pow", [l, r]) => u32::try_from(*r)
            .ok()
            .and_then(|exp| l.checked_pow(exp))
            .ok_or_else(overflow),

        ("and", [l, r]) => Ok(bool_to_i64(truthy(*l) && truthy(*r))),
        ("or", [l, r]) => Ok(bool_to_i64(truthy(*l) || truthy(*r))),
        ("xor", [l, r]) => Ok(bool_to_i64(truthy(*l) ^ truthy(*r))),

        ("lt", [l, r]) => Ok(bool_to_i64(l < r)),
        ("le", [l, r]) => Ok(bool_to_i64(l <= r)),
        ("eq", [l, r]) => Ok(bool_to_i64(l == r)),
        ("ne", [l, r]) => Ok(bool_to_i64(l != r)),
        ("gt", [l, r]) => Ok(bool_to_i64(l > r)),
        ("ge", [l, r]) => Ok(bool_to_i64(l >= r)),

        ("bit_and", [l, r]) => Ok(l & r),
        ("bit_or", [l, r]) => Ok(l | r),
        ("bit_xor", [l, r]) => Ok(l ^ r),
        ("bit_shl" | "bit_shr", [_, r]) if *r < 0 => Err("negative shift count".to_string()),
        ("bit_shl", [l, r]) => u32::try_from(*r)
            .ok()
            .and_then(|shift| l.checked_shl(shift))
            .ok_or_else(overflow),
        ("bit_shr", [l, r]) => u32::try_from(*r)
            .ok()
            .and_then(|shift| l.checked_shr(shift))
            .ok_or_else(overflow),

        (other, _) => Err(format!("cannot fold operator '{other}'")),
    }
}

fn truthy(value: i64) -> bool {
    value != 0
}

fn bool_to_i64(value: bool) -> i64 {
    if value { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{FileId, Span};

    fn span() -> Span {
        Span::new(FileId(1), 3, 8)
    }

    fn num(value: i64) -> Expr {
        Expr::number(value, span())
    }

    fn fold_all(mut expr: Expr) -> Result<Expr, CompileError> {
        expr.walk_mut(&mut fold_expr)?;
        Ok(expr)
    }

    #[test]
    fn folds_nested_arithmetic() {
        let expr = Expr::op(
            "mul",
            vec![Expr::op("add", vec![num(2), num(3)], span()), num(4)],
            span(),
        );
        assert_eq!(fold_all(expr).unwrap().as_number(), Some(20));
    }

    #[test]
    fn leaves_non_constant_calls() {
        let expr = Expr::op("add", vec![Expr::name("x", span()), num(1)], span());
        let folded = fold_all(expr.clone()).unwrap();
        assert_eq!(folded, expr);

        let user_call = Expr::op("frobnicate", vec![num(1)], span());
        assert_eq!(fold_all(user_call.clone()).unwrap(), user_call);
    }

    #[test]
    fn division_by_zero_is_positioned_error() {
        let err = fold_all(Expr::op("div", vec![num(1), num(0)], span())).unwrap_err();
        assert_eq!(err.message, "division by zero");
        assert_eq!(err.span, Some(span()));
    }

    #[test]
    fn overflow_is_error() {
        let err = fold_all(Expr::op("add", vec![num(i64::MAX), num(1)], span())).unwrap_err();
        assert!(err.message.contains("overflow"));
        assert!(fold_all(Expr::op("bit_shl", vec![num(1), num(-1)], span())).is_err());
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(
            fold_all(Expr::op("lt", vec![num(1), num(2)], span())).unwrap().as_number(),
            Some(1)
        );
        assert_eq!(
            fold_all(Expr::op("and", vec![num(5), num(0)], span())).unwrap().as_number(),
            Some(0)
        );
        assert_eq!(
            fold_all(Expr::op("bit_not", vec![num(0)], span())).unwrap().as_number(),
            Some(-1)
        );
    }
}
