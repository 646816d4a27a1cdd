//! Numeric operations: constants and arithmetic
//!
//! Integer arithmetic wraps modulo 2^N. Division and remainder trap on a zero
//! divisor; signed division also traps on `MIN / -1`, whereas signed remainder
//! of `MIN % -1` is defined to be zero.

use super::{RuntimeError, Stack, Trap, Value};

pub fn i32_const(stack: &mut Stack, value: i32) -> Result<(), RuntimeError> {
    stack.push(Value::I32(value));
    Ok(())
}

pub fn i64_const(stack: &mut Stack, value: i64) -> Result<(), RuntimeError> {
    stack.push(Value::I64(value));
    Ok(())
}

pub fn f32_const(stack: &mut Stack, value: f32) -> Result<(), RuntimeError> {
    stack.push(Value::F32(value));
    Ok(())
}

pub fn f64_const(stack: &mut Stack, value: f64) -> Result<(), RuntimeError> {
    stack.push(Value::F64(value));
    Ok(())
}

fn i32_binop(stack: &mut Stack, op: impl FnOnce(i32, i32) -> Result<i32, Trap>) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(op(c1, c2)?));
    Ok(())
}

fn i64_binop(stack: &mut Stack, op: impl FnOnce(i64, i64) -> Result<i64, Trap>) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(op(c1, c2)?));
    Ok(())
}

// ============================================================================
// Integer arithmetic
// ============================================================================

pub fn i32_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| Ok(a.wrapping_add(b)))
}

pub fn i32_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| Ok(a.wrapping_sub(b)))
}

pub fn i32_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| Ok(a.wrapping_mul(b)))
}

/// i32.div_s: traps on a zero divisor and on `i32::MIN / -1`
pub fn i32_div_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| {
        if b == 0 {
            return Err(Trap::DivideByZero);
        }
        a.checked_div(b).ok_or(Trap::IntegerOverflow)
    })
}

pub fn i32_div_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| {
        if b == 0 {
            return Err(Trap::DivideByZero);
        }
        Ok(((a as u32) / (b as u32)) as i32)
    })
}

pub fn i32_rem_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| if b == 0 { Err(Trap::DivideByZero) } else { Ok(a.wrapping_rem(b)) })
}

pub fn i32_rem_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i32_binop(stack, |a, b| {
        if b == 0 {
            return Err(Trap::DivideByZero);
        }
        Ok(((a as u32) % (b as u32)) as i32)
    })
}

pub fn i64_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| Ok(a.wrapping_add(b)))
}

pub fn i64_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| Ok(a.wrapping_sub(b)))
}

pub fn i64_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| Ok(a.wrapping_mul(b)))
}

pub fn i64_div_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| {
        if b == 0 {
            return Err(Trap::DivideByZero);
        }
        a.checked_div(b).ok_or(Trap::IntegerOverflow)
    })
}

pub fn i64_div_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| {
        if b == 0 {
            return Err(Trap::DivideByZero);
        }
        Ok(((a as u64) / (b as u64)) as i64)
    })
}

pub fn i64_rem_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| if b == 0 { Err(Trap::DivideByZero) } else { Ok(a.wrapping_rem(b)) })
}

pub fn i64_rem_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    i64_binop(stack, |a, b| {
        if b == 0 {
            return Err(Trap::DivideByZero);
        }
        Ok(((a as u64) % (b as u64)) as i64)
    })
}

// ============================================================================
// Floating point
// ============================================================================

fn f32_unop(stack: &mut Stack, op: impl FnOnce(f32) -> f32) -> Result<(), RuntimeError> {
    let c = stack.pop_f32()?;
    stack.push(Value::F32(op(c)));
    Ok(())
}

fn f64_unop(stack: &mut Stack, op: impl FnOnce(f64) -> f64) -> Result<(), RuntimeError> {
    let c = stack.pop_f64()?;
    stack.push(Value::F64(op(c)));
    Ok(())
}

fn f32_binop(stack: &mut Stack, op: impl FnOnce(f32, f32) -> f32) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(Value::F32(op(c1, c2)));
    Ok(())
}

fn f64_binop(stack: &mut Stack, op: impl FnOnce(f64, f64) -> f64) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(Value::F64(op(c1, c2)));
    Ok(())
}

pub fn f32_abs(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_unop(stack, f32::abs)
}

pub fn f32_neg(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_unop(stack, |c| -c)
}

pub fn f32_ceil(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_unop(stack, f32::ceil)
}

pub fn f32_floor(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_unop(stack, f32::floor)
}

pub fn f32_trunc(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_unop(stack, f32::trunc)
}

/// Round to nearest, ties to even
pub fn f32_nearest(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_unop(stack, |c| {
        let rounded = c.round();
        if (c - c.trunc()).abs() == 0.5 {
            2.0 * (c / 2.0).round()
        } else {
            rounded
        }
    })
}

pub fn f32_sqrt(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_unop(stack, f32::sqrt)
}

pub fn f32_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_binop(stack, |a, b| a + b)
}

pub fn f32_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_binop(stack, |a, b| a - b)
}

pub fn f32_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_binop(stack, |a, b| a * b)
}

pub fn f32_div(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_binop(stack, |a, b| a / b)
}

/// NaN-propagating minimum; `-0.0` is less than `+0.0`
pub fn f32_min(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_binop(stack, |a, b| {
        if a.is_nan() || b.is_nan() {
            f32::NAN
        } else if a == b {
            if a.is_sign_negative() { a } else { b }
        } else {
            a.min(b)
        }
    })
}

pub fn f32_max(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_binop(stack, |a, b| {
        if a.is_nan() || b.is_nan() {
            f32::NAN
        } else if a == b {
            if a.is_sign_positive() { a } else { b }
        } else {
            a.max(b)
        }
    })
}

pub fn f32_copysign(stack: &mut Stack) -> Result<(), RuntimeError> {
    f32_binop(stack, f32::copysign)
}

pub fn f64_abs(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_unop(stack, f64::abs)
}

pub fn f64_neg(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_unop(stack, |c| -c)
}

pub fn f64_ceil(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_unop(stack, f64::ceil)
}

pub fn f64_floor(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_unop(stack, f64::floor)
}

pub fn f64_trunc(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_unop(stack, f64::trunc)
}

pub fn f64_nearest(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_unop(stack, |c| {
        let rounded = c.round();
        if (c - c.trunc()).abs() == 0.5 {
            2.0 * (c / 2.0).round()
        } else {
            rounded
        }
    })
}

pub fn f64_sqrt(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_unop(stack, f64::sqrt)
}

pub fn f64_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_binop(stack, |a, b| a + b)
}

pub fn f64_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_binop(stack, |a, b| a - b)
}

pub fn f64_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_binop(stack, |a, b| a * b)
}

pub fn f64_div(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_binop(stack, |a, b| a / b)
}

pub fn f64_min(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_binop(stack, |a, b| {
        if a.is_nan() || b.is_nan() {
            f64::NAN
        } else if a == b {
            if a.is_sign_negative() { a } else { b }
        } else {
            a.min(b)
        }
    })
}

pub fn f64_max(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_binop(stack, |a, b| {
        if a.is_nan() || b.is_nan() {
            f64::NAN
        } else if a == b {
            if a.is_sign_positive() { a } else { b }
        } else {
            a.max(b)
        }
    })
}

pub fn f64_copysign(stack: &mut Stack) -> Result<(), RuntimeError> {
    f64_binop(stack, f64::copysign)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn run_i32(op: fn(&mut Stack) -> Result<(), RuntimeError>, a: i32, b: i32) -> Result<i32, RuntimeError> {
        let mut stack = Stack::new();
        stack.push(Value::I32(a));
        stack.push(Value::I32(b));
        op(&mut stack)?;
        stack.pop_i32()
    }

    #[rstest]
    #[case(i32_add, i32::MAX, 1, i32::MIN)]
    #[case(i32_sub, 0, 1, -1)]
    #[case(i32_mul, 0x10000, 0x10000, 0)]
    #[case(i32_div_s, -7, 2, -3)]
    #[case(i32_div_u, -1, 2, i32::MAX)]
    #[case(i32_rem_s, -7, 2, -1)]
    #[case(i32_rem_s, i32::MIN, -1, 0)]
    #[case(i32_rem_u, -1, 7, 3)]
    fn i32_arithmetic(
        #[case] op: fn(&mut Stack) -> Result<(), RuntimeError>,
        #[case] a: i32,
        #[case] b: i32,
        #[case] expected: i32,
    ) {
        assert_eq!(run_i32(op, a, b).unwrap(), expected);
    }

    #[rstest]
    #[case(i32_div_s, 1, 0, Trap::DivideByZero)]
    #[case(i32_div_u, 1, 0, Trap::DivideByZero)]
    #[case(i32_rem_s, 1, 0, Trap::DivideByZero)]
    #[case(i32_rem_u, 1, 0, Trap::DivideByZero)]
    #[case(i32_div_s, i32::MIN, -1, Trap::IntegerOverflow)]
    fn i32_arithmetic_traps(
        #[case] op: fn(&mut Stack) -> Result<(), RuntimeError>,
        #[case] a: i32,
        #[case] b: i32,
        #[case] trap: Trap,
    ) {
        assert_eq!(run_i32(op, a, b), Err(trap.into()));
    }

    #[test]
    fn i64_division_overflow() {
        let mut stack = Stack::new();
        stack.push(Value::I64(i64::MIN));
        stack.push(Value::I64(-1));
        assert_eq!(i64_div_s(&mut stack), Err(Trap::IntegerOverflow.into()));
    }

    #[rstest]
    #[case(2.5, 2.0)]
    #[case(3.5, 4.0)]
    #[case(-2.5, -2.0)]
    #[case(1.4, 1.0)]
    fn nearest_rounds_half_to_even(#[case] input: f64, #[case] expected: f64) {
        let mut stack = Stack::new();
        stack.push(Value::F64(input));
        f64_nearest(&mut stack).unwrap();
        assert_eq!(stack.pop_f64().unwrap(), expected);
    }

    #[test]
    fn min_max_signed_zero_and_nan() {
        let mut stack = Stack::new();
        stack.push(Value::F32(0.0));
        stack.push(Value::F32(-0.0));
        f32_min(&mut stack).unwrap();
        assert!(stack.pop_f32().unwrap().is_sign_negative());

        stack.push(Value::F64(f64::NAN));
        stack.push(Value::F64(1.0));
        f64_max(&mut stack).unwrap();
        assert!(stack.pop_f64().unwrap().is_nan());
    }
}
