//! Conversions between numeric types
//!
//! Float-to-integer truncation traps: NaN gives `InvalidConvToInt`, a value
//! whose truncation does not fit the target gives `IntegerOverflow`.

use super::{RuntimeError, Stack, Trap, Value};

fn checked_trunc(value: f64, lower_exclusive: f64, upper_exclusive: f64) -> Result<f64, Trap> {
    if value.is_nan() {
        return Err(Trap::InvalidConvToInt);
    }
    let truncated = value.trunc();
    if truncated <= lower_exclusive || truncated >= upper_exclusive {
        return Err(Trap::IntegerOverflow);
    }
    Ok(truncated)
}

fn trunc_to_i32_s(value: f64) -> Result<i32, Trap> {
    checked_trunc(value, -2_147_483_649.0, 2_147_483_648.0).map(|t| t as i32)
}

fn trunc_to_i32_u(value: f64) -> Result<i32, Trap> {
    checked_trunc(value, -1.0, 4_294_967_296.0).map(|t| t as u32 as i32)
}

fn trunc_to_i64_s(value: f64) -> Result<i64, Trap> {
    // -2^63 is exactly representable; anything below it is not
    if value.is_nan() {
        return Err(Trap::InvalidConvToInt);
    }
    let truncated = value.trunc();
    if truncated < -9_223_372_036_854_775_808.0 || truncated >= 9_223_372_036_854_775_808.0 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(truncated as i64)
}

fn trunc_to_i64_u(value: f64) -> Result<i64, Trap> {
    checked_trunc(value, -1.0, 18_446_744_073_709_551_616.0).map(|t| t as u64 as i64)
}

pub fn i32_wrap_i64(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::I32(c as i32));
    Ok(())
}

pub fn i64_extend_i32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::I64(c as i64));
    Ok(())
}

pub fn i64_extend_i32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::I64(c as u32 as i64));
    Ok(())
}

pub fn i32_extend8_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::I32(c as i8 as i32));
    Ok(())
}

pub fn i32_extend16_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::I32(c as i16 as i32));
    Ok(())
}

pub fn i64_extend8_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::I64(c as i8 as i64));
    Ok(())
}

pub fn i64_extend16_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::I64(c as i16 as i64));
    Ok(())
}

pub fn i64_extend32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::I64(c as i32 as i64));
    Ok(())
}

pub fn i32_trunc_f32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f32()?;
    stack.push(Value::I32(trunc_to_i32_s(c as f64)?));
    Ok(())
}

pub fn i32_trunc_f32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f32()?;
    stack.push(Value::I32(trunc_to_i32_u(c as f64)?));
    Ok(())
}

pub fn i32_trunc_f64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f64()?;
    stack.push(Value::I32(trunc_to_i32_s(c)?));
    Ok(())
}

pub fn i32_trunc_f64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f64()?;
    stack.push(Value::I32(trunc_to_i32_u(c)?));
    Ok(())
}

pub fn i64_trunc_f32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f32()?;
    stack.push(Value::I64(trunc_to_i64_s(c as f64)?));
    Ok(())
}

pub fn i64_trunc_f32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f32()?;
    stack.push(Value::I64(trunc_to_i64_u(c as f64)?));
    Ok(())
}

pub fn i64_trunc_f64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f64()?;
    stack.push(Value::I64(trunc_to_i64_s(c)?));
    Ok(())
}

pub fn i64_trunc_f64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f64()?;
    stack.push(Value::I64(trunc_to_i64_u(c)?));
    Ok(())
}

pub fn f32_convert_i32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::F32(c as f32));
    Ok(())
}

pub fn f32_convert_i32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::F32(c as u32 as f32));
    Ok(())
}

pub fn f32_convert_i64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::F32(c as f32));
    Ok(())
}

pub fn f32_convert_i64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::F32(c as u64 as f32));
    Ok(())
}

pub fn f64_convert_i32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::F64(c as f64));
    Ok(())
}

pub fn f64_convert_i32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::F64(c as u32 as f64));
    Ok(())
}

pub fn f64_convert_i64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::F64(c as f64));
    Ok(())
}

pub fn f64_convert_i64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::F64(c as u64 as f64));
    Ok(())
}

pub fn f32_demote_f64(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f64()?;
    stack.push(Value::F32(c as f32));
    Ok(())
}

pub fn f64_promote_f32(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f32()?;
    stack.push(Value::F64(c as f64));
    Ok(())
}

pub fn i32_reinterpret_f32(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f32()?;
    stack.push(Value::I32(c.to_bits() as i32));
    Ok(())
}

pub fn i64_reinterpret_f64(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_f64()?;
    stack.push(Value::I64(c.to_bits() as i64));
    Ok(())
}

pub fn f32_reinterpret_i32(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push(Value::F32(f32::from_bits(c as u32)));
    Ok(())
}

pub fn f64_reinterpret_i64(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i64()?;
    stack.push(Value::F64(f64::from_bits(c as u64)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(-2147483648.9, Ok(i32::MIN))]
    #[case(2147483647.9, Ok(i32::MAX))]
    #[case(2147483648.0, Err(Trap::IntegerOverflow))]
    #[case(-2147483649.0, Err(Trap::IntegerOverflow))]
    #[case(f64::NAN, Err(Trap::InvalidConvToInt))]
    #[case(f64::INFINITY, Err(Trap::IntegerOverflow))]
    fn truncation_to_signed_i32(#[case] input: f64, #[case] expected: Result<i32, Trap>) {
        assert_eq!(trunc_to_i32_s(input), expected);
    }

    #[rstest]
    #[case(-0.9, Ok(0))]
    #[case(4294967295.5, Ok(-1))]
    #[case(-1.0, Err(Trap::IntegerOverflow))]
    #[case(4294967296.0, Err(Trap::IntegerOverflow))]
    fn truncation_to_unsigned_i32(#[case] input: f64, #[case] expected: Result<i32, Trap>) {
        assert_eq!(trunc_to_i32_u(input), expected);
    }

    #[test]
    fn truncation_to_i64_bounds() {
        assert_eq!(trunc_to_i64_s(-9_223_372_036_854_775_808.0), Ok(i64::MIN));
        assert_eq!(trunc_to_i64_s(9_223_372_036_854_775_808.0), Err(Trap::IntegerOverflow));
        assert_eq!(trunc_to_i64_u(18_446_744_073_709_549_568.0), Ok(-2048));
    }

    #[test]
    fn trapping_conversion_surfaces_as_error() {
        let mut stack = Stack::new();
        stack.push(Value::F32(f32::NAN));
        assert_eq!(i32_trunc_f32_s(&mut stack), Err(Trap::InvalidConvToInt.into()));
    }

    #[test]
    fn sign_extension_and_wrap() {
        let mut stack = Stack::new();
        stack.push(Value::I32(0x80));
        i32_extend8_s(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), -128);
        stack.push(Value::I64(0x1_0000_0002));
        i32_wrap_i64(&mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 2);
        stack.push(Value::I32(-1));
        i64_extend_i32_u(&mut stack).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 0xffff_ffff);
    }
}
