//! Math functions

use super::arg;
use crate::error::{FormulaError, FormulaResult};
use costflow_core::Value;

/// ROUND function: `round(x, digits?)`, half toward positive infinity
pub fn fn_round(args: &[Value]) -> FormulaResult<Value> {
    let number = arg(args, 0).to_number();
    let digits = match args.get(1) {
        None | Some(Value::Null) => 0,
        Some(v) => {
            let d = v.to_number();
            if !d.is_finite() {
                return Err(FormulaError::Argument(format!(
                    "round: digits must be a number, got {}",
                    v.type_name()
                )));
            }
            d.trunc().clamp(-15.0, 15.0) as i32
        }
    };

    let rounded = if digits >= 0 {
        let multiplier = 10_f64.powi(digits);
        (number * multiplier + 0.5).floor() / multiplier
    } else {
        let divisor = 10_f64.powi(-digits);
        (number / divisor + 0.5).floor() * divisor
    };
    Ok(Value::Number(rounded))
}

/// CEIL function
pub fn fn_ceil(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(arg(args, 0).to_number().ceil()))
}

/// FLOOR function
pub fn fn_floor(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(arg(args, 0).to_number().floor()))
}

/// ABS function
pub fn fn_abs(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(arg(args, 0).to_number().abs()))
}

/// MIN function: variadic, or a single array argument
pub fn fn_min(args: &[Value]) -> FormulaResult<Value> {
    extremum("min", args, f64::min)
}

/// MAX function: variadic, or a single array argument
pub fn fn_max(args: &[Value]) -> FormulaResult<Value> {
    extremum("max", args, f64::max)
}

fn extremum(name: &str, args: &[Value], pick: fn(f64, f64) -> f64) -> FormulaResult<Value> {
    let items = match args {
        [Value::Array(items)] => items.as_slice(),
        _ => args,
    };

    let mut numbers = items.iter().map(Value::to_number);
    let first = numbers
        .next()
        .ok_or_else(|| FormulaError::Argument(format!("{}: no values", name)))?;

    // f64::min/max skip NaN; a non-numeric argument must poison the result
    let result = numbers.try_fold(first, |acc, n| {
        if n.is_nan() || acc.is_nan() {
            None
        } else {
            Some(pick(acc, n))
        }
    });

    Ok(Value::Number(result.unwrap_or(f64::NAN)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: FormulaResult<Value>) -> f64 {
        v.unwrap().to_number()
    }

    #[test]
    fn test_round() {
        assert_eq!(num(fn_round(&[Value::from(2.5)])), 3.0);
        assert_eq!(num(fn_round(&[Value::from(-2.5)])), -2.0);
        assert_eq!(num(fn_round(&[Value::from(2.4)])), 2.0);
        assert_eq!(num(fn_round(&[Value::from(3.14159), Value::from(2.0)])), 3.14);
        assert_eq!(num(fn_round(&[Value::from(1234.0), Value::from(-2.0)])), 1200.0);
        assert_eq!(num(fn_round(&[Value::from("7.6")])), 8.0);
        assert!(num(fn_round(&[Value::Null])).is_nan());
        assert!(fn_round(&[Value::from(1.0), Value::from("x")]).is_err());
    }

    #[test]
    fn test_ceil_floor_abs() {
        assert_eq!(num(fn_ceil(&[Value::from(1.2)])), 2.0);
        assert_eq!(num(fn_floor(&[Value::from(-1.2)])), -2.0);
        assert_eq!(num(fn_abs(&[Value::from(-3.0)])), 3.0);
    }

    #[test]
    fn test_min_max() {
        let args = [Value::from(3.0), Value::from("1"), Value::from(2.0)];
        assert_eq!(num(fn_min(&args)), 1.0);
        assert_eq!(num(fn_max(&args)), 3.0);

        let array = [Value::Array(vec![Value::from(4.0), Value::from(9.0)])];
        assert_eq!(num(fn_max(&array)), 9.0);
        assert_eq!(num(fn_min(&array)), 4.0);

        assert!(num(fn_max(&[Value::from(1.0), Value::from("abc")])).is_nan());
        assert!(fn_min(&[Value::Array(vec![])]).is_err());
    }
}
