//! Explicit conversion functions

use super::arg;
use crate::error::FormulaResult;
use costflow_core::Value;

/// TONUMBER function. Unparseable input yields NaN ("no value").
pub fn fn_to_number(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(arg(args, 0).to_number()))
}

/// TOSTRING function
pub fn fn_to_string(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::String(arg(args, 0).as_string()))
}
