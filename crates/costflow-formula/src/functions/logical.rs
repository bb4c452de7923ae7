//! Logical functions

use super::arg;
use crate::error::FormulaResult;
use costflow_core::Value;

/// IF function: `if(cond, then, else?)`. Both branches are already
/// evaluated; the condition only selects one of them.
pub fn fn_if(args: &[Value]) -> FormulaResult<Value> {
    let chosen = if arg(args, 0).truthy() {
        arg(args, 1)
    } else {
        arg(args, 2)
    };
    Ok(chosen.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if() {
        let args = [Value::Bool(true), Value::from(1.0), Value::from(2.0)];
        assert_eq!(fn_if(&args).unwrap(), Value::Number(1.0));

        let args = [Value::from(""), Value::from(1.0), Value::from(2.0)];
        assert_eq!(fn_if(&args).unwrap(), Value::Number(2.0));

        // Missing else branch is null
        let args = [Value::Bool(false), Value::from("yes")];
        assert_eq!(fn_if(&args).unwrap(), Value::Null);
    }
}
