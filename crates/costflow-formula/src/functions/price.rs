//! Tiered price lookup

use super::arg;
use crate::error::{FormulaError, FormulaResult};
use costflow_core::pricing::{get_price, PriceTier};
use costflow_core::Value;

/// GETPRICE function: `getPrice(quantity, tiers, exact?)`.
///
/// `tiers` is an array of tier records (or a record holding one under
/// `tiers`). Returns the unit price, or null when no tier applies. A zero
/// quantity is priced at zero whatever the tiers hold.
pub fn fn_get_price(args: &[Value]) -> FormulaResult<Value> {
    let quantity = arg(args, 0).to_number();
    if quantity.is_nan() {
        return Ok(Value::Null);
    }
    if quantity == 0.0 {
        return Ok(Value::Number(0.0));
    }

    let tiers = read_tiers(arg(args, 1))?;
    let exact = arg(args, 2).truthy();

    Ok(get_price(quantity, &tiers, exact).map_or(Value::Null, Value::Number))
}

fn read_tiers(value: &Value) -> FormulaResult<Vec<PriceTier>> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items.as_slice(),
        Value::Record(map) => match map.get("tiers") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => {
                return Err(FormulaError::Argument(
                    "getPrice: record has no `tiers` array".into(),
                ))
            }
        },
        other => {
            return Err(FormulaError::Argument(format!(
                "getPrice: tiers must be an array, got {}",
                other.type_name()
            )))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            PriceTier::from_value(item).ok_or_else(|| {
                FormulaError::Argument(format!("getPrice: tier {} has no numeric price", i))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers() -> Value {
        serde_json::from_str(
            r#"[{"quantityFrom":1,"quantityTo":99,"price":10},
                {"quantityFrom":100,"quantityTo":null,"price":8}]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_get_price_modes() {
        let exact = fn_get_price(&[Value::from(50.0), tiers(), Value::Bool(true)]).unwrap();
        assert_eq!(exact, Value::Number(10.0));

        let cheapest = fn_get_price(&[Value::from(95.0), tiers()]).unwrap();
        assert_eq!(cheapest, Value::Number(8.0));

        let none = fn_get_price(&[Value::from(0.5), tiers(), Value::Bool(true)]).unwrap();
        assert_eq!(none, Value::Null);
    }

    #[test]
    fn test_get_price_zero_and_missing() {
        assert_eq!(
            fn_get_price(&[Value::from(0.0), Value::Null]).unwrap(),
            Value::Number(0.0)
        );
        assert_eq!(fn_get_price(&[Value::Null, tiers()]).unwrap(), Value::Null);
        assert_eq!(fn_get_price(&[Value::from(3.0), Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn test_get_price_zero_ignores_malformed_tiers() {
        assert_eq!(
            fn_get_price(&[Value::from(0.0), Value::from("cheap")]).unwrap(),
            Value::Number(0.0)
        );
        let no_price = Value::Array(vec![Value::record([("from", Value::from(1.0))])]);
        assert_eq!(
            fn_get_price(&[Value::from("0"), no_price, Value::Bool(true)]).unwrap(),
            Value::Number(0.0)
        );
    }

    #[test]
    fn test_get_price_bad_tiers() {
        assert!(fn_get_price(&[Value::from(1.0), Value::from("cheap")]).is_err());
        let bad = Value::Array(vec![Value::record([("from", Value::from(1.0))])]);
        assert!(fn_get_price(&[Value::from(1.0), bad]).is_err());
        let wrapped = Value::record([("tiers", tiers())]);
        assert_eq!(
            fn_get_price(&[Value::from(150.0), wrapped]).unwrap(),
            Value::Number(8.0)
        );
    }
}
