//! Price tiers, tiered price lookup and markup
//!
//! A tier is a `[quantity_from, quantity_to]` band (`quantity_to = None` is
//! open-ended) carrying either a price or a markup. The same type serves
//! catalog price curves (read by `getPrice`) and per-price-type markup
//! presets (read by the markup pass).

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Unit of a tier's `price` when used as a markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupUnit {
    /// Absolute amount added to the base
    #[default]
    Currency,
    /// Percentage of the base
    Percent,
}

/// One quantity band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    #[serde(default)]
    pub quantity_from: f64,
    #[serde(default)]
    pub quantity_to: Option<f64>,
    pub price: f64,
    #[serde(default)]
    pub unit: MarkupUnit,
}

impl PriceTier {
    pub fn new(quantity_from: f64, quantity_to: Option<f64>, price: f64) -> Self {
        Self {
            quantity_from,
            quantity_to,
            price,
            unit: MarkupUnit::Currency,
        }
    }

    pub fn percent(mut self) -> Self {
        self.unit = MarkupUnit::Percent;
        self
    }

    /// `quantity_from <= q <= quantity_to`
    pub fn contains(&self, quantity: f64) -> bool {
        quantity >= self.quantity_from && self.quantity_to.map_or(true, |to| quantity <= to)
    }

    /// The band covers `q` or starts above it (billing at the floor is possible)
    pub fn covers_or_exceeds(&self, quantity: f64) -> bool {
        self.quantity_to.map_or(true, |to| quantity <= to)
    }

    /// Read a tier out of a context record.
    ///
    /// Accepts `quantityFrom`/`from`, `quantityTo`/`to`, `price`/`value` and an
    /// optional `unit` (`"percent"` or `"%"`) or boolean `isPercent`.
    pub fn from_value(value: &Value) -> Option<PriceTier> {
        let map = value.as_record()?;
        let field = |names: &[&str]| names.iter().find_map(|n| map.get(*n));

        let price = field(&["price", "value"][..])?.numeric()?;
        let quantity_from = match field(&["quantityFrom", "from"][..]) {
            Some(v) if !v.is_null() => v.numeric()?,
            _ => 0.0,
        };
        let quantity_to = match field(&["quantityTo", "to"][..]) {
            Some(v) if !v.is_null() => Some(v.numeric()?),
            _ => None,
        };
        let percent = match (map.get("unit"), map.get("isPercent")) {
            (Some(Value::String(u)), _) => u.eq_ignore_ascii_case("percent") || u == "%",
            (_, Some(flag)) => flag.truthy(),
            _ => false,
        };

        Some(PriceTier {
            quantity_from,
            quantity_to,
            price,
            unit: if percent {
                MarkupUnit::Percent
            } else {
                MarkupUnit::Currency
            },
        })
    }

    /// Apply this tier as a markup on `base`
    pub fn apply_markup(&self, base: f64) -> f64 {
        match self.unit {
            MarkupUnit::Percent => base * (1.0 + self.price / 100.0),
            MarkupUnit::Currency => base + self.price,
        }
    }
}

/// Tier lookup mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupMode {
    /// Price of the single tier containing the quantity
    Exact,
    /// Cheapest total across tiers, billing at least each tier's floor
    #[default]
    Cheapest,
}

/// Outcome of a tier selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    /// Index of the chosen tier in the input list
    pub tier_index: usize,
    pub unit_price: f64,
    /// `max(quantity, quantity_from)` in cheapest mode, `quantity` in exact mode
    pub billed_quantity: f64,
    pub total: f64,
}

/// Select the tier for `quantity`.
///
/// Exact mode picks the first tier containing the quantity. Cheapest mode
/// considers every tier whose range covers or exceeds the quantity and picks
/// the lowest `max(quantity, from) * price`, breaking ties by lower unit price
/// and then lower billed quantity.
pub fn select_tier(quantity: f64, tiers: &[PriceTier], mode: LookupMode) -> Option<PriceQuote> {
    match mode {
        LookupMode::Exact => tiers
            .iter()
            .position(|t| t.contains(quantity))
            .map(|idx| PriceQuote {
                tier_index: idx,
                unit_price: tiers[idx].price,
                billed_quantity: quantity,
                total: quantity * tiers[idx].price,
            }),
        LookupMode::Cheapest => tiers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.covers_or_exceeds(quantity))
            .map(|(idx, t)| {
                let billed = quantity.max(t.quantity_from);
                PriceQuote {
                    tier_index: idx,
                    unit_price: t.price,
                    billed_quantity: billed,
                    total: billed * t.price,
                }
            })
            .min_by(compare_quotes),
    }
}

fn compare_quotes(a: &PriceQuote, b: &PriceQuote) -> Ordering {
    a.total
        .total_cmp(&b.total)
        .then(a.unit_price.total_cmp(&b.unit_price))
        .then(a.billed_quantity.total_cmp(&b.billed_quantity))
        // earlier tier wins a full tie
        .then(a.tier_index.cmp(&b.tier_index))
}

/// Unit price for `quantity`, or `None` when no tier applies.
///
/// A quantity of exactly zero always prices at zero.
///
/// # Example
/// ```rust
/// use costflow_core::pricing::{get_price, PriceTier};
///
/// let tiers = vec![
///     PriceTier::new(1.0, Some(99.0), 10.0),
///     PriceTier::new(100.0, None, 8.0),
/// ];
/// assert_eq!(get_price(50.0, &tiers, true), Some(10.0));
/// // 95 units at 10 cost more than 100 units at 8
/// assert_eq!(get_price(95.0, &tiers, false), Some(8.0));
/// assert_eq!(get_price(0.0, &tiers, true), Some(0.0));
/// ```
pub fn get_price(quantity: f64, tiers: &[PriceTier], exact: bool) -> Option<f64> {
    if quantity == 0.0 {
        return Some(0.0);
    }
    let mode = if exact {
        LookupMode::Exact
    } else {
        LookupMode::Cheapest
    };
    select_tier(quantity, tiers, mode).map(|q| q.unit_price)
}

/// A named sale-price preset: one markup curve per price type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceType {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tiers: Vec<PriceTier>,
}

/// Tier used for markup at `quantity`: the first tier containing it, else the
/// first defined tier. The flag is `true` when the fallback fired.
pub fn markup_tier(quantity: f64, tiers: &[PriceTier]) -> Option<(usize, bool)> {
    match tiers.iter().position(|t| t.contains(quantity)) {
        Some(idx) => Some((idx, false)),
        None if !tiers.is_empty() => Some((0, true)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn curve() -> Vec<PriceTier> {
        vec![
            PriceTier::new(1.0, Some(99.0), 10.0),
            PriceTier::new(100.0, Some(499.0), 8.0),
            PriceTier::new(500.0, None, 7.0),
        ]
    }

    #[test]
    fn test_zero_quantity_is_free() {
        assert_eq!(get_price(0.0, &curve(), false), Some(0.0));
        assert_eq!(get_price(0.0, &[], true), Some(0.0));
    }

    #[test]
    fn test_exact_mode() {
        assert_eq!(get_price(10.0, &curve(), true), Some(10.0));
        assert_eq!(get_price(100.0, &curve(), true), Some(8.0));
        assert_eq!(get_price(10_000.0, &curve(), true), Some(7.0));
        // gap below the first tier
        assert_eq!(get_price(0.5, &curve(), true), None);
    }

    #[test]
    fn test_exact_mode_no_covering_tier() {
        let tiers = vec![PriceTier::new(10.0, Some(20.0), 3.0)];
        assert_eq!(get_price(25.0, &tiers, true), None);
        assert_eq!(get_price(5.0, &tiers, true), None);
    }

    #[test]
    fn test_cheapest_mode_bills_floor() {
        // 95 * 10 = 950 vs 100 * 8 = 800 vs 500 * 7 = 3500
        let quote = select_tier(95.0, &curve(), LookupMode::Cheapest).unwrap();
        assert_eq!(quote.tier_index, 1);
        assert_eq!(quote.billed_quantity, 100.0);
        assert_eq!(quote.total, 800.0);

        // 20 * 10 = 200 is cheapest
        assert_eq!(get_price(20.0, &curve(), false), Some(10.0));
    }

    #[test]
    fn test_cheapest_mode_ignores_tiers_below_quantity() {
        let tiers = vec![
            PriceTier::new(1.0, Some(10.0), 1.0),
            PriceTier::new(11.0, None, 5.0),
        ];
        assert_eq!(get_price(50.0, &tiers, false), Some(5.0));
        let closed = vec![PriceTier::new(1.0, Some(10.0), 1.0)];
        assert_eq!(get_price(50.0, &closed, false), None);
    }

    #[test]
    fn test_cheapest_tie_breaks() {
        // Same total (100): lower unit price wins
        let tiers = vec![
            PriceTier::new(1.0, None, 10.0),
            PriceTier::new(20.0, None, 5.0),
        ];
        let quote = select_tier(10.0, &tiers, LookupMode::Cheapest).unwrap();
        assert_eq!(quote.total, 100.0);
        assert_eq!(quote.tier_index, 1);

        // Same total and unit price: lower billed quantity wins
        let tiers = vec![
            PriceTier::new(50.0, None, 2.0),
            PriceTier::new(1.0, None, 2.0),
        ];
        let quote = select_tier(50.0, &tiers, LookupMode::Cheapest).unwrap();
        assert_eq!(quote.billed_quantity, 50.0);
    }

    #[test]
    fn test_from_value() {
        let v = Value::from(json!({ "from": 5, "to": null, "price": "12.5", "unit": "percent" }));
        let tier = PriceTier::from_value(&v).unwrap();
        assert_eq!(tier.quantity_from, 5.0);
        assert_eq!(tier.quantity_to, None);
        assert_eq!(tier.price, 12.5);
        assert_eq!(tier.unit, MarkupUnit::Percent);

        assert!(PriceTier::from_value(&Value::from(json!({ "from": 1 }))).is_none());
        assert!(PriceTier::from_value(&Value::from(3.0)).is_none());
    }

    #[test]
    fn test_markup() {
        let pct = PriceTier::new(0.0, None, 25.0).percent();
        assert_eq!(pct.apply_markup(200.0), 250.0);
        let abs = PriceTier::new(0.0, None, 15.0);
        assert_eq!(abs.apply_markup(200.0), 215.0);
    }

    #[test]
    fn test_markup_tier_fallback() {
        let tiers = vec![
            PriceTier::new(10.0, Some(20.0), 1.0),
            PriceTier::new(21.0, Some(30.0), 2.0),
        ];
        assert_eq!(markup_tier(25.0, &tiers), Some((1, false)));
        assert_eq!(markup_tier(5.0, &tiers), Some((0, true)));
        assert_eq!(markup_tier(5.0, &[]), None);
    }

    proptest! {
        #[test]
        fn prop_cheapest_is_minimal(q in 1.0f64..1000.0) {
            let tiers = curve();
            if let Some(best) = select_tier(q, &tiers, LookupMode::Cheapest) {
                for t in tiers.iter().filter(|t| t.covers_or_exceeds(q)) {
                    prop_assert!(best.total <= q.max(t.quantity_from) * t.price);
                }
            }
        }

        #[test]
        fn prop_exact_price_comes_from_containing_tier(q in 0.1f64..1000.0) {
            let tiers = curve();
            match get_price(q, &tiers, true) {
                Some(p) => prop_assert!(tiers.iter().any(|t| t.contains(q) && t.price == p)),
                None => prop_assert!(!tiers.iter().any(|t| t.contains(q))),
            }
        }
    }
}
