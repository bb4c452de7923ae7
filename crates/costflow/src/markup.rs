//! Sale-price markup
//!
//! One sale price per price type: pick the markup tier whose quantity band
//! contains the requested quantity (or the first tier when none does), then
//! apply it to the offer total.

use costflow_core::pricing::markup_tier;
use costflow_core::PriceType;
use serde::Serialize;
use std::collections::BTreeMap;

/// Final price for one price type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePrice {
    pub price_type_id: String,
    pub name: Option<String>,
    /// Offer total the markup was applied to
    pub base: Option<f64>,
    pub price: Option<f64>,
    /// Index of the tier used, `None` when the price type has no tiers
    pub tier_index: Option<usize>,
    /// No tier contained the quantity and the first tier was used
    pub fallback_tier: bool,
}

/// Sale price of `base` at `quantity` for one price type
pub fn sale_price(base: Option<f64>, quantity: f64, price_type: &PriceType) -> SalePrice {
    let selected = markup_tier(quantity, &price_type.tiers);
    if let Some((index, true)) = selected {
        log::warn!(
            "Price type {}: no tier contains quantity {}, using tier {}",
            price_type.id,
            quantity,
            index
        );
    }

    let price = match selected {
        Some((index, _)) => base.map(|b| price_type.tiers[index].apply_markup(b)),
        None => base,
    };

    SalePrice {
        price_type_id: price_type.id.clone(),
        name: price_type.name.clone(),
        base,
        price,
        tier_index: selected.map(|(index, _)| index),
        fallback_tier: selected.map_or(false, |(_, fallback)| fallback),
    }
}

/// Sale prices keyed by price type id
pub fn apply_markups(
    base: Option<f64>,
    quantity: f64,
    price_types: &[PriceType],
) -> BTreeMap<String, SalePrice> {
    price_types
        .iter()
        .map(|pt| (pt.id.clone(), sale_price(base, quantity, pt)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use costflow_core::PriceTier;
    use pretty_assertions::assert_eq;

    fn retail() -> PriceType {
        PriceType {
            id: "retail".into(),
            name: Some("Retail".into()),
            tiers: vec![
                PriceTier::new(1.0, Some(99.0), 50.0).percent(),
                PriceTier::new(100.0, None, 30.0).percent(),
            ],
        }
    }

    #[test]
    fn test_percent_markup_by_quantity() {
        let price = sale_price(Some(200.0), 10.0, &retail());
        assert_eq!(price.price, Some(300.0));
        assert_eq!(price.tier_index, Some(0));
        assert!(!price.fallback_tier);

        let price = sale_price(Some(200.0), 150.0, &retail());
        assert_eq!(price.price, Some(260.0));
        assert_eq!(price.tier_index, Some(1));
    }

    #[test]
    fn test_first_tier_fallback() {
        let wholesale = PriceType {
            id: "wholesale".into(),
            name: None,
            tiers: vec![PriceTier::new(10.0, Some(20.0), 5.0)],
        };
        let price = sale_price(Some(100.0), 2.0, &wholesale);
        assert_eq!(price.price, Some(105.0));
        assert!(price.fallback_tier);
    }

    #[test]
    fn test_no_tiers_and_no_base() {
        let bare = PriceType {
            id: "cost".into(),
            name: None,
            tiers: vec![],
        };
        let price = sale_price(Some(80.0), 1.0, &bare);
        assert_eq!(price.price, Some(80.0));
        assert_eq!(price.tier_index, None);

        assert_eq!(sale_price(None, 1.0, &retail()).price, None);
    }

    #[test]
    fn test_apply_markups_keyed_by_id() {
        let prices = apply_markups(Some(10.0), 1.0, &[retail()]);
        assert_eq!(prices.keys().collect::<Vec<_>>(), vec!["retail"]);
        assert_eq!(prices["retail"].price, Some(15.0));
    }
}
