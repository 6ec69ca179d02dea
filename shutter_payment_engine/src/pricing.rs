//! Cart pricing.
//!
//! Pure price computation for a cart/order line. No I/O and no clock: the same inputs always produce the same
//! price, so the buyer-visible cart total and the charged order total are computed by one code path.
//!
//! Price resolution, in order:
//! 1. An explicit license price on the item always wins.
//! 2. Otherwise the collection's base price applies, falling back to the platform default when the base price is
//!    unset or non-positive.
//! 3. If the collection defines volume discount tiers, the tier with the largest minimum quantity that the order
//!    reaches (counting items of the *same collection* in the same order) replaces the base price, provided the
//!    tier price is positive.

use spg_common::Cents;

/// A volume discount tier defined by a seller on one of their collections: "buy at least `min_quantity` items from
/// this collection and each costs `price`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeTier {
    pub min_quantity: u32,
    pub price: Cents,
}

/// The pricing-relevant view of the collection an item belongs to. The catalog itself lives outside this crate;
/// checkout supplies this snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPricing {
    pub collection_id: String,
    pub base_price: Option<Cents>,
    pub tiers: Vec<VolumeTier>,
}

/// One cart line as submitted to checkout, before a price has been fixed.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub asset_id: String,
    pub seller_id: String,
    /// Set when the buyer selected an explicit license for this asset.
    pub license_price: Option<Cents>,
    pub collection: Option<CollectionPricing>,
}

impl CartItem {
    fn collection_id(&self) -> Option<&str> {
        self.collection.as_ref().map(|c| c.collection_id.as_str())
    }
}

/// Computes the payable price of `item` within the context of the whole order.
pub fn price_item(item: &CartItem, all_items: &[CartItem], default_price: Cents) -> Cents {
    if let Some(license_price) = item.license_price {
        return license_price;
    }
    let collection = match &item.collection {
        Some(c) => c,
        None => return default_price,
    };
    let base_price = match collection.base_price {
        Some(p) if p.is_positive() => p,
        _ => default_price,
    };
    if collection.tiers.is_empty() {
        return base_price;
    }
    let same_collection_count =
        all_items.iter().filter(|i| i.collection_id() == Some(collection.collection_id.as_str())).count() as u32;
    // Best-matching tier: the largest minimum quantity the order reaches. Ties on min_quantity keep the first
    // definition; the tier price is deliberately not compared.
    let best = collection
        .tiers
        .iter()
        .filter(|t| t.min_quantity <= same_collection_count)
        .max_by_key(|t| t.min_quantity);
    match best {
        Some(tier) if tier.price.is_positive() => tier.price,
        _ => base_price,
    }
}

/// Prices every item of a cart. The result is index-aligned with `items`.
pub fn price_cart(items: &[CartItem], default_price: Cents) -> Vec<Cents> {
    items.iter().map(|item| price_item(item, items, default_price)).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn default_price() -> Cents {
        Cents::from(1000)
    }

    fn collection_item(collection_id: &str, base: i64, tiers: Vec<VolumeTier>) -> CartItem {
        CartItem {
            asset_id: format!("asset-{collection_id}"),
            seller_id: "seller-1".into(),
            license_price: None,
            collection: Some(CollectionPricing {
                collection_id: collection_id.into(),
                base_price: Some(Cents::from(base)),
                tiers,
            }),
        }
    }

    fn tiers() -> Vec<VolumeTier> {
        vec![
            VolumeTier { min_quantity: 3, price: Cents::from(800) },
            VolumeTier { min_quantity: 5, price: Cents::from(600) },
        ]
    }

    #[test]
    fn license_price_always_overrides() {
        let mut item = collection_item("c1", 1500, tiers());
        item.license_price = Some(Cents::from(2000));
        let order = vec![item.clone(), item.clone(), item.clone(), item.clone()];
        // Four same-collection items would hit the min:3 tier at R$8.00, but the license price wins.
        assert_eq!(price_item(&order[0], &order, default_price()), Cents::from(2000));
    }

    #[test]
    fn best_matching_tier_not_cheapest() {
        let item = collection_item("c1", 1500, tiers());
        let order = vec![item.clone(), item.clone(), item.clone(), item.clone()];
        // Exactly 4 items: the min:3 tier applies (min:5 is not reached), even though min:5 is cheaper.
        for it in &order {
            assert_eq!(price_item(it, &order, default_price()), Cents::from(800));
        }
    }

    #[test]
    fn tier_reached_exactly() {
        let item = collection_item("c1", 1500, tiers());
        let order = vec![item.clone(); 5];
        assert_eq!(price_item(&order[0], &order, default_price()), Cents::from(600));
    }

    #[test]
    fn below_all_tiers_uses_base_price() {
        let item = collection_item("c1", 1500, tiers());
        let order = vec![item.clone(), item.clone()];
        assert_eq!(price_item(&order[0], &order, default_price()), Cents::from(1500));
    }

    #[test]
    fn other_collections_do_not_count() {
        let a = collection_item("c1", 1500, tiers());
        let b = collection_item("c2", 900, vec![]);
        let order = vec![a.clone(), a.clone(), b.clone(), b.clone()];
        // Only two c1 items in the order, so no tier applies to them.
        assert_eq!(price_item(&order[0], &order, default_price()), Cents::from(1500));
        assert_eq!(price_item(&order[2], &order, default_price()), Cents::from(900));
    }

    #[test]
    fn missing_or_nonpositive_base_price_falls_back_to_default() {
        let mut item = collection_item("c1", 0, vec![]);
        let order = vec![item.clone()];
        assert_eq!(price_item(&order[0], &order, default_price()), default_price());

        item.collection.as_mut().unwrap().base_price = None;
        let order = vec![item.clone()];
        assert_eq!(price_item(&order[0], &order, default_price()), default_price());

        item.collection = None;
        let order = vec![item.clone()];
        assert_eq!(price_item(&order[0], &order, default_price()), default_price());
    }

    #[test]
    fn nonpositive_tier_price_falls_back_to_base() {
        let item = collection_item("c1", 1500, vec![VolumeTier { min_quantity: 2, price: Cents::from(0) }]);
        let order = vec![item.clone(), item.clone()];
        assert_eq!(price_item(&order[0], &order, default_price()), Cents::from(1500));
    }

    #[test]
    fn price_cart_is_index_aligned() {
        let a = collection_item("c1", 1500, tiers());
        let b = collection_item("c2", 900, vec![]);
        let order = vec![a.clone(), a.clone(), a.clone(), b];
        let prices = price_cart(&order, default_price());
        assert_eq!(prices, vec![Cents::from(800), Cents::from(800), Cents::from(800), Cents::from(900)]);
    }
}
