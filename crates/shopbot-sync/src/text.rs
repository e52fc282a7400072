//! Searchable text derived from a product record

use shopbot_core::ProductRecord;

/// Build the text that gets embedded for a product
///
/// `"{name}. {description}. Category: {category}. Price: {price}€"`, with
/// empty description or category segments and a missing price left out.
/// The output depends only on the record, so re-indexing an unchanged
/// product produces the same embedding input.
pub fn build_searchable_text(product: &ProductRecord) -> String {
    let mut parts = vec![product.name.trim().to_string()];

    let description = product.description.trim();
    if !description.is_empty() {
        parts.push(description.to_string());
    }

    let category = product.category.trim();
    if !category.is_empty() {
        parts.push(format!("Category: {category}"));
    }

    if let Some(price) = product.price {
        parts.push(format!("Price: {price}€"));
    }

    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_record() {
        let product = ProductRecord::new(5u64, "AirPods Pro 2")
            .with_description("Écouteurs sans fil")
            .with_category("Audio")
            .with_price(279.0);

        assert_eq!(
            build_searchable_text(&product),
            "AirPods Pro 2. Écouteurs sans fil. Category: Audio. Price: 279€"
        );
    }

    #[test]
    fn test_fractional_price() {
        let product = ProductRecord::new(1u64, "Red Shoe").with_price(49.9);
        assert_eq!(build_searchable_text(&product), "Red Shoe. Price: 49.9€");
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let product = ProductRecord::new(2u64, "Blue Hat").with_category("Hats");
        assert_eq!(build_searchable_text(&product), "Blue Hat. Category: Hats");

        let bare = ProductRecord::new(3u64, "Scarf");
        assert_eq!(build_searchable_text(&bare), "Scarf");
    }

    proptest! {
        #[test]
        fn prop_text_is_deterministic(
            name in "[A-Za-z ]{1,20}",
            description in "[a-z ]{0,40}",
            category in "[A-Za-z]{0,10}",
            price in proptest::option::of(0.0f64..10_000.0),
        ) {
            let mut product = ProductRecord::new(1u64, name)
                .with_description(description)
                .with_category(category);
            product.price = price;

            let first = build_searchable_text(&product);
            let second = build_searchable_text(&product.clone());
            prop_assert_eq!(&first, &second);
            prop_assert!(first.starts_with(product.name.trim()));
        }
    }
}
