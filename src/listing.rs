use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{ProductRecord, normalize_price};

const SUMMARY_CAP: usize = 8;

pub fn dedupe_by_id(products: Vec<ProductRecord>) -> Vec<ProductRecord> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|p| seen.insert(p.id.clone()))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub images: Vec<String>,
    pub brand: String,
    pub category: String,
    pub quantity: u32,
}

// The one place an unparseable price becomes 0: the add-to-cart boundary.
pub fn cart_line(product: &ProductRecord, quantity: u32) -> CartLine {
    let price = product
        .price
        .as_ref()
        .and_then(normalize_price)
        .map(|p| p.value)
        .unwrap_or(0.0);
    CartLine {
        id: product.id.clone(),
        name: product.name.clone(),
        description: product.description.clone().unwrap_or_default(),
        price,
        images: product.images.clone().unwrap_or_default(),
        brand: product.brand.clone().unwrap_or_default(),
        category: product.category.clone().unwrap_or_default(),
        quantity,
    }
}

pub fn products_markdown_summary(products: &[ProductRecord]) -> String {
    if products.is_empty() {
        return String::new();
    }

    let mut lines = vec![format!("### Product Matches ({})\n", products.len())];
    for product in products.iter().take(SUMMARY_CAP) {
        let brand = product
            .brand
            .as_deref()
            .map(|b| format!(" • {}", b.to_uppercase()))
            .unwrap_or_default();
        let price = product
            .price
            .as_ref()
            .and_then(normalize_price)
            .map(|p| format!(" — {} {:.2}", p.currency, p.value))
            .unwrap_or_default();
        lines.push(format!("- {}{}{}", product.name, price, brand));
        if let Some(description) = &product.description {
            let clipped: String = description.chars().take(160).collect();
            lines.push(format!("  \n  {}\n", clipped));
        }
    }
    lines.push("\nTip: You can refine the list (e.g., price, brand, age group).".into());
    lines.join("\n")
}
