//! Prompt assembly: field resolution, the user prompt template and the
//! `generate_product_metadata` function schema shared by both providers.

use serde_json::{json, Value};

use crate::models::{FieldOverrides, Product, SchemaVersion};

pub const NOT_AVAILABLE: &str = "N/A";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const METADATA_FUNCTION: &str = "generate_product_metadata";
pub const METADATA_FUNCTION_DESCRIPTION: &str = "Generate SEO metadata and product short description.";

/// Product attributes after overrides and lookups are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFields {
    pub name: String,
    pub short_description: String,
    pub categories: String,
    pub price: String,
    pub brand: String,
    pub language: String,
}

impl ProductFields {
    /// Each field is the override when present, otherwise the stored value; empty ends up as "N/A".
    pub fn resolve(overrides: &FieldOverrides, product: Option<&Product>, category_names: &[String]) -> Self {
        let categories = product.map(|_| category_names.join(", "));
        Self {
            name: pick(&overrides.product_name, product.and_then(|p| p.name.clone())),
            short_description: pick(&overrides.short_description, product.and_then(|p| p.short_description.clone())),
            categories: pick(&overrides.product_categories, categories),
            price: pick(&overrides.product_price, product.and_then(|p| p.price).map(format_price)),
            brand: pick(&overrides.product_brand, product.and_then(|p| p.brand.clone())),
            language: overrides
                .language
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or(DEFAULT_LANGUAGE)
                .to_string(),
        }
    }

    pub fn language_directive(&self) -> String {
        format!("The description should be written in the following language: {}.", self.language)
    }
}

fn pick(over: &Option<String>, stored: Option<String>) -> String {
    let value = over.clone().or(stored).unwrap_or_default();
    if value.trim().is_empty() { NOT_AVAILABLE.to_string() } else { value }
}

/// Two decimals with thousands separators, e.g. `1,234.50`.
pub fn format_price(price: f64) -> String {
    let fixed = format!("{:.2}", price.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if price < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

/// What gets sent to a provider, independent of its wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub schema: SchemaVersion,
}

impl Prompt {
    pub fn new(system: impl Into<String>, fields: &ProductFields, schema: SchemaVersion) -> Self {
        Self { system: system.into(), user: build_user_prompt(fields, schema), schema }
    }
}

pub fn build_user_prompt(f: &ProductFields, schema: SchemaVersion) -> String {
    match schema {
        SchemaVersion::Structured => format!(
            "Product Information:\nName: {}\nCurrent Short Description: {}\nCategory: {}\nPrice: {}\nBrand: {}\n{}\n\n\
             Please generate SEO metadata including meta_title, meta_keywords, and meta_description along with a concise product description.",
            f.name, f.short_description, f.categories, f.price, f.brand, f.language_directive()
        ),
        SchemaVersion::Plain => format!(
            "Product Information:\nName: {}\nCurrent Short Description: {}\nCategory: {}\nPrice: {}\n{}\n\n\
             Please generate a concise and engaging product description.",
            f.name, f.short_description, f.categories, f.price, f.language_directive()
        ),
    }
}

/// JSON-schema parameters of `generate_product_metadata`: four required strings.
pub fn metadata_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "description": {
                "type": "string",
                "description": "The concise and engaging product description."
            },
            "meta_title": {
                "type": "string",
                "description": "SEO-optimized meta title for the product."
            },
            "meta_keywords": {
                "type": "string",
                "description": "SEO-optimized meta keywords for the product."
            },
            "meta_description": {
                "type": "string",
                "description": "SEO-optimized meta short description for the product."
            }
        },
        "required": ["description", "meta_title", "meta_keywords", "meta_description"]
    })
}
