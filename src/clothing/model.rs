use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A monetary amount in pence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pence(pub i64);

impl Pence {
    /// Formats the amount in pounds with thousands separators, e.g. `£1,200.55`.
    pub fn as_pounds(self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let pounds = (abs / 100).to_string();

        let mut grouped = String::with_capacity(pounds.len() + pounds.len() / 3);
        for (i, digit) in pounds.chars().enumerate() {
            if i > 0 && (pounds.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(digit);
        }

        format!("{sign}£{grouped}.{:02}", abs % 100)
    }
}

impl fmt::Display for Pence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_pounds())
    }
}

/// A clothing rule violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `pricePence` is below zero.
    #[error("Clothing Price must be greater than or equal to 0")]
    NegativePrice,
    /// `clothingType` is blank.
    #[error("Clothing Type must not be empty")]
    EmptyClothingType,
    /// `description` is blank.
    #[error("Clothing Description must not be empty")]
    EmptyDescription,
    /// `brand` is blank.
    #[error("Clothing Brand must not be empty")]
    EmptyBrand,
    /// `store` is blank.
    #[error("Clothing Store must not be empty")]
    EmptyStore,
    /// `size` is blank.
    #[error("Clothing Size must not be empty")]
    EmptySize,
}

/// A clothing item owned by a single user.
///
/// `user_id` is always the authenticated subject, never a client-supplied
/// value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Clothing {
    /// Assigned by the repository on save.
    pub id: String,
    /// Owning tenant.
    pub user_id: String,
    /// Kind of garment, e.g. `Jumper`.
    pub clothing_type: String,
    /// Free-text description.
    pub description: String,
    /// Brand name.
    pub brand: String,
    /// Where it was bought.
    pub store: String,
    /// Optional picture, empty when absent.
    pub image_url: String,
    /// Purchase price.
    #[serde(rename = "pricePence")]
    pub price: Pence,
    /// Label size, free text.
    pub size: String,
}

impl Clothing {
    /// Fields a create or update request body must carry.
    pub const REQUIRED_FIELDS: [&'static str; 6] = [
        "pricePence",
        "clothingType",
        "description",
        "brand",
        "store",
        "size",
    ];

    /// Checks the item rules, reporting the first violation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.price.0 < 0 {
            return Err(ValidationError::NegativePrice);
        }

        let text_rules = [
            (&self.clothing_type, ValidationError::EmptyClothingType),
            (&self.description, ValidationError::EmptyDescription),
            (&self.brand, ValidationError::EmptyBrand),
            (&self.store, ValidationError::EmptyStore),
            (&self.size, ValidationError::EmptySize),
        ];
        for (value, err) in text_rules {
            if value.trim().is_empty() {
                return Err(err);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn jumper() -> Clothing {
    Clothing {
        price: Pence(2000),
        clothing_type: "Jumper".into(),
        description: "Red Loosefit Jumper".into(),
        brand: "A&B".into(),
        store: "Totally Real Store".into(),
        size: "Medium".into(),
        ..Default::default()
    }
}
