//! Status enums for catalog entities.

use serde::{Deserialize, Serialize};

/// Stock availability of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    /// Stock is above the low-stock threshold.
    #[default]
    InStock,
    /// Some stock remains but at or below the threshold.
    LimitedStock,
    /// Nothing left.
    OutOfStock,
}

impl InventoryStatus {
    /// Classify a stock level against a low-stock threshold.
    #[must_use]
    pub const fn classify(stock: i64, low_stock_threshold: i64) -> Self {
        if stock > low_stock_threshold {
            Self::InStock
        } else if stock > 0 {
            Self::LimitedStock
        } else {
            Self::OutOfStock
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InStock => "in stock",
            Self::LimitedStock => "limited stock",
            Self::OutOfStock => "out of stock",
        }
    }

    /// Whether the product can be bought at all.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        !matches!(self, Self::OutOfStock)
    }
}

/// Publication status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
}

impl ProductStatus {
    /// Parse the backend's `"1"`/`"0"` activity flag.
    #[must_use]
    pub fn from_flag(flag: &str) -> Self {
        if flag.trim() == "1" {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}
