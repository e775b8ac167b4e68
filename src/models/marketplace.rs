//! Supported marketplaces.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A marketplace that can be searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    Ebay,
    Aliexpress,
    Amazon,
}

impl Marketplace {
    pub const ALL: [Marketplace; 3] = [
        Marketplace::Ebay,
        Marketplace::Aliexpress,
        Marketplace::Amazon,
    ];

    /// Parse a marketplace name as used in routes and the CLI.
    /// `ali` is accepted as an alias for AliExpress.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ebay" => Some(Marketplace::Ebay),
            "aliexpress" | "ali" => Some(Marketplace::Aliexpress),
            "amazon" => Some(Marketplace::Amazon),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Marketplace::Ebay => "ebay",
            Marketplace::Aliexpress => "aliexpress",
            Marketplace::Amazon => "amazon",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
