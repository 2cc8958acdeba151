use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MAX_MARKET_LEN: usize = 32;

/// Normalized identifier for one logical market/region.
///
/// Used as the selector when assembling a snapshot: records for other
/// markets on the same paginated resource are filtered out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarketId(String);

impl MarketId {
    /// Parse and normalize a market id to lowercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyMarket);
        }

        let normalized = trimmed.to_ascii_lowercase();
        let len = normalized.chars().count();
        if len > MAX_MARKET_LEN {
            return Err(ValidationError::MarketTooLong {
                len,
                max: MAX_MARKET_LEN,
            });
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_';
            if !valid {
                return Err(ValidationError::MarketInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MarketId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for MarketId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MarketId> for String {
    fn from(value: MarketId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_lowercase() {
        let market = MarketId::parse("  EU-Central  ").expect("must parse");
        assert_eq!(market.as_str(), "eu-central");
    }

    #[test]
    fn rejects_empty_and_invalid_chars() {
        assert!(matches!(
            MarketId::parse("   "),
            Err(ValidationError::EmptyMarket)
        ));
        assert!(matches!(
            MarketId::parse("eu central"),
            Err(ValidationError::MarketInvalidChar { ch: ' ', index: 2 })
        ));
    }

    #[test]
    fn rejects_overlong_ids() {
        let input = "m".repeat(MAX_MARKET_LEN + 1);
        assert!(matches!(
            MarketId::parse(&input),
            Err(ValidationError::MarketTooLong { .. })
        ));
    }
}
