use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{MarketId, UtcDateTime};
use crate::error::ValidationError;

/// Side of an order-book entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl Display for OrderSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(ValidationError::InvalidSide {
                value: other.to_owned(),
            }),
        }
    }
}

/// Normalized order-book record inside one snapshot.
///
/// Immutable once produced; `snapshot_ts` is shared by every record of the
/// pass that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub record_id: Uuid,
    pub market: MarketId,
    pub kind: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    pub issued_at: UtcDateTime,
    pub snapshot_ts: UtcDateTime,
}

impl SnapshotRecord {
    pub fn new(
        market: MarketId,
        kind: impl Into<String>,
        side: OrderSide,
        price: f64,
        quantity: f64,
        issued_at: UtcDateTime,
        snapshot_ts: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(ValidationError::EmptyKind);
        }
        validate_non_negative("price", price)?;
        validate_non_negative("quantity", quantity)?;

        Ok(Self {
            record_id: Uuid::new_v4(),
            market,
            kind,
            side,
            price,
            quantity,
            issued_at,
            snapshot_ts,
        })
    }
}

/// One internally consistent read of the paginated order-book resource.
///
/// Created wholesale by one pass and superseded, never patched, by the next
/// successful pass. `degraded` marks the page-1-only fallback produced after
/// the bounded consistency retries are exhausted; callers must not assume
/// atomicity across pages for a degraded snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<SnapshotRecord>,
    pub last_modified: Option<String>,
    pub fetched_at: UtcDateTime,
    pub degraded: bool,
}

impl Snapshot {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> MarketId {
        MarketId::parse("eu-central").expect("valid market")
    }

    fn ts() -> UtcDateTime {
        UtcDateTime::parse("2024-06-01T12:00:00Z").expect("valid timestamp")
    }

    #[test]
    fn builds_record_with_generated_id() {
        let record = SnapshotRecord::new(market(), "energy", OrderSide::Sell, 42.5, 10.0, ts(), ts())
            .expect("valid record");

        assert_eq!(record.side, OrderSide::Sell);
        assert!(!record.record_id.is_nil());
    }

    #[test]
    fn rejects_non_finite_and_negative_values() {
        let err = SnapshotRecord::new(market(), "energy", OrderSide::Buy, f64::NAN, 1.0, ts(), ts())
            .expect_err("nan price must fail");
        assert!(matches!(
            err,
            ValidationError::NonFiniteValue { field: "price" }
        ));

        let err = SnapshotRecord::new(market(), "energy", OrderSide::Buy, 1.0, -2.0, ts(), ts())
            .expect_err("negative quantity must fail");
        assert!(matches!(
            err,
            ValidationError::NegativeValue { field: "quantity" }
        ));
    }

    #[test]
    fn rejects_empty_kind() {
        let err = SnapshotRecord::new(market(), "  ", OrderSide::Buy, 1.0, 1.0, ts(), ts())
            .expect_err("blank kind must fail");
        assert!(matches!(err, ValidationError::EmptyKind));
    }

    #[test]
    fn parses_order_side_case_insensitively() {
        assert_eq!("BUY".parse::<OrderSide>().expect("valid"), OrderSide::Buy);
        assert!(matches!(
            "hold".parse::<OrderSide>(),
            Err(ValidationError::InvalidSide { .. })
        ));
    }
}
