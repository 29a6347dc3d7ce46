//! Domain bounds for energy-market measurements.
//!
//! The bounds table maps a measurement kind to an inclusive `[min, max]` range.
//! Which kind applies to a column is inferred from the column name through an
//! ordered rule list (`BOUND_RULES`): the first rule whose keyword appears in
//! the lowercased name wins.
//!
//! Offer-stack capacity columns are named "... Capacity At Specified Offer
//! Price (MW)", so "capacity" is ranked ahead of "price". Every other pairing
//! follows price > volume > period > demand > tcl.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Measurement kinds that carry domain bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundKind {
    Price,
    Volume,
    Period,
    Demand,
    #[serde(rename = "tcl")]
    TransmissionLoss,
}

impl BoundKind {
    pub fn label(self) -> &'static str {
        match self {
            BoundKind::Price => "price",
            BoundKind::Volume => "volume",
            BoundKind::Period => "period",
            BoundKind::Demand => "demand",
            BoundKind::TransmissionLoss => "tcl",
        }
    }
}

/// Column-name keywords per bound kind, in priority order.
pub const BOUND_RULES: [(BoundKind, &[&str]); 6] = [
    (BoundKind::Volume, &["capacity"]),
    (BoundKind::Price, &["price"]),
    (BoundKind::Volume, &["volume"]),
    (BoundKind::Period, &["period"]),
    (BoundKind::Demand, &["demand"]),
    (BoundKind::TransmissionLoss, &["tcl"]),
];

/// Classify a column by case-insensitive substring match on its name.
pub fn infer_bound_kind(column: &str) -> Option<BoundKind> {
    let name = column.to_lowercase();
    BOUND_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| name.contains(k)))
        .map(|(kind, _)| *kind)
}

/// Inclusive range plus a human description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub description: String,
}

impl Bound {
    pub fn new(min: f64, max: f64, description: impl Into<String>) -> Self {
        Self {
            min,
            max,
            description: description.into(),
        }
    }

    /// Both ends are valid. NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Bounds table keyed by measurement kind.
///
/// A table may be partial: kinds without an entry are simply not checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketBounds(BTreeMap<BoundKind, Bound>);

impl MarketBounds {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, kind: BoundKind, bound: Bound) -> Self {
        self.0.insert(kind, bound);
        self
    }

    pub fn get(&self, kind: BoundKind) -> Option<&Bound> {
        self.0.get(&kind)
    }

    /// Bound for a column, via `infer_bound_kind`.
    pub fn for_column(&self, column: &str) -> Option<(BoundKind, &Bound)> {
        let kind = infer_bound_kind(column)?;
        self.get(kind).map(|b| (kind, b))
    }

    /// Fill kinds missing from this table with the default entries.
    pub fn or_defaults(mut self) -> Self {
        for (kind, bound) in MarketBounds::default().0 {
            self.0.entry(kind).or_insert(bound);
        }
        self
    }
}

impl Default for MarketBounds {
    /// Energy market bounds based on historical market limits.
    fn default() -> Self {
        Self::empty()
            .with(
                BoundKind::Price,
                Bound::new(-5000.0, 5000.0, "Energy price bounds based on historical market limits"),
            )
            .with(
                BoundKind::Volume,
                Bound::new(0.0, 2000.0, "Volume bounds based on typical generation capacity"),
            )
            .with(
                BoundKind::Period,
                Bound::new(1.0, 48.0, "Valid period ranges for half-hourly trading"),
            )
            .with(
                BoundKind::Demand,
                Bound::new(4000.0, 8000.0, "Demand bounds based on typical system load"),
            )
            .with(
                BoundKind::TransmissionLoss,
                Bound::new(0.0, 100.0, "Transmission loss bounds"),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_columns_use_volume_bound() {
        assert_eq!(
            infer_bound_kind("Total Offer Capacity At Specified Offer Price (MW)"),
            Some(BoundKind::Volume)
        );
        assert_eq!(infer_bound_kind("Cleared VOLUME"), Some(BoundKind::Volume));
    }

    #[test]
    fn inference_follows_rule_order() {
        assert_eq!(infer_bound_kind("USEP ($/MWh)"), None);
        assert_eq!(infer_bound_kind("Lowest to Highest Offer Price ($/MWh)"), Some(BoundKind::Price));
        assert_eq!(infer_bound_kind("PERIOD"), Some(BoundKind::Period));
        assert_eq!(infer_bound_kind("DEMAND (MW)"), Some(BoundKind::Demand));
        assert_eq!(infer_bound_kind("TCL (MW)"), Some(BoundKind::TransmissionLoss));
        assert_eq!(infer_bound_kind("period demand"), Some(BoundKind::Period));
        assert_eq!(infer_bound_kind("price volume"), Some(BoundKind::Price));
    }

    #[test]
    fn bounds_are_inclusive() {
        let b = Bound::new(1.0, 48.0, "");
        assert!(b.contains(1.0));
        assert!(b.contains(48.0));
        assert!(!b.contains(0.999));
        assert!(!b.contains(f64::NAN));
    }

    #[test]
    fn partial_bounds_deserialize_from_json() {
        let json = r#"{"price": {"min": -10, "max": 10}, "tcl": {"min": 0, "max": 5, "description": "x"}}"#;
        let bounds: MarketBounds = serde_json::from_str(json).unwrap();
        assert_eq!(bounds.get(BoundKind::Price).unwrap().max, 10.0);
        assert_eq!(bounds.get(BoundKind::TransmissionLoss).unwrap().description, "x");
        assert!(bounds.get(BoundKind::Demand).is_none());
        assert!(bounds.for_column("DEMAND (MW)").is_none());

        let filled = bounds.or_defaults();
        assert_eq!(filled.get(BoundKind::Price).unwrap().max, 10.0);
        assert_eq!(filled.get(BoundKind::Demand).unwrap().min, 4000.0);
    }
}
