//! Validation and cleaning configuration.
//!
//! Every dataset kind has a static default (`DatasetConfig::for_kind`). Callers
//! may override any of the recognized options through a JSON file:
//!
//! ```json
//! {
//!   "merit": { "bounds": { "price": { "min": -4500, "max": 4500 } } },
//!   "settlement": { "date_range": { "start": "2023-01-01", "end": "2023-01-15" } }
//! }
//! ```
//!
//! Resolved values are immutable and passed explicitly to the validator and
//! cleaner; nothing here is global state.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{DatasetKind, DateRange, MarketBounds};
use crate::error::AppError;

pub const MERIT_DATE: &str = "Date";
pub const MERIT_PERIOD: &str = "Period";
pub const MERIT_PRICE: &str = "Lowest to Highest Offer Price ($/MWh)";
pub const MERIT_VOLUME: &str = "Total Offer Capacity At Specified Offer Price (MW)";

pub const USEP_INFORMATION_TYPE: &str = "INFORMATION TYPE";
pub const USEP_DATE: &str = "DATE";
pub const USEP_PERIOD: &str = "PERIOD";
pub const USEP_PRICE: &str = "USEP ($/MWh)";
pub const USEP_LCP: &str = "LCP ($/MWh)";
pub const USEP_DEMAND: &str = "DEMAND (MW)";
pub const USEP_TCL: &str = "TCL (MW)";

/// Column names the merit-order file is renamed to after loading.
pub const MERIT_COLUMNS: [&str; 4] = [MERIT_DATE, MERIT_PERIOD, MERIT_PRICE, MERIT_VOLUME];

/// Which column plays which role for the cleaner and row extractors.
///
/// `quantity` is the offered volume for merit data and the demand for
/// settlement data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRoles {
    pub date: String,
    pub period: String,
    pub price: String,
    pub quantity: String,
}

impl ColumnRoles {
    pub fn for_kind(kind: DatasetKind) -> Self {
        let (date, period, price, quantity) = match kind {
            DatasetKind::Merit => (MERIT_DATE, MERIT_PERIOD, MERIT_PRICE, MERIT_VOLUME),
            DatasetKind::Settlement => (USEP_DATE, USEP_PERIOD, USEP_PRICE, USEP_DEMAND),
        };
        Self {
            date: date.to_string(),
            period: period.to_string(),
            price: price.to_string(),
            quantity: quantity.to_string(),
        }
    }
}

/// Static per-kind column configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    pub kind: DatasetKind,
    pub expected_columns: Vec<String>,
    pub date_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub roles: ColumnRoles,
}

impl DatasetConfig {
    pub fn for_kind(kind: DatasetKind) -> Self {
        let (expected_columns, date_columns, numeric_columns) = match kind {
            DatasetKind::Merit => (
                to_strings(&MERIT_COLUMNS),
                to_strings(&[MERIT_DATE]),
                to_strings(&[MERIT_PERIOD, MERIT_PRICE, MERIT_VOLUME]),
            ),
            DatasetKind::Settlement => (
                to_strings(&[
                    USEP_INFORMATION_TYPE,
                    USEP_DATE,
                    USEP_PERIOD,
                    USEP_PRICE,
                    USEP_LCP,
                    USEP_DEMAND,
                    USEP_TCL,
                ]),
                to_strings(&[USEP_DATE]),
                to_strings(&[USEP_PERIOD, USEP_PRICE, USEP_LCP, USEP_DEMAND, USEP_TCL]),
            ),
        };
        Self {
            kind,
            expected_columns,
            date_columns,
            numeric_columns,
            roles: ColumnRoles::for_kind(kind),
        }
    }
}

/// Everything the validator needs. Empty lists and `None` skip a check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    pub expected_columns: Vec<String>,
    pub date_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub bounds: MarketBounds,
    pub date_range: Option<DateRange>,
}

impl Default for ValidationConfig {
    /// Only the missing-value and duplicate checks run; numeric columns would
    /// use the default bounds table.
    fn default() -> Self {
        Self {
            expected_columns: Vec::new(),
            date_columns: Vec::new(),
            numeric_columns: Vec::new(),
            bounds: MarketBounds::default(),
            date_range: None,
        }
    }
}

impl ValidationConfig {
    pub fn for_kind(kind: DatasetKind) -> Self {
        let ds = DatasetConfig::for_kind(kind);
        Self {
            expected_columns: ds.expected_columns,
            date_columns: ds.date_columns,
            numeric_columns: ds.numeric_columns,
            bounds: MarketBounds::default(),
            date_range: Some(DateRange::reporting_default()),
        }
    }
}

/// Everything the cleaner needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanConfig {
    pub kind: DatasetKind,
    pub roles: ColumnRoles,
    /// Rows dated outside this window are dropped.
    pub date_range: DateRange,
    /// Must cover price plus volume (merit) or demand (settlement); missing
    /// kinds fall back to the default table.
    pub bounds: MarketBounds,
}

impl CleanConfig {
    pub fn for_kind(kind: DatasetKind) -> Self {
        Self {
            kind,
            roles: ColumnRoles::for_kind(kind),
            date_range: DateRange::reporting_default(),
            bounds: MarketBounds::default(),
        }
    }
}

/// Optional overrides for one dataset kind. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub expected_columns: Option<Vec<String>>,
    pub date_columns: Option<Vec<String>>,
    pub numeric_columns: Option<Vec<String>>,
    pub bounds: Option<MarketBounds>,
    pub date_range: Option<DateRange>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut base: ValidationConfig) -> ValidationConfig {
        if let Some(cols) = &self.expected_columns {
            base.expected_columns = cols.clone();
        }
        if let Some(cols) = &self.date_columns {
            base.date_columns = cols.clone();
        }
        if let Some(cols) = &self.numeric_columns {
            base.numeric_columns = cols.clone();
        }
        if let Some(bounds) = &self.bounds {
            base.bounds = bounds.clone();
        }
        if let Some(range) = self.date_range {
            base.date_range = Some(range);
        }
        base
    }
}

/// Top-level JSON configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub merit: Option<ConfigOverrides>,
    #[serde(default)]
    pub settlement: Option<ConfigOverrides>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::input(format!("Failed to open config '{}': {e}", path.display())))?;
        let config: ConfigFile = serde_json::from_reader(file)
            .map_err(|e| AppError::input(format!("Invalid config '{}': {e}", path.display())))?;
        for (kind, overrides) in [(DatasetKind::Merit, &config.merit), (DatasetKind::Settlement, &config.settlement)] {
            if let Some(range) = overrides.as_ref().and_then(|o| o.date_range) {
                if range.start > range.end {
                    return Err(AppError::input(
                        format!("Invalid config: {kind:?} date_range starts after it ends ({range})."),
                    ));
                }
            }
        }
        Ok(config)
    }

    pub fn overrides(&self, kind: DatasetKind) -> Option<&ConfigOverrides> {
        match kind {
            DatasetKind::Merit => self.merit.as_ref(),
            DatasetKind::Settlement => self.settlement.as_ref(),
        }
    }
}

/// Resolved configuration for one dataset kind.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSettings {
    pub validation: ValidationConfig,
    pub cleaning: CleanConfig,
}

/// Resolved configuration for a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub merit: DatasetSettings,
    pub settlement: DatasetSettings,
}

impl RunConfig {
    /// Layer: kind defaults < config file < explicit reporting window.
    pub fn resolve(file: Option<&ConfigFile>, window: Option<DateRange>) -> Self {
        let settings = |kind: DatasetKind| {
            let mut validation = ValidationConfig::for_kind(kind);
            if let Some(overrides) = file.and_then(|f| f.overrides(kind)) {
                validation = overrides.apply(validation);
            }
            if let Some(window) = window {
                validation.date_range = Some(window);
            }

            let mut cleaning = CleanConfig::for_kind(kind);
            cleaning.bounds = validation.bounds.clone().or_defaults();
            if let Some(range) = validation.date_range {
                cleaning.date_range = range;
            }

            DatasetSettings { validation, cleaning }
        };

        Self {
            merit: settings(DatasetKind::Merit),
            settlement: settings(DatasetKind::Settlement),
        }
    }

    pub fn for_kind(&self, kind: DatasetKind) -> &DatasetSettings {
        match kind {
            DatasetKind::Merit => &self.merit,
            DatasetKind::Settlement => &self.settlement,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::resolve(None, None)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoundKind;
    use chrono::NaiveDate;

    #[test]
    fn overrides_replace_only_supplied_options() {
        let json = r#"{
            "settlement": {
                "expected_columns": ["DATE", "PERIOD"],
                "bounds": { "demand": { "min": 1000, "max": 9000 } }
            }
        }"#;
        let file: ConfigFile = serde_json::from_str(json).unwrap();
        let run = RunConfig::resolve(Some(&file), None);

        let v = &run.settlement.validation;
        assert_eq!(v.expected_columns, vec!["DATE", "PERIOD"]);
        assert_eq!(v.numeric_columns.len(), 5);
        assert!(v.bounds.get(BoundKind::Price).is_none());
        assert_eq!(v.date_range, Some(DateRange::reporting_default()));

        // Cleaning keeps the overridden demand bound but still has a price bound.
        let c = &run.settlement.cleaning;
        assert_eq!(c.bounds.get(BoundKind::Demand).unwrap().min, 1000.0);
        assert_eq!(c.bounds.get(BoundKind::Price).unwrap().min, -5000.0);

        assert_eq!(run.merit, RunConfig::default().merit);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let json = r#"{ "merit": { "expected_cols": ["Date"] } }"#;
        assert!(serde_json::from_str::<ConfigFile>(json).is_err());
    }

    #[test]
    fn explicit_window_wins_over_file() {
        let json = r#"{ "merit": { "date_range": { "start": "2023-02-01", "end": "2023-02-28" } } }"#;
        let file: ConfigFile = serde_json::from_str(json).unwrap();
        let window = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 3, 31).unwrap(),
        )
        .unwrap();

        let run = RunConfig::resolve(Some(&file), Some(window));
        assert_eq!(run.merit.validation.date_range, Some(window));
        assert_eq!(run.merit.cleaning.date_range, window);
    }
}
