use crate::core::error::ValidationError;
use crate::models::cylinder::Cylinder;
use serde::{Deserialize, Serialize};

pub const MIN_THRESHOLD_KG: f64 = 1.0;
pub const MAX_THRESHOLD_KG: f64 = 10.0;
pub const DEFAULT_THRESHOLD_KG: f64 = 3.0;

/// Per-user notification preferences
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_low_gas_notifications")]
    pub low_gas_notifications: bool,
    #[serde(default)]
    pub email_notifications: bool,
    /// Kilograms at or below which a cylinder counts as low
    #[serde(default = "default_notification_threshold")]
    pub notification_threshold: f64,
}

fn default_low_gas_notifications() -> bool {
    true
}

fn default_notification_threshold() -> f64 {
    DEFAULT_THRESHOLD_KG
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            low_gas_notifications: default_low_gas_notifications(),
            email_notifications: false,
            notification_threshold: default_notification_threshold(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let value = self.notification_threshold;
        if !value.is_finite() || !(MIN_THRESHOLD_KG..=MAX_THRESHOLD_KG).contains(&value) {
            return Err(ValidationError::ThresholdOutOfRange {
                value,
                min: MIN_THRESHOLD_KG,
                max: MAX_THRESHOLD_KG,
            });
        }
        Ok(())
    }
}

/// The persisted per-user document
///
/// Field names match the stored JSON shape so a document can be read back
/// from the WAL unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub settings: Settings,
    /// Insertion order is display order
    #[serde(default)]
    pub gas_cylinders: Vec<Cylinder>,
}

impl UserProfile {
    pub fn new(name: String, email: String, settings: Settings) -> Self {
        Self {
            name,
            email,
            settings,
            gas_cylinders: Vec::new(),
        }
    }

    pub fn cylinder(&self, cylinder_id: &str) -> Option<&Cylinder> {
        self.gas_cylinders.iter().find(|c| c.id == cylinder_id)
    }

    /// Check every invariant a stored profile must hold
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.settings.validate()?;

        let mut seen = std::collections::HashSet::with_capacity(self.gas_cylinders.len());
        for cylinder in &self.gas_cylinders {
            if !cylinder.size.is_finite() || cylinder.size <= 0.0 {
                return Err(ValidationError::InvalidSize(cylinder.size));
            }
            if !cylinder.is_well_formed() {
                return Err(ValidationError::InvalidWeight(cylinder.current_weight));
            }
            if !seen.insert(cylinder.id.as_str()) {
                return Err(ValidationError::DuplicateId(cylinder.id.clone()));
            }
        }

        Ok(())
    }
}
