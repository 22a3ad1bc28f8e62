use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cylinder sizes offered by the add dialog, in kilograms
pub const STANDARD_SIZES: [f64; 3] = [3.0, 6.0, 13.0];

/// A single gas cylinder owned by a user profile
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cylinder {
    /// Unique within the owning profile
    pub id: String,
    /// Nominal full capacity in kilograms, fixed at creation
    pub size: f64,
    /// Remaining gas in kilograms, always within [0, size]
    pub current_weight: f64,
    /// Set on every mutation
    pub last_updated: DateTime<Utc>,
}

impl Cylinder {
    /// A freshly added cylinder is assumed full
    pub fn new(id: String, size: f64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            size,
            current_weight: size,
            last_updated: now,
        }
    }

    /// Kilograms consumed since the cylinder was added
    pub fn usage(&self) -> f64 {
        self.size - self.current_weight
    }

    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty()
            && self.size.is_finite()
            && self.size > 0.0
            && self.current_weight.is_finite()
            && self.current_weight >= 0.0
            && self.current_weight <= self.size
    }
}
