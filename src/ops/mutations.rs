//! Pure cylinder mutations.
//!
//! Every function takes the current sequence by reference and returns a new one,
//! so the store can run them inside its single-writer section and discard the
//! result if persisting fails.

use crate::core::error::{MutationError, ValidationError};
use crate::models::cylinder::Cylinder;
use crate::models::profile::{Settings, UserProfile};
use chrono::{DateTime, Utc};

/// Append a full cylinder of `size` kilograms
pub fn add_cylinder(
    cylinders: &[Cylinder],
    id: String,
    size: f64,
    now: DateTime<Utc>,
) -> Result<(Vec<Cylinder>, Cylinder), MutationError> {
    if !size.is_finite() || size <= 0.0 {
        return Err(ValidationError::InvalidSize(size).into());
    }
    if id.is_empty() {
        return Err(ValidationError::MissingField("id".to_string()).into());
    }
    if cylinders.iter().any(|c| c.id == id) {
        return Err(ValidationError::DuplicateId(id).into());
    }

    let cylinder = Cylinder::new(id, size, now);
    let mut next = Vec::with_capacity(cylinders.len() + 1);
    next.extend_from_slice(cylinders);
    next.push(cylinder.clone());

    Ok((next, cylinder))
}

/// Replace the weight of one cylinder in place, clamped to [0, size]
pub fn update_weight(
    cylinders: &[Cylinder],
    cylinder_id: &str,
    new_weight: f64,
    now: DateTime<Utc>,
) -> Result<Vec<Cylinder>, MutationError> {
    if !new_weight.is_finite() {
        return Err(ValidationError::InvalidWeight(new_weight).into());
    }

    let index = cylinders
        .iter()
        .position(|c| c.id == cylinder_id)
        .ok_or_else(|| MutationError::CylinderNotFound(cylinder_id.to_string()))?;

    let mut next = cylinders.to_vec();
    let target = &mut next[index];
    target.current_weight = new_weight.clamp(0.0, target.size);
    target.last_updated = now;

    Ok(next)
}

/// Drop the cylinder with `cylinder_id`; absent ids leave the sequence unchanged
pub fn remove_cylinder(cylinders: &[Cylinder], cylinder_id: &str) -> Vec<Cylinder> {
    cylinders
        .iter()
        .filter(|c| c.id != cylinder_id)
        .cloned()
        .collect()
}

/// A single change to a profile, as requested by a client
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    AddCylinder { id: String, size: f64 },
    UpdateWeight { cylinder_id: String, weight: f64 },
    RemoveCylinder { cylinder_id: String },
    UpdateSettings { settings: Settings, name: Option<String> },
}

impl Mutation {
    /// Produce the next profile without touching `profile`
    pub fn apply(&self, profile: &UserProfile, now: DateTime<Utc>) -> Result<UserProfile, MutationError> {
        let mut next = profile.clone();

        match self {
            Mutation::AddCylinder { id, size } => {
                let (cylinders, _) = add_cylinder(&profile.gas_cylinders, id.clone(), *size, now)?;
                next.gas_cylinders = cylinders;
            }
            Mutation::UpdateWeight { cylinder_id, weight } => {
                next.gas_cylinders = update_weight(&profile.gas_cylinders, cylinder_id, *weight, now)?;
            }
            Mutation::RemoveCylinder { cylinder_id } => {
                next.gas_cylinders = remove_cylinder(&profile.gas_cylinders, cylinder_id);
            }
            Mutation::UpdateSettings { settings, name } => {
                settings.validate()?;
                next.settings = settings.clone();
                if let Some(name) = name {
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(ValidationError::MissingField("name".to_string()).into());
                    }
                    next.name = name.to_string();
                }
            }
        }

        Ok(next)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::AddCylinder { .. } => "add_cylinder",
            Mutation::UpdateWeight { .. } => "update_weight",
            Mutation::RemoveCylinder { .. } => "remove_cylinder",
            Mutation::UpdateSettings { .. } => "update_settings",
        }
    }
}
