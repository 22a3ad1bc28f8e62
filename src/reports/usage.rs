//! Usage metrics derived from a profile snapshot.
//!
//! All functions are pure so the dashboard, the report endpoints and the
//! exporters compute identical numbers from the same snapshot.

use crate::alerts::evaluator::{severity, Severity};
use crate::core::error::IntegrityError;
use crate::models::cylinder::Cylinder;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CylinderUsage {
    pub id: String,
    pub size: f64,
    pub usage: f64,
    pub percentage_used: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub total_usage: f64,
    pub per_cylinder: Vec<CylinderUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub usage: f64,
}

/// One row of the dashboard level chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CylinderLevel {
    pub id: String,
    pub size: f64,
    pub current_weight: f64,
    pub percent_remaining: f64,
    pub severity: Severity,
}

/// Share of the nominal capacity still in the cylinder, 0..=100
pub fn percent_remaining(cylinder: &Cylinder) -> Result<f64, IntegrityError> {
    if !cylinder.size.is_finite() || cylinder.size <= 0.0 {
        return Err(IntegrityError {
            cylinder_id: cylinder.id.clone(),
            size: cylinder.size,
        });
    }
    Ok(cylinder.current_weight / cylinder.size * 100.0)
}

pub fn usage_summary(cylinders: &[Cylinder]) -> Result<UsageSummary, IntegrityError> {
    let mut total_usage = 0.0;
    let mut per_cylinder = Vec::with_capacity(cylinders.len());

    for cylinder in cylinders {
        let remaining = percent_remaining(cylinder)?;
        let usage = cylinder.usage();
        total_usage += usage;
        per_cylinder.push(CylinderUsage {
            id: cylinder.id.clone(),
            size: cylinder.size,
            usage,
            percentage_used: 100.0 - remaining,
            last_updated: cylinder.last_updated,
        });
    }

    Ok(UsageSummary {
        total_usage,
        per_cylinder,
    })
}

/// Usage bucketed by the UTC calendar date of each cylinder's last update,
/// ascending by date
pub fn daily_usage(cylinders: &[Cylinder]) -> Vec<DailyUsage> {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for cylinder in cylinders {
        *buckets.entry(cylinder.last_updated.date_naive()).or_insert(0.0) += cylinder.usage();
    }

    buckets
        .into_iter()
        .map(|(date, usage)| DailyUsage { date, usage })
        .collect()
}

pub fn level_overview(cylinders: &[Cylinder]) -> Result<Vec<CylinderLevel>, IntegrityError> {
    cylinders
        .iter()
        .map(|cylinder| {
            let percent = percent_remaining(cylinder)?;
            Ok(CylinderLevel {
                id: cylinder.id.clone(),
                size: cylinder.size,
                current_weight: cylinder.current_weight,
                percent_remaining: percent,
                severity: severity(percent),
            })
        })
        .collect()
}
