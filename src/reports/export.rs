//! CSV and workbook renderings of the usage report.

use crate::core::error::IntegrityError;
use crate::models::cylinder::Cylinder;
use crate::reports::usage::{daily_usage, usage_summary};
use serde::{Deserialize, Serialize};

pub const CSV_HEADER: &str = "Cylinder Size (KG),Usage (KG),Usage Percentage";
pub const CSV_FILENAME: &str = "gas_usage_report.csv";

pub const SUMMARY_SHEET: &str = "Summary";
pub const DAILY_SHEET: &str = "Daily Usage";

/// One spreadsheet cell, kept typed so a client can write a real xlsx
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

/// Header line plus one `size,usage,percent%` row per cylinder
pub fn to_csv(cylinders: &[Cylinder]) -> Result<String, IntegrityError> {
    let summary = usage_summary(cylinders)?;

    let mut lines = Vec::with_capacity(summary.per_cylinder.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for row in &summary.per_cylinder {
        lines.push(format!("{},{:.2},{:.2}%", row.size, row.usage, row.percentage_used));
    }

    Ok(lines.join("\n"))
}

pub fn to_workbook(cylinders: &[Cylinder]) -> Result<Workbook, IntegrityError> {
    let summary = usage_summary(cylinders)?;

    let summary_sheet = Sheet {
        name: SUMMARY_SHEET.to_string(),
        headers: headers(&["Cylinder Size (KG)", "Usage (KG)", "Usage Percentage", "Last Updated"]),
        rows: summary
            .per_cylinder
            .iter()
            .map(|row| {
                vec![
                    Cell::Number(row.size),
                    Cell::Number(row.usage),
                    Cell::Number(row.percentage_used),
                    Cell::Text(row.last_updated.date_naive().to_string()),
                ]
            })
            .collect(),
    };

    let daily_sheet = Sheet {
        name: DAILY_SHEET.to_string(),
        headers: headers(&["Date", "Usage (KG)"]),
        rows: daily_usage(cylinders)
            .into_iter()
            .map(|day| vec![Cell::Text(day.date.to_string()), Cell::Number(day.usage)])
            .collect(),
    };

    Ok(Workbook {
        sheets: vec![summary_sheet, daily_sheet],
    })
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
