//! Low-gas evaluation.
//!
//! A cylinder is low when its current weight is at or below the user's
//! notification threshold in kilograms. The same rule drives the in-session
//! notices and the email channel; the percentage is only used for the
//! three-level display severity.

use crate::models::cylinder::Cylinder;
use crate::models::profile::UserProfile;
use crate::notify::sink::{Notice, NoticeLevel};
use serde::{Deserialize, Serialize};

pub const CRITICAL_PERCENT: f64 = 5.0;
pub const WARNING_PERCENT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Normal,
}

pub fn severity(percent_remaining: f64) -> Severity {
    if percent_remaining <= CRITICAL_PERCENT {
        Severity::Critical
    } else if percent_remaining <= WARNING_PERCENT {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

pub fn is_low(cylinder: &Cylinder, threshold: f64) -> bool {
    cylinder.current_weight <= threshold
}

pub fn low_cylinders(profile: &UserProfile, threshold: f64) -> Vec<Cylinder> {
    profile
        .gas_cylinders
        .iter()
        .filter(|c| is_low(c, threshold))
        .cloned()
        .collect()
}

/// Result of the level-triggered in-session check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAlert {
    pub low: Vec<Cylinder>,
    pub should_notify: bool,
}

pub fn evaluate_session(profile: &UserProfile) -> SessionAlert {
    if !profile.settings.low_gas_notifications {
        return SessionAlert {
            low: Vec::new(),
            should_notify: false,
        };
    }

    let low = low_cylinders(profile, profile.settings.notification_threshold);
    let should_notify = !low.is_empty();
    SessionAlert { low, should_notify }
}

/// One in-session warning per low cylinder
pub fn session_notices(alert: &SessionAlert) -> Vec<Notice> {
    if !alert.should_notify {
        return Vec::new();
    }

    alert
        .low
        .iter()
        .map(|c| Notice {
            message: format!(
                "Gas cylinder {}KG is running low ({}KG remaining)",
                c.size, c.current_weight
            ),
            level: NoticeLevel::Warning,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailAlert {
    pub recipient: String,
    /// Every currently-low cylinder, not only the ones that just crossed
    pub low_cylinders: Vec<Cylinder>,
}

/// Decide whether a committed update warrants a low-gas email.
///
/// Fires only when some cylinder is low after the write but was not low
/// (or did not exist) before it, each side judged by its own threshold.
pub fn evaluate_email(
    before: Option<&UserProfile>,
    after: &UserProfile,
    default_threshold: f64,
) -> Option<EmailAlert> {
    if !after.settings.email_notifications {
        return None;
    }

    let threshold = effective_threshold(after.settings.notification_threshold, default_threshold);
    let low = low_cylinders(after, threshold);

    let newly_low = low.iter().any(|cylinder| match before {
        Some(prev_profile) => {
            let prev_threshold =
                effective_threshold(prev_profile.settings.notification_threshold, default_threshold);
            match prev_profile.cylinder(&cylinder.id) {
                Some(prev) => !is_low(prev, prev_threshold),
                None => true,
            }
        }
        None => true,
    });

    if !newly_low {
        return None;
    }

    Some(EmailAlert {
        recipient: after.email.clone(),
        low_cylinders: low,
    })
}

fn effective_threshold(configured: f64, default_threshold: f64) -> f64 {
    if configured.is_finite() && configured > 0.0 {
        configured
    } else {
        default_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::Settings;
    use chrono::Utc;

    fn profile_with(weights: &[(&str, f64, f64)], settings: Settings) -> UserProfile {
        let mut profile = UserProfile::new("Test".to_string(), "test@example.com".to_string(), settings);
        profile.gas_cylinders = weights
            .iter()
            .map(|(id, size, weight)| Cylinder {
                id: id.to_string(),
                size: *size,
                current_weight: *weight,
                last_updated: Utc::now(),
            })
            .collect();
        profile
    }

    fn email_settings() -> Settings {
        Settings {
            email_notifications: true,
            ..Settings::default()
        }
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(severity(0.0), Severity::Critical);
        assert_eq!(severity(5.0), Severity::Critical);
        assert_eq!(severity(5.1), Severity::Warning);
        assert_eq!(severity(20.0), Severity::Warning);
        assert_eq!(severity(20.1), Severity::Normal);
        assert_eq!(severity(100.0), Severity::Normal);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let profile = profile_with(&[("a", 6.0, 2.0), ("b", 6.0, 3.0), ("c", 6.0, 3.1)], Settings::default());
        let alert = evaluate_session(&profile);

        let ids: Vec<_> = alert.low.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(alert.should_notify);
    }

    #[test]
    fn test_session_disabled_reports_nothing() {
        let settings = Settings {
            low_gas_notifications: false,
            ..Settings::default()
        };
        let profile = profile_with(&[("a", 6.0, 0.5)], settings);
        let alert = evaluate_session(&profile);

        assert!(alert.low.is_empty());
        assert!(!alert.should_notify);
        assert!(session_notices(&alert).is_empty());
    }

    #[test]
    fn test_session_notice_message() {
        let profile = profile_with(&[("a", 6.0, 2.0)], Settings::default());
        let notices = session_notices(&evaluate_session(&profile));

        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "Gas cylinder 6KG is running low (2KG remaining)");
        assert_eq!(notices[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn test_email_fires_on_transition_into_low() {
        let before = profile_with(&[("a", 6.0, 6.0), ("b", 13.0, 1.0)], email_settings());
        let after = profile_with(&[("a", 6.0, 2.0), ("b", 13.0, 1.0)], email_settings());

        let alert = evaluate_email(Some(&before), &after, 3.0).unwrap();
        assert_eq!(alert.recipient, "test@example.com");
        assert_eq!(alert.low_cylinders.len(), 2);
    }

    #[test]
    fn test_email_not_repeated_while_still_low() {
        let before = profile_with(&[("a", 6.0, 2.0)], email_settings());
        let after = profile_with(&[("a", 6.0, 1.5)], email_settings());

        assert!(evaluate_email(Some(&before), &after, 3.0).is_none());
    }

    #[test]
    fn test_email_skipped_when_disabled() {
        let before = profile_with(&[("a", 6.0, 6.0)], Settings::default());
        let after = profile_with(&[("a", 6.0, 1.0)], Settings::default());

        assert!(evaluate_email(Some(&before), &after, 3.0).is_none());
    }

    #[test]
    fn test_email_fires_for_new_low_cylinder_without_history() {
        let after = profile_with(&[("a", 3.0, 3.0)], email_settings());
        assert!(evaluate_email(None, &after, 3.0).is_some());
    }

    #[test]
    fn test_email_threshold_raise_triggers() {
        let before = profile_with(&[("a", 13.0, 4.0)], email_settings());
        let raised = Settings {
            notification_threshold: 5.0,
            ..email_settings()
        };
        let after = profile_with(&[("a", 13.0, 4.0)], raised);

        assert!(evaluate_email(Some(&before), &after, 3.0).is_some());
    }

    #[test]
    fn test_email_invalid_threshold_uses_default() {
        let broken = Settings {
            notification_threshold: 0.0,
            ..email_settings()
        };
        let before = profile_with(&[("a", 6.0, 6.0)], broken.clone());
        let after = profile_with(&[("a", 6.0, 2.5)], broken);

        assert!(evaluate_email(Some(&before), &after, 3.0).is_some());
    }
}
