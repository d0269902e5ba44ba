use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::matching::domain::{
    parse_flexible_date, years_between, ActivityCategory, ActivityRecord, Criterion,
    CriterionScore, PatientRecord,
};
use crate::matching::geo::ResolvedDistance;

/// Screening stage weights, highest stage wins.
fn stage_points(category: &ActivityCategory) -> Option<u32> {
    match category {
        ActivityCategory::Released => Some(40),
        ActivityCategory::QualifiedRespondents => Some(30),
        ActivityCategory::Respondents => Some(20),
        ActivityCategory::Randomization | ActivityCategory::Other(_) => None,
    }
}

/// Diagnosis/activity recency, 0-50 points precomputed in the dataset.
///
/// The points come straight from the patient row; the reason reconstructs the
/// elapsed time they imply (`(50 - points) / 10` years). When no points were
/// awarded the most recent qualified-respondents activity is still reported
/// for transparency.
pub(crate) fn recency(
    patient: &PatientRecord,
    history: &[ActivityRecord],
    today: NaiveDate,
) -> CriterionScore {
    use crate::matching::domain::RecencyBasis;

    let points = patient.recency_points;
    let last_qualified = history
        .iter()
        .filter(|activity| activity.category == ActivityCategory::QualifiedRespondents)
        .filter_map(|activity| activity.date.as_deref())
        .last();

    let reason = if points > 0 {
        let implied_years = f64::from(50u32.saturating_sub(points)) / 10.0;
        match patient.recency_basis {
            RecencyBasis::Diagnosis => {
                format!("diagnosis placed about {implied_years:.1} years ago")
            }
            RecencyBasis::RecentActivity => {
                let date = last_qualified.unwrap_or("unknown date");
                format!(
                    "recent qualifying activity on {date} (about {implied_years:.1} years ago)"
                )
            }
            RecencyBasis::Unknown => {
                "recency points recorded without a derivation tag".to_string()
            }
        }
    } else if let Some(date) = last_qualified {
        match parse_flexible_date(date) {
            Some(parsed) => format!(
                "no recency points; last qualified respondents activity {date} ({:.1} years ago)",
                years_between(parsed, today)
            ),
            None => format!(
                "no recency points; last qualified respondents activity {date} (unparseable date)"
            ),
        }
    } else if history.is_empty() {
        "no recency points; no activity data available".to_string()
    } else {
        "no recency points; no qualified respondents activity".to_string()
    };

    CriterionScore {
        criterion: Criterion::Recency,
        points,
        reason,
    }
}

/// Highest screening stage reached: released 40, qualified respondents 30,
/// respondents 20, nothing 0. Lower stages are ignored when a higher one
/// is present.
pub(crate) fn screening_stage(history: &[ActivityRecord]) -> CriterionScore {
    let best = history
        .iter()
        .filter_map(|activity| stage_points(&activity.category).map(|points| (points, activity)))
        .max_by_key(|(points, _)| *points);

    match best {
        Some((points, winner)) => {
            let last_date = history
                .iter()
                .filter(|activity| activity.category == winner.category)
                .filter_map(|activity| activity.date.as_deref())
                .last();
            let reason = match last_date {
                Some(date) => format!("{} stage reached ({date})", winner.category.label()),
                None => format!("{} stage reached", winner.category.label()),
            };
            CriterionScore {
                criterion: Criterion::ScreeningStage,
                points,
                reason,
            }
        }
        None => CriterionScore {
            criterion: Criterion::ScreeningStage,
            points: 0,
            reason: "no screening activity on record".to_string(),
        },
    }
}

/// Study-history breadth: every distinct indication contributes the best
/// stage weight it reached, so points grow with both indication diversity and
/// the depth of engagement per indication.
pub(crate) fn similar_studies(history: &[ActivityRecord]) -> CriterionScore {
    let mut best_per_indication: BTreeMap<&str, u32> = BTreeMap::new();
    for activity in history {
        let Some(indication) = activity.indication.as_deref() else {
            continue;
        };
        if indication.trim().is_empty() {
            continue;
        }
        let priority = stage_points(&activity.category).unwrap_or(0);
        let entry = best_per_indication.entry(indication).or_insert(0);
        *entry = (*entry).max(priority);
    }

    if best_per_indication.is_empty() {
        return CriterionScore {
            criterion: Criterion::SimilarStudies,
            points: 0,
            reason: "no indication history".to_string(),
        };
    }

    let count = best_per_indication.len();
    let points = best_per_indication.values().sum();
    let mut listed: Vec<&str> = best_per_indication.keys().copied().take(3).collect();
    listed.sort_unstable();
    let mut list = listed.join(", ");
    if count > 3 {
        list.push_str(&format!(" and {} more", count - 3));
    }

    CriterionScore {
        criterion: Criterion::SimilarStudies,
        points,
        reason: format!("{count} distinct indication(s) with stage weighting: {list}"),
    }
}

/// Proximity to the closest trial site, banded into 20/15/10/5 points with
/// distinct reasons for the two degenerate inputs.
pub(crate) fn distance_to_site(
    patient_code: Option<&str>,
    sites_provided: bool,
    resolved: ResolvedDistance,
) -> CriterionScore {
    let (points, reason) = if !sites_provided {
        (0, "no site postal codes provided".to_string())
    } else {
        match patient_code {
            None => (
                0,
                "site postal codes provided but patient location unknown".to_string(),
            ),
            Some(code) => match resolved {
                ResolvedDistance::Unknown => {
                    (0, format!("patient postal code {code}: distance unresolved"))
                }
                ResolvedDistance::Kilometers(distance) if distance < 10.0 => (
                    20,
                    format!(
                        "patient postal code {code}: {distance:.1} km to closest site (very close)"
                    ),
                ),
                ResolvedDistance::Kilometers(distance) if distance <= 50.0 => (
                    15,
                    format!(
                        "patient postal code {code}: {distance:.1} km to closest site (moderate)"
                    ),
                ),
                ResolvedDistance::Kilometers(distance) if distance <= 100.0 => (
                    10,
                    format!("patient postal code {code}: {distance:.1} km to closest site (far)"),
                ),
                ResolvedDistance::Kilometers(distance) => (
                    5,
                    format!(
                        "patient postal code {code}: {distance:.1} km to closest site (very far)"
                    ),
                ),
            },
        }
    };

    CriterionScore {
        criterion: Criterion::DistanceToSite,
        points,
        reason,
    }
}

/// A randomization at least one year old is a positive signal; a fresher one
/// excludes the patient from this criterion entirely.
pub(crate) fn past_qualification(
    patient: &PatientRecord,
    history: &[ActivityRecord],
    today: NaiveDate,
) -> CriterionScore {
    let randomization_dates: Vec<&str> = history
        .iter()
        .filter(|activity| activity.category == ActivityCategory::Randomization)
        .filter_map(|activity| activity.date.as_deref())
        .collect();

    if randomization_dates.is_empty() {
        let milestone = patient.latest_milestone.as_deref().unwrap_or("unknown");
        return CriterionScore {
            criterion: Criterion::PastQualification,
            points: 0,
            reason: format!("latest milestone {milestone}; no randomization history"),
        };
    }

    let most_recent = randomization_dates
        .iter()
        .filter_map(|raw| parse_flexible_date(raw).map(|date| (*raw, date)))
        .max_by_key(|(_, date)| *date);

    match most_recent {
        Some((raw, date)) => {
            let years = years_between(date, today);
            if years >= 1.0 {
                CriterionScore {
                    criterion: Criterion::PastQualification,
                    points: 25,
                    reason: format!("randomized on {raw} ({years:.1} years ago)"),
                }
            } else {
                CriterionScore {
                    criterion: Criterion::PastQualification,
                    points: 0,
                    reason: format!("randomized on {raw} ({years:.1} years ago); too recent"),
                }
            }
        }
        None => {
            let raw = randomization_dates.last().copied().unwrap_or_default();
            CriterionScore {
                criterion: Criterion::PastQualification,
                points: 0,
                reason: format!("unparseable randomization date {raw}"),
            }
        }
    }
}
