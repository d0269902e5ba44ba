use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for patients in the population dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatientId(pub String);

impl PatientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Recorded sex of a patient, also usable as a query constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    /// Single-letter dataset code.
    pub const fn code(self) -> &'static str {
        match self {
            Sex::Female => "F",
            Sex::Male => "M",
        }
    }

    /// Accepts the dataset's single-letter codes as well as full words.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "F" | "FEMALE" => Some(Sex::Female),
            "M" | "MALE" => Some(Sex::Male),
            _ => None,
        }
    }
}

/// How a patient's precomputed recency points were derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecencyBasis {
    Diagnosis,
    RecentActivity,
    Unknown,
}

impl RecencyBasis {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(tag) if tag.eq_ignore_ascii_case("Diagnosis-based") => RecencyBasis::Diagnosis,
            Some(tag) if tag.eq_ignore_ascii_case("Recent Activity-based") => {
                RecencyBasis::RecentActivity
            }
            _ => RecencyBasis::Unknown,
        }
    }
}

/// One row of the scored patient population table. Immutable for the lifetime
/// of a loaded dataset; replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: PatientId,
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub indication: Option<String>,
    pub study_id: Option<i64>,
    pub latest_milestone: Option<String>,
    pub recency_points: u32,
    pub recency_basis: RecencyBasis,
    pub business_score: i64,
}

/// Enumerated stage an activity event belongs to. Labels outside the known
/// set are preserved verbatim so audit output can still reference them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityCategory {
    Released,
    Respondents,
    QualifiedRespondents,
    Randomization,
    Other(String),
}

impl ActivityCategory {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "RELEASED" => ActivityCategory::Released,
            "RESPONDENTS" => ActivityCategory::Respondents,
            "QUALIFIED RESPONDENTS" => ActivityCategory::QualifiedRespondents,
            "RANDOMIZATION" => ActivityCategory::Randomization,
            _ => ActivityCategory::Other(value.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ActivityCategory::Released => "released",
            ActivityCategory::Respondents => "respondents",
            ActivityCategory::QualifiedRespondents => "qualified respondents",
            ActivityCategory::Randomization => "randomization",
            ActivityCategory::Other(raw) => raw,
        }
    }
}

/// One row of the activity history table, many-to-one with `PatientRecord`.
///
/// The activity date is kept raw: scoring reports unparseable dates verbatim
/// rather than silently dropping the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub patient_id: PatientId,
    pub category: ActivityCategory,
    pub date: Option<String>,
    pub indication: Option<String>,
    pub postal_code: Option<String>,
}

/// Structured constraints extracted from a free-text eligibility query.
///
/// `None` means the constraint was absent from the query. An inclusion set
/// that is present but empty means the requested term resolved to zero
/// canonical values, which callers must treat as "no patient matches".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub sex: Option<Sex>,
    pub minimum_age: Option<u32>,
    pub include_indications: Option<Vec<String>>,
    pub exclude_indications: Option<Vec<String>>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.sex.is_none()
            && self.minimum_age.is_none()
            && self.include_indications.is_none()
            && self.exclude_indications.is_none()
    }

    /// True when an inclusion filter was requested but no canonical value matched.
    pub fn inclusion_unresolved(&self) -> bool {
        self.include_indications
            .as_ref()
            .is_some_and(|terms| terms.is_empty())
    }
}

/// The five scoring criteria, in breakdown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    Recency,
    ScreeningStage,
    SimilarStudies,
    DistanceToSite,
    PastQualification,
}

impl Criterion {
    pub const fn label(self) -> &'static str {
        match self {
            Criterion::Recency => "Recency",
            Criterion::ScreeningStage => "Screening Stage",
            Criterion::SimilarStudies => "Similar Studies",
            Criterion::DistanceToSite => "Distance to Site",
            Criterion::PastQualification => "Past Qualification",
        }
    }
}

/// Discrete contribution to a patient's score, with the concrete values used
/// embedded in the reason so the breakdown is independently auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: Criterion,
    pub points: u32,
    pub reason: String,
}

/// Ordered per-criterion contributions plus their total.
///
/// The total is accumulated as entries are pushed, so it always equals the
/// sum of the listed point contributions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    entries: Vec<CriterionScore>,
    total: u32,
}

impl ScoreBreakdown {
    pub fn push(&mut self, entry: CriterionScore) {
        self.total += entry.points;
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[CriterionScore] {
        &self.entries
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

/// Parse the date formats seen in the activity dataset, taking only the
/// leading token so datetime strings with a time component still resolve.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let token = raw.trim().split_whitespace().next()?;
    for format in ["%m/%d/%Y", "%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(token, format) {
            return Some(date);
        }
    }
    None
}

/// Fractional years between two dates, using the mean tropical year the
/// reference datasets assume.
pub fn years_between(earlier: NaiveDate, later: NaiveDate) -> f64 {
    (later - earlier).num_days() as f64 / 365.25
}
