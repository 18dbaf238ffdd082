use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError, ValidationErrors};

/// One freelance listing as returned by the API
///
/// Only the fields the client needs for identity and cards are typed.
/// Everything else the backend sends is kept in `extra` and serialized back
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRecord {
    pub fn is_owned_by(&self, email: &str) -> bool {
        self.user_email
            .as_deref()
            .is_some_and(|owner| owner.eq_ignore_ascii_case(email))
    }
}

/// Posting-time ordering, applied by the endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Ascending,
    #[default]
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "oldest" => Ok(SortOrder::Ascending),
            "desc" | "descending" | "newest" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order '{}' (expected asc or desc)", other)),
        }
    }
}

/// Where the work happens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkLocation {
    #[default]
    Remote,
    #[serde(rename = "On-site")]
    OnSite,
    Hybrid,
}

impl WorkLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkLocation::Remote => "Remote",
            WorkLocation::OnSite => "On-site",
            WorkLocation::Hybrid => "Hybrid",
        }
    }
}

impl fmt::Display for WorkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "remote" => Ok(WorkLocation::Remote),
            "onsite" => Ok(WorkLocation::OnSite),
            "hybrid" => Ok(WorkLocation::Hybrid),
            other => Err(format!(
                "unknown location '{}' (expected remote, on-site or hybrid)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    #[default]
    Fixed,
    Hourly,
}

/// Job category as listed by `/categories`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    pub name: String,
}

/// Payload for posting or updating a job
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct JobDraft {
    #[validate(length(min = 1, max = 120, message = "Title is required (max 120 characters)"))]
    pub title: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub summary: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    pub budget_type: BudgetType,
    #[validate(range(min = 0.0, message = "Budget cannot be negative"))]
    pub budget_min: f64,
    #[validate(range(min = 0.0, message = "Budget cannot be negative"))]
    pub budget_max: f64,
    pub currency: String,

    pub duration: u32,
    pub duration_unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,

    pub experience_level: String,
    pub skills: Vec<String>,
    #[validate(range(min = 1, message = "At least one position is required"))]
    pub number_of_positions: u32,

    pub location_type: WorkLocation,
    pub location: String,
    pub working_hours: String,

    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "Cover image must be a URL"))]
    pub cover_image: Option<String>,

    pub posted_by: String,
    pub status: String,
    pub applicants: u32,
}

impl JobDraft {
    /// Trim free-text fields and drop blank or repeated skills
    pub fn normalize(&mut self) {
        for field in [
            &mut self.title,
            &mut self.summary,
            &mut self.description,
            &mut self.location,
        ] {
            *field = field.trim().to_string();
        }
        if self.cover_image.as_deref().is_some_and(|url| url.trim().is_empty()) {
            self.cover_image = None;
        }

        let skills = std::mem::take(&mut self.skills);
        for skill in skills {
            self.add_skill(&skill);
        }

        if self.status.is_empty() {
            self.status = "open".to_string();
        }
        if self.posted_by.trim().is_empty() {
            self.posted_by = "Anonymous".to_string();
        }
    }

    pub fn add_skill(&mut self, skill: &str) -> bool {
        let skill = skill.trim();
        if skill.is_empty() || self.skills.iter().any(|s| s == skill) {
            return false;
        }
        self.skills.push(skill.to_string());
        true
    }

    /// Field validation plus the cross-field budget rule
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if self.budget_max > 0.0 && self.budget_min > self.budget_max {
            errors.add(
                "budget_max",
                ValidationError::new("budget_range")
                    .with_message("Maximum budget must not be below the minimum".into()),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Snapshot stored when a user takes on a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedJob {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub posted_by: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub user_email: String,
    pub accepted_at: DateTime<Utc>,
}

impl AcceptedJob {
    pub fn from_job(job: &JobRecord, user_email: &str, accepted_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            title: job.title.clone(),
            posted_by: job.posted_by.clone(),
            category: job.category.clone(),
            summary: job.summary.clone(),
            cover_image: job.cover_image.clone(),
            user_email: user_email.to_string(),
            accepted_at,
        }
    }
}

/// Counters behind the user dashboard
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub total_jobs_posted: u64,
    pub total_jobs_accepted: u64,
    pub completed_jobs: u64,
    pub in_progress_jobs: u64,
    pub total_earnings: f64,
}
