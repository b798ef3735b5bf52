use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default)]
pub struct ApplicationForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub resume: String, // file name placeholder, nothing is uploaded
    pub cover_letter: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub job_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub resume: String,
    pub cover_letter: String,
}

impl NewApplication {
    pub fn new(job_id: &str, form: &ApplicationForm) -> Self {
        Self {
            job_id: job_id.to_string(),
            full_name: form.full_name.clone(),
            email: form.email.clone(),
            phone: form.phone.clone(),
            resume: form.resume.clone(),
            cover_letter: form.cover_letter.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct JobSummary {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, rename = "type")]
    pub job_type: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

// Only `id` is mandatory; the backend is loose about the rest.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub job_id: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub full_name: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub phone: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub resume: String,
    #[serde(default)]
    pub cover_letter: Option<String>,
    #[serde(default)]
    pub applied_date: Option<String>,
    #[serde(default, deserialize_with = "status_or_pending")]
    pub status: BackendStatus,
    #[serde(default)]
    pub job: Option<JobSummary>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationsEnvelope {
    pub applications: Vec<ApplicationRecord>,
}

// Server ids arrive as strings or numbers.
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    id_from_value(&value).ok_or_else(|| de::Error::custom(format!("expected string or number id, got {}", value)))
}

fn text_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        value => id_from_value(&value)
            .ok_or_else(|| de::Error::custom(format!("expected text, got {}", value))),
    }
}

fn status_or_pending<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BackendStatus, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(BackendStatus::from).unwrap_or_default())
}

// Unmodelled values are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackendStatus {
    #[default]
    Pending,
    Reviewed,
    Interview,
    Rejected,
    Accepted,
    Other(String),
}

impl From<String> for BackendStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => BackendStatus::Pending,
            "reviewed" => BackendStatus::Reviewed,
            "interview" => BackendStatus::Interview,
            "rejected" => BackendStatus::Rejected,
            "accepted" => BackendStatus::Accepted,
            _ => BackendStatus::Other(value),
        }
    }
}

impl BackendStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BackendStatus::Pending => "pending",
            BackendStatus::Reviewed => "reviewed",
            BackendStatus::Interview => "interview",
            BackendStatus::Rejected => "rejected",
            BackendStatus::Accepted => "accepted",
            BackendStatus::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiStatus {
    Applied,
    Interview,
    Rejected,
    Offer,
}

impl UiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiStatus::Applied => "applied",
            UiStatus::Interview => "interview",
            UiStatus::Rejected => "rejected",
            UiStatus::Offer => "offer",
        }
    }
}

impl fmt::Display for UiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<&BackendStatus> for UiStatus {
    fn from(status: &BackendStatus) -> Self {
        match status {
            BackendStatus::Pending | BackendStatus::Reviewed => UiStatus::Applied,
            BackendStatus::Interview => UiStatus::Interview,
            BackendStatus::Rejected => UiStatus::Rejected,
            BackendStatus::Accepted => UiStatus::Offer,
            BackendStatus::Other(_) => UiStatus::Applied,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StatusFilter {
    #[default]
    All,
    Applied,
    Interview,
    Offer,
    Rejected,
}

impl StatusFilter {
    pub const ORDER: [StatusFilter; 5] = [
        StatusFilter::All,
        StatusFilter::Applied,
        StatusFilter::Interview,
        StatusFilter::Offer,
        StatusFilter::Rejected,
    ];

    pub fn matches(&self, status: UiStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Applied => status == UiStatus::Applied,
            StatusFilter::Interview => status == UiStatus::Interview,
            StatusFilter::Offer => status == UiStatus::Offer,
            StatusFilter::Rejected => status == UiStatus::Rejected,
        }
    }

    pub fn cycle(&self) -> Self {
        let idx = Self::ORDER.iter().position(|f| f == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Applied => "applied",
            StatusFilter::Interview => "interview",
            StatusFilter::Offer => "offer",
            StatusFilter::Rejected => "rejected",
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .iter()
            .find(|f| f.as_str() == s.to_lowercase())
            .copied()
            .ok_or_else(|| format!("unknown status filter '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRow {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub status: UiStatus,
    pub date: String,
}

#[derive(Debug, Clone)]
pub struct SavedJob {
    pub job_id: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub saved_at: String,
}

#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub application_id: String,
    pub job_id: String,
    pub fallback: bool,
    pub submitted_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_is_total() {
        let cases = [
            ("pending", UiStatus::Applied),
            ("reviewed", UiStatus::Applied),
            ("interview", UiStatus::Interview),
            ("rejected", UiStatus::Rejected),
            ("accepted", UiStatus::Offer),
            ("withdrawn", UiStatus::Applied),
            ("", UiStatus::Applied),
        ];
        for (raw, expected) in cases {
            let status = BackendStatus::from(raw.to_string());
            assert_eq!(UiStatus::from(&status), expected, "status {:?}", raw);
        }
    }

    #[test]
    fn test_unknown_status_keeps_raw_value() {
        let status = BackendStatus::from("on_hold".to_string());
        assert_eq!(status, BackendStatus::Other("on_hold".to_string()));
        assert_eq!(status.as_str(), "on_hold");
    }

    #[test]
    fn test_record_deserializes_with_sparse_fields() {
        let json = r#"{"id":"a1","status":"accepted","job":{"title":"X","company":"Y","location":"Z"}}"#;
        let record: ApplicationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "a1");
        assert_eq!(record.status, BackendStatus::Accepted);
        assert_eq!(record.job.unwrap().title.as_deref(), Some("X"));
        assert!(record.applied_date.is_none());
    }

    #[test]
    fn test_record_accepts_null_job() {
        let json = r#"{"id":"a2","status":"pending","job":null,"appliedDate":"2024-03-01T10:00:00Z"}"#;
        let record: ApplicationRecord = serde_json::from_str(json).unwrap();
        assert!(record.job.is_none());
        assert_eq!(record.applied_date.as_deref(), Some("2024-03-01T10:00:00Z"));
    }

    #[test]
    fn test_numeric_ids_accepted() {
        let json = r#"{"id":42,"jobId":7,"status":"interview"}"#;
        let record: ApplicationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.job_id, "7");
        assert_eq!(record.status, BackendStatus::Interview);
    }

    #[test]
    fn test_null_fields_use_defaults() {
        let json = r#"{"id":"a3","status":null,"fullName":null,"phone":null}"#;
        let record: ApplicationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, BackendStatus::Pending);
        assert_eq!(record.full_name, "");
        assert_eq!(record.phone, "");
    }

    #[test]
    fn test_missing_or_odd_id_rejected() {
        assert!(serde_json::from_str::<ApplicationRecord>(r#"{"status":"pending"}"#).is_err());
        assert!(serde_json::from_str::<ApplicationRecord>(r#"{"id":null}"#).is_err());
        assert!(serde_json::from_str::<ApplicationRecord>(r#"{"id":{"oid":"x"}}"#).is_err());
    }

    #[test]
    fn test_new_application_serializes_camel_case() {
        let form = ApplicationForm {
            full_name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "555".into(),
            resume: "cv.pdf".into(),
            cover_letter: String::new(),
        };
        let value = serde_json::to_value(NewApplication::new("job-1", &form)).unwrap();
        assert_eq!(value["jobId"], "job-1");
        assert_eq!(value["fullName"], "Ada Lovelace");
        assert_eq!(value["coverLetter"], "");
    }

    #[test]
    fn test_status_filter_cycle_wraps() {
        let mut filter = StatusFilter::All;
        for _ in 0..StatusFilter::ORDER.len() {
            filter = filter.cycle();
        }
        assert_eq!(filter, StatusFilter::All);
        assert_eq!(StatusFilter::Rejected.cycle(), StatusFilter::All);
    }

    #[test]
    fn test_status_filter_from_str() {
        assert_eq!("Offer".parse::<StatusFilter>().unwrap(), StatusFilter::Offer);
        assert!("pending".parse::<StatusFilter>().is_err());
    }
}
