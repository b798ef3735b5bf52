use chrono::{DateTime, Local, NaiveDate};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{FetchError, FetchResult, TransportError};
use crate::models::{
    ApplicationRecord, ApplicationRow, ApplicationsEnvelope, BackendStatus, JobSummary,
    StatusFilter, UiStatus,
};
use crate::transport::Transport;

const UNKNOWN_JOB: &str = "Unknown Job";
const UNKNOWN_COMPANY: &str = "Unknown Company";
const UNKNOWN_LOCATION: &str = "Unknown Location";

pub struct StatusViewer {
    transport: Arc<dyn Transport>,
    read_url: Url,
    timeout: Duration,
    applications: Vec<ApplicationRecord>,
    sample: bool,
    last_error: Option<FetchError>,
}

impl StatusViewer {
    pub fn new(transport: Arc<dyn Transport>, read_url: Url, timeout: Duration) -> Self {
        Self {
            transport,
            read_url,
            timeout,
            applications: Vec::new(),
            sample: false,
            last_error: None,
        }
    }

    pub fn applications(&self) -> &[ApplicationRecord] {
        &self.applications
    }

    pub fn is_sample(&self) -> bool {
        self.sample
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub async fn refresh(&mut self, token: Option<&str>, cancel: &CancellationToken) -> FetchResult<()> {
        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            tracing::warn!("no credential available, skipping application fetch");
            self.last_error = Some(FetchError::Unauthenticated);
            return Err(FetchError::Unauthenticated);
        };

        match self.fetch(token, cancel).await {
            Ok(applications) => {
                tracing::info!(count = applications.len(), "applications loaded");
                self.applications = applications;
                self.sample = false;
                self.last_error = None;
                Ok(())
            }
            Err(FetchError::Cancelled) => {
                tracing::debug!("application fetch cancelled");
                Err(FetchError::Cancelled)
            }
            Err(e) => {
                tracing::warn!(error = %e, endpoint = %self.read_url, "application fetch failed, showing sample data");
                self.applications = sample_applications();
                self.sample = true;
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn fetch(&self, token: &str, cancel: &CancellationToken) -> FetchResult<Vec<ApplicationRecord>> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.transport.get(&self.read_url, token)) => {
                result.unwrap_or(Err(TransportError::Timeout))?
            }
        };

        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
            });
        }
        if !response.is_json() {
            return Err(FetchError::NotJson {
                status: response.status,
            });
        }

        let envelope: ApplicationsEnvelope =
            serde_json::from_str(&response.body).map_err(|e| FetchError::Parse(e.to_string()))?;
        Ok(envelope.applications)
    }

    pub fn rows(&self, filter: StatusFilter, query: &str) -> Vec<ApplicationRow> {
        filter_rows(&self.applications, filter, query)
    }
}

pub fn to_row(record: &ApplicationRecord) -> ApplicationRow {
    let job = record.job.as_ref();
    ApplicationRow {
        id: record.id.clone(),
        title: or_placeholder(job.and_then(|j| j.title.as_deref()), UNKNOWN_JOB),
        company: or_placeholder(job.and_then(|j| j.company.as_deref()), UNKNOWN_COMPANY),
        location: or_placeholder(job.and_then(|j| j.location.as_deref()), UNKNOWN_LOCATION),
        status: UiStatus::from(&record.status),
        date: format_date(record.applied_date.as_deref()),
    }
}

fn or_placeholder(value: Option<&str>, placeholder: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => placeholder.to_string(),
    }
}

pub fn filter_rows(records: &[ApplicationRecord], filter: StatusFilter, query: &str) -> Vec<ApplicationRow> {
    let query = query.to_lowercase();
    records
        .iter()
        .map(to_row)
        .filter(|row| filter.matches(row.status))
        .filter(|row| matches_query(row, &query))
        .collect()
}

fn matches_query(row: &ApplicationRow, query: &str) -> bool {
    query.is_empty()
        || row.title.to_lowercase().contains(query)
        || row.company.to_lowercase().contains(query)
        || row.location.to_lowercase().contains(query)
}

// Local calendar date, m/d/yyyy
pub fn format_date(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format("%-m/%-d/%Y").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%-m/%-d/%Y").to_string();
    }
    raw.to_string()
}

pub fn sample_applications() -> Vec<ApplicationRecord> {
    let sample = |id: &str, status: BackendStatus, title: &str, company: &str, location: &str, date: &str| {
        ApplicationRecord {
            id: id.to_string(),
            job_id: format!("{}-job", id),
            full_name: "Sample Applicant".to_string(),
            email: "applicant@example.com".to_string(),
            phone: "555-0100".to_string(),
            resume: "resume.pdf".to_string(),
            cover_letter: None,
            applied_date: Some(date.to_string()),
            status,
            job: Some(JobSummary {
                title: Some(title.to_string()),
                company: Some(company.to_string()),
                location: Some(location.to_string()),
                job_type: Some("Full-time".to_string()),
                logo: None,
            }),
        }
    };

    vec![
        sample("sample-1", BackendStatus::Pending, "Frontend Developer", "Sample Tech", "Remote", "2024-01-15T12:00:00Z"),
        sample("sample-2", BackendStatus::Interview, "Backend Engineer", "Example Systems", "New York, NY", "2024-01-10T12:00:00Z"),
        sample("sample-3", BackendStatus::Accepted, "Data Analyst", "Demo Analytics", "Austin, TX", "2024-01-05T12:00:00Z"),
        sample("sample-4", BackendStatus::Rejected, "Product Designer", "Placeholder Labs", "San Francisco, CA", "2023-12-20T12:00:00Z"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::{FakeTransport, Reply};
    use chrono::{Datelike, TimeZone, Utc};
    use serde_json::json;

    const READ: &str = "/api/applications/user";

    fn viewer(fake: &Arc<FakeTransport>) -> StatusViewer {
        let url = Url::parse("http://jobs.test").unwrap().join(READ).unwrap();
        StatusViewer::new(fake.clone(), url, Duration::from_secs(5))
    }

    fn record(id: &str, status: &str, job: Option<(&str, &str, &str)>) -> ApplicationRecord {
        ApplicationRecord {
            id: id.to_string(),
            job_id: String::new(),
            full_name: String::new(),
            email: String::new(),
            phone: String::new(),
            resume: String::new(),
            cover_letter: None,
            applied_date: None,
            status: BackendStatus::from(status.to_string()),
            job: job.map(|(t, c, l)| JobSummary {
                title: Some(t.into()),
                company: Some(c.into()),
                location: Some(l.into()),
                ..Default::default()
            }),
        }
    }

    fn ids(rows: &[ApplicationRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_accepted_record_shows_under_offer_only() {
        let fake = Arc::new(FakeTransport::new().on(
            READ,
            Reply::json(200, json!({"applications": [{"id": "a1", "status": "accepted", "job": {"title": "X", "company": "Y", "location": "Z"}}]})),
        ));
        let mut v = viewer(&fake);

        v.refresh(Some("tok"), &CancellationToken::new()).await.unwrap();

        assert!(!v.is_sample());
        assert_eq!(ids(&v.rows(StatusFilter::Offer, "")), vec!["a1"]);
        assert!(v.rows(StatusFilter::Rejected, "").is_empty());
        assert_eq!(fake.calls()[0].bearer.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_mixed_id_kinds_and_null_status_load() {
        let fake = Arc::new(FakeTransport::new().on(
            READ,
            Reply::json(200, json!({"applications": [
                {"id": "a1", "status": "accepted", "job": {"title": "X", "company": "Y", "location": "Z"}},
                {"id": 42, "status": null, "job": null}
            ]})),
        ));
        let mut v = viewer(&fake);

        v.refresh(Some("tok"), &CancellationToken::new()).await.unwrap();

        assert!(!v.is_sample());
        assert!(v.last_error().is_none());
        assert_eq!(ids(&v.rows(StatusFilter::All, "")), vec!["a1", "42"]);
        assert_eq!(ids(&v.rows(StatusFilter::Applied, "")), vec!["42"]);
    }

    #[tokio::test]
    async fn test_html_response_falls_back_to_sample() {
        let fake = Arc::new(FakeTransport::new().on(READ, Reply::raw(200, "text/html", "<html></html>")));
        let mut v = viewer(&fake);

        let err = v.refresh(Some("tok"), &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err, FetchError::NotJson { status: 200 });
        assert_eq!(v.last_error(), Some(&FetchError::NotJson { status: 200 }));
        assert!(v.is_sample());
        assert!(!v.rows(StatusFilter::All, "").is_empty());
    }

    #[tokio::test]
    async fn test_each_failure_kind_uses_sample() {
        let replies = [
            Reply::refused(),
            Reply::json(500, json!({"error": "boom"})),
            Reply::raw(200, "application/json", "[oops"),
            Reply::json(200, json!({"items": []})),
        ];
        for reply in replies {
            let fake = Arc::new(FakeTransport::new().on(READ, reply));
            let mut v = viewer(&fake);
            assert!(v.refresh(Some("tok"), &CancellationToken::new()).await.is_err());
            assert!(v.is_sample());
            assert_eq!(v.applications().len(), sample_applications().len());
            assert!(v.last_error().is_some());
        }
    }

    #[tokio::test]
    async fn test_status_error_checked_before_content_type() {
        let fake = Arc::new(FakeTransport::new().on(READ, Reply::raw(401, "text/html", "denied")));
        let mut v = viewer(&fake);

        let err = v.refresh(Some("tok"), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, FetchError::Status { status: 401 });
    }

    #[tokio::test]
    async fn test_missing_token_makes_no_call() {
        let fake = Arc::new(FakeTransport::new());
        let mut v = viewer(&fake);

        assert_eq!(v.refresh(None, &CancellationToken::new()).await, Err(FetchError::Unauthenticated));
        assert_eq!(v.refresh(Some(""), &CancellationToken::new()).await, Err(FetchError::Unauthenticated));
        assert!(fake.calls().is_empty());
        assert!(v.applications().is_empty());
        assert!(!v.is_sample());
        assert_eq!(v.last_error(), Some(&FetchError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_success_replaces_list_and_clears_error() {
        let fake = Arc::new(
            FakeTransport::new()
                .on(READ, Reply::refused())
                .on(READ, Reply::json(200, json!({"applications": [{"id": "r1", "status": "pending"}]})))
                .on(READ, Reply::json(200, json!({"applications": [{"id": "r2", "status": "reviewed"}]}))),
        );
        let mut v = viewer(&fake);
        let cancel = CancellationToken::new();

        let _ = v.refresh(Some("tok"), &cancel).await;
        assert!(v.is_sample());

        v.refresh(Some("tok"), &cancel).await.unwrap();
        assert!(!v.is_sample());
        assert!(v.last_error().is_none());
        assert_eq!(ids(&v.rows(StatusFilter::All, "")), vec!["r1"]);

        v.refresh(Some("tok"), &cancel).await.unwrap();
        assert_eq!(ids(&v.rows(StatusFilter::All, "")), vec!["r2"]);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_leaves_state_alone() {
        let fake = Arc::new(FakeTransport::new().on(READ, Reply::Hang));
        let mut v = viewer(&fake);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(v.refresh(Some("tok"), &cancel).await, Err(FetchError::Cancelled));
        assert!(v.applications().is_empty());
        assert!(!v.is_sample());
        assert!(v.last_error().is_none());
    }

    #[tokio::test]
    async fn test_hung_fetch_times_out_to_sample() {
        let fake = Arc::new(FakeTransport::new().on(READ, Reply::Hang));
        let url = Url::parse("http://jobs.test").unwrap().join(READ).unwrap();
        let mut v = StatusViewer::new(fake.clone(), url, Duration::from_millis(50));

        let err = v.refresh(Some("tok"), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, FetchError::Transport(TransportError::Timeout));
        assert!(v.is_sample());
    }

    #[test]
    fn test_missing_job_uses_placeholders() {
        let row = to_row(&record("n1", "pending", None));
        assert_eq!(row.title, "Unknown Job");
        assert_eq!(row.company, "Unknown Company");
        assert_eq!(row.location, "Unknown Location");
        assert_eq!(row.status, UiStatus::Applied);
        assert_eq!(row.date, "");
    }

    #[test]
    fn test_search_is_case_insensitive_over_three_fields() {
        let records = vec![
            record("1", "pending", Some(("Rust Engineer", "Ferrous", "Berlin"))),
            record("2", "interview", Some(("Designer", "Acme", "Remote"))),
            record("3", "accepted", Some(("Analyst", "RustCo", "Oslo"))),
        ];
        assert_eq!(ids(&filter_rows(&records, StatusFilter::All, "rust")), vec!["1", "3"]);
        assert_eq!(ids(&filter_rows(&records, StatusFilter::All, "REMOTE")), vec!["2"]);
        assert_eq!(ids(&filter_rows(&records, StatusFilter::All, "")), vec!["1", "2", "3"]);
        assert!(filter_rows(&records, StatusFilter::All, "nowhere").is_empty());
    }

    #[test]
    fn test_filter_is_conjunction_of_status_and_search() {
        let records = vec![
            record("1", "pending", Some(("Rust Engineer", "Ferrous", "Berlin"))),
            record("2", "reviewed", Some(("Go Engineer", "Gopher", "Berlin"))),
            record("3", "accepted", Some(("Rust Lead", "RustCo", "Oslo"))),
        ];
        assert_eq!(ids(&filter_rows(&records, StatusFilter::Applied, "rust")), vec!["1"]);
        assert_eq!(ids(&filter_rows(&records, StatusFilter::Applied, "berlin")), vec!["1", "2"]);
        assert_eq!(ids(&filter_rows(&records, StatusFilter::Offer, "berlin")), Vec::<&str>::new());
        assert!(filter_rows(&records, StatusFilter::Interview, "").is_empty());
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let records = sample_applications();
        let once = filter_rows(&records, StatusFilter::Interview, "engineer");
        let twice = filter_rows(&records, StatusFilter::Interview, "engineer");
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec!["sample-2"]);
    }

    #[test]
    fn test_sample_covers_every_ui_status() {
        let statuses: Vec<UiStatus> = sample_applications().iter().map(|r| UiStatus::from(&r.status)).collect();
        for s in [UiStatus::Applied, UiStatus::Interview, UiStatus::Offer, UiStatus::Rejected] {
            assert!(statuses.contains(&s));
        }
    }

    #[test]
    fn test_format_date() {
        let local = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap().with_timezone(&Local);
        let expected = format!("{}/{}/{}", local.month(), local.day(), local.year());
        assert_eq!(format_date(Some("2024-03-01T12:00:00Z")), expected);
        assert_eq!(format_date(Some("2024-11-20")), "11/20/2024");
        assert_eq!(format_date(Some("yesterday")), "yesterday");
        assert_eq!(format_date(None), "");
    }
}
