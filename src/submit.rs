use reqwest::Url;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{SubmitError, SubmitResult, TransportError};
use crate::models::{id_from_value, ApplicationForm, NewApplication};
use crate::transport::{HttpResponse, Transport};
use crate::validate::validate;

pub const FALLBACK_NOTICE: &str =
    "The application service is running in test mode. Your application was recorded, but it may not reach the employer.";

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Confirmation { application_id: String, fallback: bool },
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Confirmation {
                application_id,
                fallback,
            } => write!(f, "/application-success?id={}&fallback={}", application_id, fallback),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub application_id: String,
    pub fallback_used: bool,
    pub notice: Option<&'static str>,
    // None when a completion callback was registered instead
    pub route: Option<Route>,
}

type CompletionCallback = Box<dyn Fn(&str) + Send + Sync>;

pub struct ApplicationSubmitter {
    transport: Arc<dyn Transport>,
    submit_url: Url,
    fallback_url: Option<Url>,
    timeout: Duration,
    on_complete: Option<CompletionCallback>,
    in_flight: AtomicBool,
}

// Clears the busy flag even when the future is dropped mid-request
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ApplicationSubmitter {
    pub fn new(
        transport: Arc<dyn Transport>,
        submit_url: Url,
        fallback_url: Option<Url>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            submit_url,
            fallback_url,
            timeout,
            on_complete: None,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn on_complete(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn submit(
        &self,
        job_id: Option<&str>,
        form: &ApplicationForm,
        cancel: &CancellationToken,
    ) -> SubmitResult<Outcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("submission ignored, another one is in flight");
            return Err(SubmitError::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        let errors = validate(form);
        if !errors.is_empty() {
            tracing::debug!(fields = errors.len(), "form failed validation");
            return Err(SubmitError::Validation(errors));
        }

        let job_id = match job_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => return Err(SubmitError::MissingJobId),
        };

        let payload = serde_json::to_value(NewApplication::new(job_id, form))
            .map_err(|e| TransportError::Other(e.to_string()))?;

        tracing::info!(job_id, endpoint = %self.submit_url, "submitting application");
        let (response, fallback_used) = match self.send(&self.submit_url, &payload, cancel).await? {
            Ok(response) => (response, false),
            Err(e) => match &self.fallback_url {
                Some(fallback) if e.allows_fallback() => {
                    tracing::warn!(job_id, error = %e, endpoint = %fallback, "primary endpoint unreachable, using fallback");
                    (self.send(fallback, &payload, cancel).await??, true)
                }
                _ => {
                    tracing::warn!(job_id, error = %e, "submission failed");
                    return Err(e.into());
                }
            },
        };

        let application_id = read_application_id(&response).inspect_err(|e| {
            tracing::warn!(job_id, status = response.status, error = %e, "submission rejected");
        })?;
        tracing::info!(job_id, application_id = %application_id, fallback = fallback_used, "application submitted");

        let route = match &self.on_complete {
            Some(callback) => {
                callback(&application_id);
                None
            }
            None => Some(Route::Confirmation {
                application_id: application_id.clone(),
                fallback: fallback_used,
            }),
        };

        Ok(Outcome {
            application_id,
            fallback_used,
            notice: fallback_used.then_some(FALLBACK_NOTICE),
            route,
        })
    }

    // Outer error aborts the submission, inner error is a transport failure
    async fn send(
        &self,
        url: &Url,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> SubmitResult<Result<HttpResponse, TransportError>> {
        tokio::select! {
            _ = cancel.cancelled() => Err(SubmitError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.transport.post_json(url, payload)) => {
                Ok(result.unwrap_or(Err(TransportError::Timeout)))
            }
        }
    }
}

fn read_application_id(response: &HttpResponse) -> SubmitResult<String> {
    if !response.is_json() {
        return Err(SubmitError::NotJson {
            status: response.status,
        });
    }

    let body: Value = serde_json::from_str(&response.body).map_err(|_| SubmitError::Parse)?;

    if !response.is_success() {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("server returned error ({})", response.status));
        return Err(SubmitError::Server(message));
    }

    let id = body
        .get("application")
        .filter(|a| a.is_object())
        .and_then(|a| a.get("id"))
        .and_then(id_from_value)
        .filter(|id| !id.is_empty());

    id.ok_or(SubmitError::InvalidData)
}
