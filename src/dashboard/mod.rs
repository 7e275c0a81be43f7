//! Client for the dashboard's `create` endpoints.
//!
//! Every loader turns its records into an ordered list of form fields and
//! POSTs them one at a time as `application/x-www-form-urlencoded`. There are
//! no retries. A record the dashboard refuses is reported as a warning. A
//! transport failure stops the batch.

mod transport;

pub use transport::{BasicClient, HttpClient};

use std::fmt;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{LoaderError, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:9000";

/// Ordered form fields; a key may repeat.
pub type Form = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    NtdAgencies,
    GtfsFeeds,
    MetroAreas,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::NtdAgencies => "/api/ntdagencies/create",
            Endpoint::GtfsFeeds => "/api/gtfsfeeds/create",
            Endpoint::MetroAreas => "/api/metroareas/create",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A record that can be sent to a create endpoint.
pub trait FormRecord {
    /// Human-readable identification used in logs and warnings.
    fn label(&self) -> String;

    fn to_form(&self) -> Form;
}

/// What the dashboard made of one create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The body reported `"status": "success"`.
    Created,
    /// 2xx without a status body.
    Accepted,
    Rejected { reason: String },
    /// Nothing was sent.
    DryRun,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
    message: Option<String>,
}

/// Classifies a create response from its status code and body.
pub fn interpret_response(status: StatusCode, body: &str) -> CreateOutcome {
    if !status.is_success() {
        let reason = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", body.trim())
        };
        return CreateOutcome::Rejected { reason };
    }

    match serde_json::from_str::<StatusBody>(body) {
        Ok(parsed) if parsed.status == "success" => CreateOutcome::Created,
        Ok(parsed) => CreateOutcome::Rejected {
            reason: match parsed.message {
                Some(message) => format!("status {}: {message}", parsed.status),
                None => format!("status {}", parsed.status),
            },
        },
        Err(_) => CreateOutcome::Accepted,
    }
}

/// URL-encodes `form`, keeping field order and repeated keys.
pub fn encode_form(form: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

/// Tally of one [`Dashboard::publish`] run.
#[derive(Debug, Default)]
pub struct PublishSummary {
    /// Records actually POSTed.
    pub sent: usize,
    /// Answered with `"status": "success"`.
    pub created: usize,
    /// 2xx without a status body.
    pub accepted: usize,
    pub rejected: usize,
    /// Records only logged because of dry run.
    pub dry_run: usize,
    pub warnings: Vec<LoaderError>,
}

pub struct Dashboard<C> {
    client: C,
    base_url: Url,
    dry_run: bool,
}

impl<C: HttpClient> Dashboard<C> {
    /// The base URL may carry a path prefix; endpoints are resolved under it.
    pub fn new(client: C, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client,
            base_url,
            dry_run: false,
        })
    }

    /// When set, forms are logged instead of sent.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL of `endpoint` under the base URL.
    pub fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url> {
        Ok(self.base_url.join(endpoint.path().trim_start_matches('/'))?)
    }

    /// POSTs one form to `endpoint`.
    #[tracing::instrument(skip_all, fields(endpoint = %endpoint, fields = form.len()))]
    pub async fn create(&self, endpoint: Endpoint, form: &[(String, String)]) -> Result<CreateOutcome> {
        let body = encode_form(form);

        if self.dry_run {
            info!(body = %body, "Dry run, not sending");
            return Ok(CreateOutcome::DryRun);
        }

        let url = self.endpoint_url(endpoint)?;
        let mut req = Request::new(Method::POST, url);
        req.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        *req.body_mut() = Some(body.into());

        let resp = self.client.execute(req).await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!(%status, bytes = text.len(), "Create response received");

        Ok(interpret_response(status, &text))
    }

    /// Sends every record in order, collecting refusals as warnings.
    pub async fn publish<R: FormRecord>(&self, endpoint: Endpoint, records: &[R]) -> Result<PublishSummary> {
        let mut summary = PublishSummary::default();

        for record in records {
            let outcome = self.create(endpoint, &record.to_form()).await?;
            if outcome != CreateOutcome::DryRun {
                summary.sent += 1;
            }

            match outcome {
                CreateOutcome::Created => summary.created += 1,
                CreateOutcome::Accepted => summary.accepted += 1,
                CreateOutcome::DryRun => summary.dry_run += 1,
                CreateOutcome::Rejected { reason } => {
                    let label = record.label();
                    warn!(%endpoint, record = %label, %reason, "Record failed to load");
                    summary.rejected += 1;
                    summary.warnings.push(LoaderError::Rejected {
                        endpoint: endpoint.to_string(),
                        record: label,
                        reason,
                    });
                }
            }
        }

        info!(
            %endpoint,
            sent = summary.sent,
            created = summary.created,
            accepted = summary.accepted,
            rejected = summary.rejected,
            dry_run = summary.dry_run,
            "Publish complete"
        );
        Ok(summary)
    }
}
