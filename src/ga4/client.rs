use chrono::NaiveDate;

use super::token::AccessToken;
use crate::errors::Ga4Error;

pub const PAGE_PATH_DIMENSION: &str = "pagePath";

// order matters: metric values come back positionally, not keyed by name
pub const REPORT_METRICS: [&str; 5] = [
    "sessions",
    "totalUsers",
    "bounceRate",
    "averageSessionDuration",
    "engagedSessions",
];

/// One report row, already coerced out of the API's stringly-typed values.
#[derive(Debug, Clone)]
pub struct PageMetrics {
    pub page_path: String,
    pub sessions: i64,
    pub total_users: i64,
    pub bounce_rate: f64,
    pub average_session_duration: f64,
    pub engaged_sessions: i64,
}

/// A GA4 Data API client scoped to a single gateway request.
///
/// Constructed after the token exchange, dropped when the handler returns;
/// there is deliberately no way to share one across requests.
pub struct Ga4Client {
    http: reqwest::Client,
    api_base_url: String,
    token: AccessToken,
}

impl Ga4Client {
    #[must_use]
    pub const fn new(http: reqwest::Client, api_base_url: String, token: AccessToken) -> Self {
        Self {
            http,
            api_base_url,
            token,
        }
    }

    /// The one upstream query this service performs: per-path metrics for a
    /// property over a date range. No retries; the first answer is the answer.
    #[tracing::instrument(name = "Run GA4 report", skip(self))]
    pub async fn run_report(
        &self,
        property_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        limit: u32,
    ) -> Result<Vec<PageMetrics>, Ga4Error> {
        let body = RunReportBody {
            date_ranges: [ApiDateRange {
                start_date: start_date.format("%Y-%m-%d").to_string(),
                end_date: end_date.format("%Y-%m-%d").to_string(),
            }],
            dimensions: [ApiName {
                name: PAGE_PATH_DIMENSION,
            }],
            metrics: REPORT_METRICS.map(|name| ApiName { name }),
            // int64 fields travel as strings in the API's JSON encoding
            limit: limit.to_string(),
        };

        let url = format!(
            "{}/v1beta/properties/{property_id}:runReport",
            self.api_base_url
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let detail = response.text().await.unwrap_or_default();
            return Err(Ga4Error::unauthorized(format!(
                "reporting API rejected the credential ({status}): {detail}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Ga4Error::Report(error_message_from_body(status, &body)));
        }

        let report: RunReportResponse = response.json().await?;
        report.rows.into_iter().map(parse_row).collect()
    }
}

// surface google's own error.message when the body carries one
fn error_message_from_body(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<GoogleErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| format!("reporting API returned {status}: {body}"))
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportBody<'a> {
    date_ranges: [ApiDateRange; 1],
    dimensions: [ApiName<'a>; 1],
    metrics: [ApiName<'a>; 5],
    limit: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiDateRange {
    start_date: String,
    end_date: String,
}

#[derive(serde::Serialize)]
struct ApiName<'a> {
    name: &'a str,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReportResponse {
    // absent entirely when the window has no data
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    #[serde(default)]
    dimension_values: Vec<ReportValue>,
    #[serde(default)]
    metric_values: Vec<ReportValue>,
}

#[derive(serde::Deserialize)]
struct ReportValue {
    #[serde(default)]
    value: String,
}

#[derive(serde::Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(serde::Deserialize)]
struct GoogleErrorDetail {
    message: String,
}

fn parse_row(row: ReportRow) -> Result<PageMetrics, Ga4Error> {
    let page_path = row
        .dimension_values
        .first()
        .map(|v| v.value.clone())
        .unwrap_or_default();

    Ok(PageMetrics {
        page_path,
        sessions: int_metric(&row, 0)?,
        total_users: int_metric(&row, 1)?,
        bounce_rate: float_metric(&row, 2)?,
        average_session_duration: float_metric(&row, 3)?,
        engaged_sessions: int_metric(&row, 4)?,
    })
}

fn raw_metric(row: &ReportRow, index: usize) -> &str {
    row.metric_values
        .get(index)
        .map_or("", |v| v.value.as_str())
}

fn int_metric(row: &ReportRow, index: usize) -> Result<i64, Ga4Error> {
    let raw = raw_metric(row, index);
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse().map_err(|_| {
        Ga4Error::Report(format!(
            "unexpected value `{raw}` for metric `{}`",
            REPORT_METRICS[index]
        ))
    })
}

fn float_metric(row: &ReportRow, index: usize) -> Result<f64, Ga4Error> {
    let raw = raw_metric(row, index);
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse().map_err(|_| {
        Ga4Error::Report(format!(
            "unexpected value `{raw}` for metric `{}`",
            REPORT_METRICS[index]
        ))
    })
}
