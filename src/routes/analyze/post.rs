use std::collections::HashMap;
use std::time::Duration;

use actix_web::{HttpResponse, web};
use anyhow::Context;
use chrono::{Days, Utc};
use jsonwebtoken::EncodingKey;

use crate::configuration::Ga4Settings;
use crate::errors::AnalyzeError;
use crate::ga4::{
    Ga4Client, PageMetrics, ServiceAccountKey, fetch_access_token, sign_assertion, signing_key,
};
use crate::telemetry::spawn_blocking_with_tracing;

const DEFAULT_DAYS_BACK: i64 = 7;

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeForm {
    // the automation tool this fronts still sends snake_case, hence the aliases
    #[serde(default, alias = "property_id")]
    property_id: Option<String>,
    #[serde(default)]
    credentials: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<Vec<String>>,
    #[serde(default, alias = "days_back")]
    days_back: Option<i64>,
}

struct ValidatedAnalyzeRequest {
    property_id: String,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    // extracted path per input url, input order preserved
    page_paths: Vec<String>,
    days_back: i64,
}

impl AnalyzeForm {
    fn validate(self) -> Result<ValidatedAnalyzeRequest, AnalyzeError> {
        let property_id = self
            .property_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(AnalyzeError::MissingPropertyId)?;
        if !property_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AnalyzeError::InvalidPropertyId(property_id.to_string()));
        }

        let credentials = self.credentials.ok_or(AnalyzeError::MissingCredentials)?;
        let key = ServiceAccountKey::from_json(credentials)
            .map_err(AnalyzeError::MalformedCredentials)?;
        let encoding_key = signing_key(&key).map_err(|e| {
            AnalyzeError::MalformedCredentials(format!("private_key is not a usable RSA key: {e}"))
        })?;

        let urls = self.urls.unwrap_or_default();
        if urls.is_empty() {
            return Err(AnalyzeError::NoUrls);
        }
        let page_paths = urls
            .iter()
            .map(|url| page_path(url))
            .collect::<Result<Vec<_>, _>>()?;

        let days_back = match self.days_back {
            None => DEFAULT_DAYS_BACK,
            Some(days) if days >= 1 => days,
            Some(_) => return Err(AnalyzeError::InvalidDaysBack),
        };

        Ok(ValidatedAnalyzeRequest {
            property_id: property_id.to_string(),
            key,
            encoding_key,
            page_paths,
            days_back,
        })
    }
}

// join key for matching report rows: the path component, host and scheme stripped
fn page_path(url: &str) -> Result<String, AnalyzeError> {
    if url.starts_with('/') {
        return Ok(url.to_string());
    }
    let parsed =
        reqwest::Url::parse(url).map_err(|_| AnalyzeError::InvalidUrl(url.to_string()))?;
    let path = parsed.path();
    if path.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(path.to_string())
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetricRecord {
    page_path: String,
    sessions: i64,
    total_users: i64,
    bounce_rate: f64,
    average_session_duration: f64,
    engaged_sessions: i64,
}

impl PageMetricRecord {
    fn from_report(page_path: String, metrics: &PageMetrics) -> Self {
        Self {
            page_path,
            sessions: metrics.sessions,
            total_users: metrics.total_users,
            bounce_rate: metrics.bounce_rate,
            average_session_duration: metrics.average_session_duration,
            engaged_sessions: metrics.engaged_sessions,
        }
    }

    // pages with no rows in the window are reported as zero activity,
    // not dropped: callers rely on output position matching input order
    const fn zeroed(page_path: String) -> Self {
        Self {
            page_path,
            sessions: 0,
            total_users: 0,
            bounce_rate: 0.0,
            average_session_duration: 0.0,
            engaged_sessions: 0,
        }
    }
}

#[derive(serde::Serialize)]
struct AnalyzeResponse {
    success: bool,
    data: Vec<PageMetricRecord>,
}

#[tracing::instrument(
    name = "Run page metrics report",
    skip(form, ga4),
    fields(property_id = tracing::field::Empty, url_count = tracing::field::Empty)
)]
pub async fn analyze(
    form: web::Json<AnalyzeForm>,
    ga4: web::Data<Ga4Settings>,
) -> Result<HttpResponse, actix_web::Error> {
    let request = form.into_inner().validate()?;
    tracing::Span::current()
        .record("property_id", tracing::field::display(&request.property_id))
        .record("url_count", request.page_paths.len() as u64);

    let end_date = Utc::now().date_naive();
    let start_date = end_date
        .checked_sub_days(Days::new(request.days_back as u64))
        .ok_or(AnalyzeError::InvalidDaysBack)?;

    // everything that can authenticate lives only for this request:
    // the http client, the signed assertion and the access token all drop here
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(ga4.upstream_timeout_secs))
        .build()
        .context("Failed to build the upstream HTTP client")
        .map_err(AnalyzeError::UnexpectedError)?;

    let signing_input = (request.key.clone(), request.encoding_key.clone());
    let assertion = spawn_blocking_with_tracing(move || {
        sign_assertion(&signing_input.0, &signing_input.1)
    })
    .await
    .context("Signing task failed")
    .map_err(AnalyzeError::UnexpectedError)?
    .context("Failed to sign the service-account assertion")
    .map_err(AnalyzeError::UnexpectedError)?;

    let token = fetch_access_token(&http, &request.key, assertion)
        .await
        .map_err(AnalyzeError::from)?;
    let client = Ga4Client::new(http, ga4.api_base_url.clone(), token);

    let report = client
        .run_report(
            &request.property_id,
            start_date,
            end_date,
            ga4.report_row_limit,
        )
        .await
        .map_err(AnalyzeError::from)?;

    let by_path: HashMap<&str, &PageMetrics> = report
        .iter()
        .map(|row| (row.page_path.as_str(), row))
        .collect();

    let data = request
        .page_paths
        .into_iter()
        .map(|path| match by_path.get(path.as_str()) {
            Some(metrics) => PageMetricRecord::from_report(path, metrics),
            None => PageMetricRecord::zeroed(path),
        })
        .collect();

    Ok(HttpResponse::Ok().json(AnalyzeResponse {
        success: true,
        data,
    }))
}
