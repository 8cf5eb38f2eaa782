use std::sync::OnceLock;
use std::time::Duration;

use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::QueryContext;

pub const RETRIEVE_DATA: &str = "retrieve_data";
pub const GET_RUNS: &str = "getRuns";

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("current data run '{value}' is not a run number")]
    InvalidCurrentRun { value: String },

    #[error("no {direction} run after {current}")]
    NoNeighbor {
        direction: &'static str,
        current: u64,
    },

    #[error("series and sample are required to list runs")]
    MissingSeriesOrSample,

    #[error("invalid backend endpoint: {endpoint}")]
    InvalidEndpoint { endpoint: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("run list request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },

    #[error("backend answered with status {status}")]
    Status { status: u16 },

    #[error("malformed run list response: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "next" | "n" | "+" => Some(Self::Next),
            "prev" | "previous" | "p" | "-" => Some(Self::Previous),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }
}

/// Request body handed to the submit page when switching runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationQuery {
    #[serde(rename = "type")]
    pub kind: String,
    pub series: String,
    pub sample: String,
    pub subsystem: String,
    pub data_info: String,
    pub ref_info: String,
    pub user_id: u64,
}

impl NavigationQuery {
    pub fn for_run(ctx: &QueryContext, run: u64, user_id: u64) -> Self {
        Self {
            kind: RETRIEVE_DATA.to_string(),
            series: ctx.series.clone(),
            sample: ctx.sample.clone(),
            subsystem: ctx.subsystem.clone(),
            data_info: run.to_string(),
            ref_info: ctx.ref_run.clone(),
            user_id,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunNeighbors {
    pub previous: Option<u64>,
    pub next: Option<u64>,
}

impl RunNeighbors {
    pub fn get(&self, direction: Direction) -> Option<u64> {
        match direction {
            Direction::Next => self.next,
            Direction::Previous => self.previous,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunList {
    runs: Vec<u64>,
}

impl RunList {
    pub fn new<I>(runs: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        Self {
            runs: runs.into_iter().sorted().dedup().collect(),
        }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(names.into_iter().filter_map(|n| parse_run_number(n.as_ref())))
    }

    pub fn runs(&self) -> &[u64] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Closest run below and above `current`; `current` need not be listed.
    pub fn neighbors(&self, current: u64) -> RunNeighbors {
        let below = self.runs.partition_point(|&r| r < current);
        let above = self.runs.partition_point(|&r| r <= current);
        RunNeighbors {
            previous: below.checked_sub(1).map(|i| self.runs[i]),
            next: self.runs.get(above).copied(),
        }
    }
}

fn digit_groups() -> Option<&'static Regex> {
    static DIGITS: OnceLock<Option<Regex>> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").ok()).as_ref()
}

/// Plain digits parse directly; otherwise the last digit group in the name
/// is taken (run links often carry a prefix or trailing slash).
pub fn parse_run_number(name: &str) -> Option<u64> {
    let name = name.trim();
    if let Ok(n) = name.parse::<u64>() {
        return Some(n);
    }
    digit_groups()?
        .find_iter(name)
        .last()
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

pub fn current_run(ctx: &QueryContext) -> Result<u64, NavigationError> {
    ctx.data_run
        .trim()
        .parse::<u64>()
        .map_err(|_| NavigationError::InvalidCurrentRun {
            value: ctx.data_run.clone(),
        })
}

pub fn plan(
    ctx: &QueryContext,
    runs: &RunList,
    direction: Direction,
    user_id: u64,
) -> Result<NavigationQuery, NavigationError> {
    let current = current_run(ctx)?;
    let target = runs
        .neighbors(current)
        .get(direction)
        .ok_or(NavigationError::NoNeighbor {
            direction: direction.label(),
            current,
        })?;
    Ok(NavigationQuery::for_run(ctx, target, user_id))
}

#[derive(Debug, Deserialize)]
struct RunsEnvelope {
    response: RunsPayload,
}

#[derive(Debug, Deserialize)]
struct RunsPayload {
    #[serde(default)]
    runs: Vec<RunLink>,
}

#[derive(Debug, Deserialize)]
struct RunLink {
    name: serde_json::Value,
}

impl RunLink {
    fn name(&self) -> String {
        match &self.name {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Decodes the backend's run listing. Returns the usable runs and the names
/// that carried no run number.
pub fn parse_runs_response(body: &str) -> Result<(RunList, Vec<String>), NavigationError> {
    let envelope: RunsEnvelope =
        serde_json::from_str(body).map_err(|e| NavigationError::Decode { source: e })?;
    let names: Vec<String> = envelope.response.runs.iter().map(RunLink::name).collect();
    let skipped = names
        .iter()
        .filter(|n| parse_run_number(n).is_none())
        .cloned()
        .collect();
    Ok((RunList::from_names(&names), skipped))
}

#[derive(Clone, Debug)]
pub struct RunsClient {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl RunsClient {
    pub fn new(
        endpoint: &str,
        timeout_seconds: usize,
        proxy: Option<&str>,
    ) -> Result<Self, NavigationError> {
        let endpoint =
            reqwest::Url::parse(endpoint.trim()).map_err(|_| NavigationError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
            })?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let timeout = Duration::from_secs(timeout_seconds.try_into().unwrap_or(10));
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("plotgallery/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout);

        if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| NavigationError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| NavigationError::HttpClientBuild { source: e })?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    pub async fn fetch_runs(
        &self,
        series: &str,
        sample: &str,
    ) -> Result<(RunList, Vec<String>), NavigationError> {
        if series.trim().is_empty() || sample.trim().is_empty() {
            return Err(NavigationError::MissingSeriesOrSample);
        }
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("type", GET_RUNS), ("series", series), ("sample", sample)])
            .send()
            .await
            .map_err(|e| NavigationError::Request { source: e })?;
        let status = response.status();
        if !status.is_success() {
            return Err(NavigationError::Status {
                status: status.as_u16(),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| NavigationError::Request { source: e })?;
        parse_runs_response(&body)
    }
}

pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
