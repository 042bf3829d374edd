//! Typed HTTP clients for the control and collector services.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use meshsim_common::models::{MeshHealthSnapshot, PeerRecord, TestResult};
use meshsim_common::protocol::{
    ErrorBody, HealthResponse, MobileMetricsReport, NetworkStatus, ProfileApplied,
    ResultsResponse, RunScenarioRequest, ScenarioStarted, SetProfileRequest,
    SubmitResultResponse, TestResultInput,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared plumbing: base URL handling and `{"error": ...}` decoding.
#[derive(Debug, Clone)]
struct Http {
    base_url: String,
    client: reqwest::Client,
}

impl Http {
    fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let resp = self.client.get(self.url(path)).send().await?;
        decode(resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> anyhow::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    anyhow::bail!("{status}: {message}")
}

/// Client for `meshsim-control`.
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: Http,
}

impl ControlClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http: Http::new(base_url)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }

    pub async fn status(&self) -> anyhow::Result<NetworkStatus> {
        self.http.get("/status").await
    }

    pub async fn set_profile(&self, name: &str) -> anyhow::Result<ProfileApplied> {
        let body = SetProfileRequest { name: name.into() };
        self.http.post("/profile", &body).await
    }

    pub async fn run_scenario(&self, name: &str) -> anyhow::Result<ScenarioStarted> {
        let body = RunScenarioRequest { name: name.into() };
        self.http.post("/scenario", &body).await
    }

    pub async fn peers(&self) -> anyhow::Result<Vec<PeerRecord>> {
        self.http.get("/peers").await
    }

    pub async fn mesh_status(&self) -> anyhow::Result<MeshHealthSnapshot> {
        self.http.get("/mesh-status").await
    }

    pub async fn health(&self) -> anyhow::Result<HealthResponse> {
        self.http.get("/health").await
    }
}

/// Client for `meshsim-collector`.
#[derive(Debug, Clone)]
pub struct CollectorClient {
    http: Http,
}

impl CollectorClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http: Http::new(base_url)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }

    pub async fn submit_result(&self, result: TestResult) -> anyhow::Result<SubmitResultResponse> {
        self.http
            .post("/results", &TestResultInput::from(result))
            .await
    }

    pub async fn results(&self) -> anyhow::Result<ResultsResponse> {
        self.http.get("/results").await
    }

    pub async fn mobile_metrics(&self) -> anyhow::Result<MobileMetricsReport> {
        self.http.get("/mobile-metrics").await
    }

    pub async fn health(&self) -> anyhow::Result<HealthResponse> {
        self.http.get("/health").await
    }
}
