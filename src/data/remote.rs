//! Download of the Italian national case series.

use reqwest::blocking::Client;
use tracing::info;

use crate::data::DatasetProvider;
use crate::domain::{ColumnSpec, ObservationSeries};
use crate::error::AppError;
use crate::io::ingest::load_series_from_bytes;

/// National daily trend published by the Italian Civil Protection department.
pub const ITALY_NATIONAL_URL: &str = "https://raw.githubusercontent.com/pcm-dpc/COVID-19/master/dati-andamento-nazionale/dpc-covid19-ita-andamento-nazionale.csv";

/// Label used for the national series.
pub const ITALY_LABEL: &str = "ITA";

/// Environment variable overriding the dataset URL.
pub const DATASET_URL_ENV: &str = "EPI_DATASET_URL";

/// A CSV served over HTTP(S), parsed in memory.
pub struct RemoteCsv {
    client: Client,
    label: String,
    url: String,
    columns: ColumnSpec,
}

impl RemoteCsv {
    pub fn new(label: impl Into<String>, url: impl Into<String>, columns: ColumnSpec) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("epi-curves/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::data_unavailable(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            label: label.into(),
            url: url.into(),
            columns,
        })
    }

    /// The national series, with the URL taken from `url`, then
    /// `EPI_DATASET_URL` (`.env` honored), then the published location.
    pub fn from_env(label: Option<String>, url: Option<String>, columns: ColumnSpec) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let url = url
            .or_else(|| std::env::var(DATASET_URL_ENV).ok().filter(|u| !u.trim().is_empty()))
            .unwrap_or_else(|| ITALY_NATIONAL_URL.to_string());
        Self::new(label.unwrap_or_else(|| ITALY_LABEL.to_string()), url, columns)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> Result<Vec<u8>, AppError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| AppError::data_unavailable(format!("Download of '{}' failed: {e}", self.url)))?;

        if !resp.status().is_success() {
            return Err(AppError::data_unavailable(format!(
                "Download of '{}' failed with status {}.",
                self.url,
                resp.status()
            )));
        }

        let body = resp
            .bytes()
            .map_err(|e| AppError::data_unavailable(format!("Failed to read response body: {e}")))?;
        Ok(body.to_vec())
    }
}

impl DatasetProvider for RemoteCsv {
    fn label(&self) -> &str {
        &self.label
    }

    fn load(&self) -> Result<ObservationSeries, AppError> {
        info!(url = %self.url, "downloading dataset");
        let body = self.fetch()?;
        info!(bytes = body.len(), "download complete");
        load_series_from_bytes(&body, &self.label, &self.columns)
    }
}
