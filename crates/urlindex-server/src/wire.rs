//! JSON request/response shapes (§6 "Wire API"), kept as a thin,
//! independent mirror of the internal model so the on-disk/in-memory
//! types can evolve without breaking the stable wire contract.

use serde::{Deserialize, Serialize};
use urlindex_core::query::{DatasetsOfResult, UrlsOfResult};

#[derive(Debug, Serialize)]
pub struct DatasetEntry {
    pub dataset_id: u32,
    pub url_count_est: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct DatasetsOfResponse {
    pub domain: String,
    pub domain_id: Option<u64>,
    pub datasets: Vec<DatasetEntry>,
}

impl From<DatasetsOfResult> for DatasetsOfResponse {
    fn from(result: DatasetsOfResult) -> Self {
        Self {
            domain: result.domain,
            domain_id: result.domain_id.map(|id| id.0),
            datasets: result
                .datasets
                .into_iter()
                .map(|d| DatasetEntry {
                    dataset_id: d.dataset_id.0,
                    url_count_est: d.url_count_est,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UrlsOfQuery {
    #[serde(default)]
    pub offset: u64,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UrlItemResponse {
    pub url_id: u64,
    pub url: String,
    pub ts: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UrlsOfResponse {
    pub domain: String,
    pub dataset_id: u32,
    pub total_est: Option<u64>,
    pub items: Vec<UrlItemResponse>,
    pub next_offset: Option<u64>,
}

impl From<UrlsOfResult> for UrlsOfResponse {
    fn from(result: UrlsOfResult) -> Self {
        Self {
            domain: result.domain,
            dataset_id: result.dataset_id.0,
            total_est: result.total_est,
            items: result
                .items
                .into_iter()
                .map(|item| UrlItemResponse {
                    url_id: item.url_id.0,
                    url: item.url,
                    ts: item.ts,
                })
                .collect(),
            next_offset: result.next_offset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
