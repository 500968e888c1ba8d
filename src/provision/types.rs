use serde::{Deserialize, Serialize};

pub const COLLECTOR_TYPE_HOSTED: &str = "Hosted";
pub const SOURCE_TYPE_HTTP: &str = "HTTP";
pub const CREATED_BY: &str = "Created by jforward";

/// A collector as returned by the management API
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collector {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub collector_type: String,
}

/// A collector source. Only HTTP sources carry a receiver `url`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub source_type: String,
    #[serde(default)]
    pub multiline_processing_enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CollectorsResponse {
    #[serde(default)]
    pub collectors: Vec<Collector>,
}

#[derive(Debug, Deserialize)]
pub struct SourcesResponse {
    #[serde(default)]
    pub sources: Vec<Source>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectorEnvelope {
    pub collector: Collector,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceEnvelope {
    pub source: Source,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCollector<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub collector_type: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NewCollectorRequest<'a> {
    pub collector: NewCollector<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSource<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub source_type: &'a str,
    pub message_per_request: bool,
    pub multiline_processing_enabled: bool,
    pub host_name: &'a str,
    pub category: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NewSourceRequest<'a> {
    pub source: NewSource<'a>,
}
