//! Client for the external pygeoapi geoprocessing endpoint.
//!
//! The flowtrace and split-catchment processes run in a separate
//! service; this module is the only place that performs outbound HTTP.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::util::url_join;

/// One typed input of an OGC API process execution request.
#[derive(Debug, Serialize)]
struct ProcessInput {
    id: &'static str,
    #[serde(rename = "type")]
    media_type: &'static str,
    value: String,
}

impl ProcessInput {
    fn text(id: &'static str, value: impl ToString) -> Self {
        ProcessInput {
            id,
            media_type: "text/plain",
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProcessRequest {
    inputs: Vec<ProcessInput>,
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    features: Vec<Value>,
}

/// Typed calls to the remote geoprocessing service.
#[derive(Clone)]
pub struct PyGeoApiClient {
    client: reqwest::Client,
    base_url: String,
    enabled: bool,
    timeout: Duration,
}

impl PyGeoApiClient {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(PyGeoApiClient {
            client,
            base_url: config.pygeoapi_url.trim_end_matches('/').to_string(),
            enabled: config.pygeoapi_enabled,
            timeout: Duration::from_secs(config.pygeoapi_timeout_secs),
        })
    }

    /// POST a process execution request, retrying once if the connection
    /// was reset before a response arrived.
    async fn execute(
        &self,
        process: &str,
        request: &ProcessRequest,
        timeout: Duration,
    ) -> Result<ProcessResponse> {
        if !self.enabled {
            return Err(Error::Configuration(
                "remote geoprocessing is disabled".to_string(),
            ));
        }
        let url = url_join(&self.base_url, ["processes", process, "execution"]);

        let mut attempt = 0;
        let response = loop {
            tracing::debug!(%url, attempt, "Calling geoprocessing service");
            let result = self
                .client
                .post(&url)
                .timeout(timeout)
                .json(request)
                .send()
                .await;
            match result {
                Ok(response) => break response,
                Err(err) if err.is_connect() && attempt == 0 => {
                    tracing::warn!(%url, "Connection reset, retrying once: {err}");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::RemoteService {
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }
        response
            .json::<ProcessResponse>()
            .await
            .map_err(|e| Error::RemoteService {
                status: status.as_u16(),
                message: format!("unparseable response body: {e}"),
            })
    }

    /// Project a point onto the flowline network. Returns the
    /// intersection point as (lon, lat).
    pub async fn flowtrace_intersection(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        let request = ProcessRequest {
            inputs: vec![
                ProcessInput::text("lon", lon),
                ProcessInput::text("lat", lat),
                ProcessInput::text("direction", "none"),
            ],
        };
        let response = self.execute("nldi-flowtrace", &request, self.timeout).await?;

        let point = response
            .features
            .first()
            .and_then(|f| f.pointer("/properties/intersection_point"))
            .and_then(Value::as_array)
            .ok_or_else(|| Error::RemoteService {
                status: 200,
                message: "flowtrace response carried no intersection point".to_string(),
            })?;
        match (point.first().and_then(Value::as_f64), point.get(1).and_then(Value::as_f64)) {
            (Some(lon), Some(lat)) => Ok((lon, lat)),
            _ => Err(Error::RemoteService {
                status: 200,
                message: "malformed intersection point in flowtrace response".to_string(),
            }),
        }
    }

    /// Compute the split catchment draining to a point. Returns the
    /// merged-catchment polygon feature with its id stripped.
    pub async fn split_catchment(&self, lon: f64, lat: f64) -> Result<Value> {
        let request = ProcessRequest {
            inputs: vec![
                ProcessInput::text("lon", lon),
                ProcessInput::text("lat", lat),
                ProcessInput::text("upstream", "true"),
            ],
        };
        // The split algorithm is slow; give it twice the usual budget.
        let response = self
            .execute("nldi-splitcatchment", &request, self.timeout * 2)
            .await?;

        for mut feature in response.features {
            // The upstream service renamed this feature id once already;
            // accept both spellings.
            let id = feature.get("id").and_then(Value::as_str);
            if matches!(id, Some("mergedCatchment") | Some("drainageBasin")) {
                if let Some(obj) = feature.as_object_mut() {
                    obj.remove("id");
                }
                return Ok(feature);
            }
        }
        Err(Error::RemoteService {
            status: 200,
            message: "split-catchment response carried no catchment feature".to_string(),
        })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_request_serialisation() {
        let request = ProcessRequest {
            inputs: vec![
                ProcessInput::text("lon", -89.509),
                ProcessInput::text("lat", 43.087),
                ProcessInput::text("direction", "none"),
            ],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["inputs"][0]["id"], "lon");
        assert_eq!(json["inputs"][0]["type"], "text/plain");
        assert_eq!(json["inputs"][0]["value"], "-89.509");
        assert_eq!(json["inputs"][2]["value"], "none");
    }

    #[test]
    fn test_disabled_client_refuses_calls() {
        let config = ServerConfig {
            pygeoapi_enabled: false,
            ..Default::default()
        };
        let client = PyGeoApiClient::new(&config).unwrap();
        let err = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(client.flowtrace_intersection(-89.5, 43.0))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 200), "short");
        let long = "é".repeat(150);
        let cut = truncate(&long, 201);
        assert!(cut.len() <= 201);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
