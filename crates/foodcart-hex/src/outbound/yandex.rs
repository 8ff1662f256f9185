use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use foodcart_types::domain::geo::{Coordinate, GeocodeError};
use foodcart_types::ports::Geocoder;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GeocoderConfig;

/// Yandex Geocoder HTTP API client.
#[derive(Clone)]
pub struct YandexGeocoder {
    endpoint: Url,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
    retry_backoff: Duration,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    response: ResponseBody,
}

#[derive(Deserialize)]
struct ResponseBody {
    #[serde(rename = "GeoObjectCollection")]
    collection: GeoObjectCollection,
}

#[derive(Deserialize)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    members: Vec<FeatureMember>,
}

#[derive(Deserialize)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Deserialize)]
struct GeoObject {
    #[serde(rename = "Point")]
    point: Point,
}

#[derive(Deserialize)]
struct Point {
    pos: String,
}

enum Attempt {
    Done(Result<Vec<Coordinate>, GeocodeError>),
    Retry(String),
}

impl YandexGeocoder {
    pub fn new(config: &GeocoderConfig) -> anyhow::Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/1.x")).context("invalid geocoder url")?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build geocoder http client")?;
        Ok(Self {
            endpoint,
            api_key: config.api_key.clone(),
            client,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    async fn attempt(&self, address: &str) -> Attempt {
        let res = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("geocode", address),
                ("apikey", self.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .await;
        let res = match res {
            Ok(r) => r,
            Err(e) => return Attempt::Retry(e.to_string()),
        };

        let status = res.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Retry(status.to_string());
        }
        if !status.is_success() {
            return Attempt::Done(Err(GeocodeError::Unavailable(status.to_string())));
        }

        let body: GeocodeResponse = match res.json().await {
            Ok(b) => b,
            Err(e) => {
                return Attempt::Done(Err(GeocodeError::Unavailable(format!(
                    "malformed geocoder response: {e}"
                ))))
            }
        };
        let coords = body
            .response
            .collection
            .members
            .iter()
            .map(|m| {
                let pos = &m.geo_object.point.pos;
                Coordinate::from_pos(pos).ok_or_else(|| {
                    GeocodeError::Unavailable(format!("malformed point position {pos:?}"))
                })
            })
            .collect();
        Attempt::Done(coords)
    }
}

#[async_trait]
impl Geocoder for YandexGeocoder {
    /// Matches in provider relevance order. Transport errors, 5xx and 429
    /// responses are retried with exponential backoff.
    async fn geocode(&self, address: &str) -> Result<Vec<Coordinate>, GeocodeError> {
        let mut backoff = self.retry_backoff;
        let mut attempt = 0;
        loop {
            match self.attempt(address).await {
                Attempt::Done(res) => {
                    if let Ok(matches) = &res {
                        debug!(address, matches = matches.len(), "geocoder answered");
                    }
                    return res;
                }
                Attempt::Retry(reason) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(address, attempt, %reason, "geocoder request failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Attempt::Retry(reason) => {
                    warn!(address, %reason, "geocoder request failed, giving up");
                    return Err(GeocodeError::Unavailable(reason));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn geocoder(server: &MockServer, max_retries: u32) -> YandexGeocoder {
        let mut config = GeocoderConfig::new("test-key");
        config.base_url = server.base_url();
        config.max_retries = max_retries;
        config.retry_backoff = Duration::from_millis(1);
        YandexGeocoder::new(&config).unwrap()
    }

    fn body(positions: &[&str]) -> serde_json::Value {
        let members: Vec<_> = positions
            .iter()
            .map(|pos| json!({ "GeoObject": { "Point": { "pos": pos } } }))
            .collect();
        json!({ "response": { "GeoObjectCollection": { "featureMember": members } } })
    }

    #[tokio::test]
    async fn returns_matches_in_provider_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/1.x")
                    .query_param("geocode", "Moscow, Red Square")
                    .query_param("apikey", "test-key")
                    .query_param("format", "json");
                then.status(200)
                    .json_body(body(&["37.620393 55.75396", "30.315868 59.939095"]));
            })
            .await;

        let matches = geocoder(&server, 0)
            .geocode("Moscow, Red Square")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(
            matches,
            vec![
                Coordinate::new(37.620393, 55.75396),
                Coordinate::new(30.315868, 59.939095)
            ]
        );
    }

    #[tokio::test]
    async fn no_feature_members_is_an_empty_list() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/1.x");
                then.status(200).json_body(body(&[]));
            })
            .await;

        let matches = geocoder(&server, 0).geocode("123 Main St").await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/1.x");
                then.status(503);
            })
            .await;

        let res = geocoder(&server, 2).geocode("Arbat 10").await;
        assert!(matches!(res, Err(GeocodeError::Unavailable(_))));
        assert_eq!(mock.hits_async().await, 3);
    }

    #[tokio::test]
    async fn recovers_when_the_provider_comes_back() {
        let server = MockServer::start_async().await;
        let mut failing = server
            .mock_async(|when, then| {
                when.method(GET).path("/1.x");
                then.status(502);
            })
            .await;

        let mut config = GeocoderConfig::new("test-key");
        config.base_url = server.base_url();
        config.max_retries = 3;
        config.retry_backoff = Duration::from_millis(300);
        let geocoder = YandexGeocoder::new(&config).unwrap();
        let call = tokio::spawn(async move { geocoder.geocode("Arbat 10").await });

        while failing.hits_async().await == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        failing.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/1.x");
                then.status(200).json_body(body(&["37.59 55.75"]));
            })
            .await;

        let matches = call.await.unwrap().unwrap();
        assert_eq!(matches, vec![Coordinate::new(37.59, 55.75)]);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/1.x");
                then.status(403);
            })
            .await;

        let res = geocoder(&server, 2).geocode("Arbat 10").await;
        assert!(matches!(res, Err(GeocodeError::Unavailable(_))));
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn malformed_body_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/1.x");
                then.status(200).body("<html>captcha</html>");
            })
            .await;

        let res = geocoder(&server, 0).geocode("Arbat 10").await;
        assert!(matches!(res, Err(GeocodeError::Unavailable(_))));
    }
}
