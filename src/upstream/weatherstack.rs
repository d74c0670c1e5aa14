use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use url::Url;

use super::{endpoint, WeatherSource};
use crate::middleware::metrics::GatewayMetrics;
use crate::models::metrics::WeatherMetrics;

pub const DEFAULT_CITIES: [&str; 3] = ["Ljubljana", "Maribor", "Ptuj"];

// Weatherstack answers unknown cities with 200 and `{"success": false, "error": {...}}`,
// so a missing `current` block is the no-data signal.
#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: Option<Current>,
}

#[derive(Debug, Deserialize)]
struct Current {
    temperature: f64,
    humidity: f64,
    wind_speed: f64,
    pressure: f64,
}

/// Weatherstack `/current` client.
pub struct WeatherstackClient {
    client: reqwest::Client,
    current_url: String,
    api_key: String,
    metrics: GatewayMetrics,
}

impl WeatherstackClient {
    pub fn new(client: reqwest::Client, base_url: &Url, api_key: &str, metrics: GatewayMetrics) -> Self {
        Self {
            client,
            current_url: endpoint(base_url, "current"),
            api_key: api_key.to_string(),
            metrics,
        }
    }

    async fn fetch_city(&self, city: &str) -> WeatherMetrics {
        let result = self
            .client
            .get(&self.current_url)
            .query(&[("access_key", self.api_key.as_str()), ("query", city)])
            .send()
            .await;

        let resp = match result {
            Ok(r) => r,
            Err(e) => {
                let e = e.without_url();
                tracing::warn!(city, error = %e, "weatherstack request failed");
                self.metrics.record_upstream("weatherstack", "transport_error");
                return WeatherMetrics::failed(city, format!("Request failed: {}", e));
            }
        };

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(city, status = %status, "weatherstack returned non-200");
            self.metrics.record_upstream("weatherstack", "http_error");
            return WeatherMetrics::failed(city, format!("API error: {}", status.as_u16()));
        }

        let current = match resp.json::<CurrentResponse>().await {
            Ok(body) => body.current,
            Err(e) => {
                tracing::warn!(city, error = %e.without_url(), "weatherstack body not understood");
                None
            }
        };

        match current {
            Some(c) => {
                self.metrics.record_upstream("weatherstack", "ok");
                WeatherMetrics {
                    city: city.to_string(),
                    temperature: Some(c.temperature),
                    humidity: Some(c.humidity),
                    wind_speed: Some(c.wind_speed),
                    pressure: Some(c.pressure),
                    error: None,
                }
            }
            None => {
                self.metrics.record_upstream("weatherstack", "no_data");
                WeatherMetrics::failed(city, "No weather data available.")
            }
        }
    }
}

#[async_trait]
impl WeatherSource for WeatherstackClient {
    async fn fetch_metrics(&self, cities: &[String], use_demo_data: bool) -> Vec<WeatherMetrics> {
        if use_demo_data {
            return demo_metrics();
        }
        join_all(cities.iter().map(|c| self.fetch_city(c))).await
    }
}

pub fn demo_metrics() -> Vec<WeatherMetrics> {
    let city = |name: &str, temperature: f64, humidity: f64, wind_speed: f64, pressure: f64| WeatherMetrics {
        city: name.to_string(),
        temperature: Some(temperature),
        humidity: Some(humidity),
        wind_speed: Some(wind_speed),
        pressure: Some(pressure),
        error: None,
    };
    vec![
        city("Ljubljana", 10.5, 80.0, 5.5, 1015.0),
        city("Maribor", 12.0, 75.0, 6.0, 1012.0),
        city("Ptuj", 9.8, 85.0, 4.0, 1018.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_metrics_cover_default_cities() {
        let names: Vec<String> = demo_metrics().into_iter().map(|m| m.city).collect();
        assert_eq!(names, DEFAULT_CITIES.to_vec());
    }

    #[test]
    fn test_error_body_has_no_current_block() {
        let body = r#"{"success":false,"error":{"code":615,"type":"request_failed"}}"#;
        let parsed: CurrentResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.current.is_none());
    }
}
