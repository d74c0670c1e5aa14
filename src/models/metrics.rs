use serde::{Deserialize, Serialize};

/// Aggregated end-of-day statistics for one ticker symbol.
/// Every field except `symbol` is `null` when the provider had nothing for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMetrics {
    pub symbol: String,
    pub average_closing_price: Option<f64>,
    pub maximum_closing_price: Option<f64>,
    pub minimum_closing_price: Option<f64>,
    pub total_trading_volume: Option<f64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub error: Option<String>,
}

impl StockMetrics {
    pub fn failed(symbol: &str, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            average_closing_price: None,
            maximum_closing_price: None,
            minimum_closing_price: None,
            total_trading_volume: None,
            start_date: None,
            end_date: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Current conditions for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherMetrics {
    pub city: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub pressure: Option<f64>,
    pub error: Option<String>,
}

impl WeatherMetrics {
    pub fn failed(city: &str, error: impl Into<String>) -> Self {
        Self {
            city: city.to_string(),
            temperature: None,
            humidity: None,
            wind_speed: None,
            pressure: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One key/value pair sent to the metrics sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMetric {
    pub key: String,
    pub value: f64,
}

impl PushMetric {
    fn new(key: String, value: f64) -> Self {
        Self { key, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushStatus {
    Success,
    Error,
}

impl PushStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushStatus::Success => "success",
            PushStatus::Error => "error",
        }
    }
}

/// Outcome of a push, returned to the client as-is with HTTP 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResult {
    pub status: PushStatus,
    pub message: String,
}

impl PushResult {
    pub fn success() -> Self {
        Self {
            status: PushStatus::Success,
            message: "Metrics pushed successfully".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: PushStatus::Error,
            message: message.into(),
        }
    }
}

/// Flatten successful stock and weather items into sink key/value pairs.
/// Items carrying an error are skipped, as are individual null fields.
pub fn collect_push_data(stocks: &[StockMetrics], weather: &[WeatherMetrics]) -> Vec<PushMetric> {
    let mut data = Vec::new();

    for metric in stocks.iter().filter(|m| m.is_ok()) {
        let fields = [
            ("avg_price", metric.average_closing_price),
            ("max_price", metric.maximum_closing_price),
            ("min_price", metric.minimum_closing_price),
            ("total_volume", metric.total_trading_volume),
        ];
        data.extend(fields.into_iter().filter_map(|(suffix, value)| {
            value.map(|v| PushMetric::new(format!("stock_{}_{}", metric.symbol, suffix), v))
        }));
    }

    for metric in weather.iter().filter(|m| m.is_ok()) {
        let fields = [
            ("temperature", metric.temperature),
            ("humidity", metric.humidity),
            ("wind_speed", metric.wind_speed),
            ("pressure", metric.pressure),
        ];
        data.extend(fields.into_iter().filter_map(|(suffix, value)| {
            value.map(|v| PushMetric::new(format!("weather_{}_{}", metric.city, suffix), v))
        }));
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aapl() -> StockMetrics {
        StockMetrics {
            symbol: "AAPL".into(),
            average_closing_price: Some(150.25),
            maximum_closing_price: Some(155.0),
            minimum_closing_price: Some(145.0),
            total_trading_volume: Some(123456789.0),
            start_date: Some("2024-07-11".into()),
            end_date: Some("2024-11-29".into()),
            error: None,
        }
    }

    fn ljubljana() -> WeatherMetrics {
        WeatherMetrics {
            city: "Ljubljana".into(),
            temperature: Some(2.0),
            humidity: Some(85.0),
            wind_speed: Some(5.0),
            pressure: Some(1023.0),
            error: None,
        }
    }

    #[test]
    fn test_collect_push_data_keys() {
        let data = collect_push_data(&[aapl()], &[ljubljana()]);
        let keys: Vec<&str> = data.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "stock_AAPL_avg_price",
                "stock_AAPL_max_price",
                "stock_AAPL_min_price",
                "stock_AAPL_total_volume",
                "weather_Ljubljana_temperature",
                "weather_Ljubljana_humidity",
                "weather_Ljubljana_wind_speed",
                "weather_Ljubljana_pressure",
            ]
        );
        assert_eq!(data[0].value, 150.25);
        assert_eq!(data[7].value, 1023.0);
    }

    #[test]
    fn test_collect_push_data_skips_failed_items() {
        let data = collect_push_data(
            &[aapl(), StockMetrics::failed("MSFT", "API error: 500")],
            &[WeatherMetrics::failed("Ptuj", "No weather data available.")],
        );
        assert_eq!(data.len(), 4);
        assert!(data.iter().all(|m| m.key.starts_with("stock_AAPL_")));
    }

    #[test]
    fn test_failed_item_serializes_nulls() {
        let json = serde_json::to_value(StockMetrics::failed("INVALID", "No data available.")).unwrap();
        assert_eq!(json["symbol"], "INVALID");
        assert_eq!(json["error"], "No data available.");
        assert!(json["average_closing_price"].is_null());
        assert!(json["start_date"].is_null());
    }

    #[test]
    fn test_ok_item_serializes_null_error() {
        let json = serde_json::to_value(ljubljana()).unwrap();
        assert!(json.get("error").is_some());
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_push_result_shape() {
        let json = serde_json::to_value(PushResult::success()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "Metrics pushed successfully");

        let json = serde_json::to_value(PushResult::error("API Exception: boom")).unwrap();
        assert_eq!(json["status"], "error");
    }
}
