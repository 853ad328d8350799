//! Concrete HTTP rate sources.
//!
//! Each source is a JSON endpoint quoting USDT/MYR (or USD/MYR as a proxy),
//! addressed by a JSON pointer into the response body. Sources are
//! configurable via the `SPREADWATCH_SOURCES` env var as semicolon-separated
//! `name|weight|url|pointer` entries; the defaults cover three public
//! endpoints with a higher weight on the crypto-native quote.

use async_trait::async_trait;
use spreadwatch::{RateSource, SourceError};
use std::time::Duration;
use tracing::debug;

/// Client-wide request timeout. The aggregator imposes none of its own, so
/// this is what keeps a hung endpoint from wedging a cycle indefinitely.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpRateSource {
    name: String,
    weight: f64,
    url: String,
    /// JSON pointer to the rate field, e.g. `/rates/MYR`.
    pointer: String,
    client: reqwest::Client,
}

impl HttpRateSource {
    pub fn new(
        client: reqwest::Client,
        name: impl Into<String>,
        weight: f64,
        url: impl Into<String>,
        pointer: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            weight,
            url: url.into(),
            pointer: pointer.into(),
            client,
        }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn fetch(&self) -> Result<f64, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| SourceError::Http {
                source: self.name.clone(),
                message: error.to_string(),
            })?;

        let body: serde_json::Value =
            response.json().await.map_err(|error| SourceError::Parse {
                source: self.name.clone(),
                message: error.to_string(),
            })?;

        let value = body.pointer(&self.pointer).ok_or_else(|| SourceError::Parse {
            source: self.name.clone(),
            message: format!("pointer {} not found in response", self.pointer),
        })?;

        // Endpoints disagree on whether rates are numbers or strings.
        let rate = match value {
            serde_json::Value::Number(number) => number.as_f64(),
            serde_json::Value::String(text) => text.parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| SourceError::Parse {
            source: self.name.clone(),
            message: format!("rate field is not numeric: {value}"),
        })?;

        if rate <= 0.0 {
            return Err(SourceError::InvalidRate {
                source: self.name.clone(),
                rate: rate.to_string(),
            });
        }

        debug!(source = %self.name, rate, "fetched quote");
        Ok(rate)
    }
}

/// Build the source set from `SPREADWATCH_SOURCES`, falling back to the
/// built-in defaults when unset or unparseable.
pub fn build_sources() -> Vec<Box<dyn RateSource>> {
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent("spreadwatch-daemon/0.1")
        .build()
        .unwrap_or_default();

    if let Ok(spec) = std::env::var("SPREADWATCH_SOURCES") {
        let parsed = parse_source_spec(&client, &spec);
        if !parsed.is_empty() {
            return parsed;
        }
        tracing::warn!("SPREADWATCH_SOURCES was set but empty/unparseable, using defaults");
    }

    default_sources(&client)
}

fn default_sources(client: &reqwest::Client) -> Vec<Box<dyn RateSource>> {
    vec![
        Box::new(HttpRateSource::new(
            client.clone(),
            "coingecko",
            3.0,
            "https://api.coingecko.com/api/v3/simple/price?ids=tether&vs_currencies=myr",
            "/tether/myr",
        )),
        Box::new(HttpRateSource::new(
            client.clone(),
            "open-er-api",
            1.0,
            "https://open.er-api.com/v6/latest/USD",
            "/rates/MYR",
        )),
        Box::new(HttpRateSource::new(
            client.clone(),
            "exchangerate-api",
            1.0,
            "https://api.exchangerate-api.com/v4/latest/USD",
            "/rates/MYR",
        )),
    ]
}

fn parse_source_spec(client: &reqwest::Client, spec: &str) -> Vec<Box<dyn RateSource>> {
    spec.split(';')
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.split('|').map(str::trim).collect();
            let [name, weight, url, pointer] = parts.as_slice() else {
                tracing::warn!(entry, "skipping malformed source entry");
                return None;
            };
            let weight: f64 = weight.parse().ok()?;
            Some(Box::new(HttpRateSource::new(
                client.clone(),
                *name,
                weight,
                *url,
                *pointer,
            )) as Box<dyn RateSource>)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_spec() {
        let client = reqwest::Client::new();
        let sources = parse_source_spec(
            &client,
            "alpha|2.0|https://a.example/rate|/myr; beta|1.5|https://b.example/q|/data/rate",
        );

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name(), "alpha");
        assert_eq!(sources[0].weight(), 2.0);
        assert_eq!(sources[1].name(), "beta");
        assert_eq!(sources[1].weight(), 1.5);
    }

    #[test]
    fn test_parse_source_spec_skips_malformed() {
        let client = reqwest::Client::new();
        let sources = parse_source_spec(&client, "broken-entry;gamma|1.0|https://c.example|/r");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name(), "gamma");
    }
}
