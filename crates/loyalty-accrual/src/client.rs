//! Accrual HTTP client implementation.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};

use loyalty_core::OrderStatus;

use crate::error::AccrualError;
use crate::types::{AccrualDecision, AccrualReply};

/// Accrual service client.
#[derive(Debug, Clone)]
pub struct AccrualClient {
    client: Client,
    base_url: String,
}

impl AccrualClient {
    /// Create a new accrual client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the accrual service (e.g., `"http://accrual:8080"`)
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AccrualError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the service about one order.
    ///
    /// A rate-limit response is not an error; it comes back as
    /// [`AccrualReply::Overloaded`].
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a 500, any status outside the
    /// protocol, a malformed decision body, or a decision reporting `NEW`.
    pub async fn fetch(&self, number: &str) -> Result<AccrualReply, AccrualError> {
        let url = format!("{}/api/orders/{}", self.base_url, number);

        let response = self.client.get(&url).send().await?;

        Self::classify(response).await
    }

    async fn classify(response: Response) -> Result<AccrualReply, AccrualError> {
        let status = response.status();

        match status {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let decision: AccrualDecision = serde_json::from_slice(&body)?;
                if decision.status == OrderStatus::New {
                    return Err(AccrualError::UnexpectedDecision {
                        order: decision.order,
                        status: decision.status,
                    });
                }
                Ok(AccrualReply::Decision(decision))
            }
            StatusCode::NO_CONTENT => Ok(AccrualReply::Unknown),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(parse_retry_after);
                if retry_after.is_none() {
                    tracing::debug!("Rate limited without a usable Retry-After header");
                }
                Ok(AccrualReply::Overloaded { retry_after })
            }
            StatusCode::INTERNAL_SERVER_ERROR => Err(AccrualError::Server {
                status: status.as_u16(),
            }),
            _ => Err(AccrualError::UnexpectedStatus {
                status: status.as_u16(),
            }),
        }
    }
}

/// Parse a `Retry-After` value given in whole seconds.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = AccrualClient::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after("60"), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
    }

    #[test]
    fn retry_after_rejects_non_numeric() {
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after(""), None);
    }
}
