use reqwest::Client;

use super::LogFetcher;
use crate::error::FetchError;

/// A log source backed by an HTTP endpoint that returns the full log as text.
///
/// Services with several log streams (the main process and its helpers) pick one
/// with the `source` query parameter.
pub struct HttpSource {
    client: Client,
    url: String,
    selector: Option<String>,
}

impl HttpSource {
    pub fn new(url: String, selector: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            selector,
        }
    }
}

#[async_trait::async_trait]
impl LogFetcher for HttpSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        let mut request = self.client.get(&self.url);
        if let Some(selector) = &self.selector {
            request = request.query(&[("source", selector)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    fn name(&self) -> String {
        match &self.selector {
            Some(sel) => format!("http:{}", sel),
            None => format!("http:{}", self.url),
        }
    }
}
