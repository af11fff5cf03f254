//! Kroki client: turns a diagram description into an image over HTTP.
//!
//! Kroki exposes one endpoint per `(diagram type, output format)` pair and
//! accepts the diagram source as a plain-text POST body:
//!
//! ```text
//! POST {base_url}/graphviz/svg
//! Content-Type: text/plain
//!
//! digraph D { ... }
//! ```
//!
//! No retries and no timeout beyond the `reqwest` defaults.

use crate::config::KrokiSettings;
use crate::error::RenderServiceError;
use tracing::debug;

/// A reusable handle on one Kroki instance.
#[derive(Debug, Clone)]
pub struct KrokiClient {
    http: reqwest::Client,
    base_url: String,
}

impl KrokiClient {
    pub fn new(settings: &KrokiSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.base_url(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base_url}/{diagram_type}/{output_format}`.
    pub fn endpoint(&self, diagram_type: &str, output_format: &str) -> String {
        format!("{}/{}/{}", self.base_url, diagram_type, output_format)
    }

    /// Render Graphviz DOT source to SVG.
    pub async fn dot_to_svg(&self, dot: &str) -> Result<String, RenderServiceError> {
        self.render("graphviz", "svg", dot).await
    }

    /// POST `source` to the endpoint and return the response body.
    ///
    /// # Errors
    /// * [`RenderServiceError::Unreachable`] — the request could not be sent
    /// * [`RenderServiceError::Status`] — non-2xx answer (the body is kept,
    ///   Kroki puts its syntax errors there)
    /// * [`RenderServiceError::InvalidResponse`] — the body could not be read
    pub async fn render(
        &self,
        diagram_type: &str,
        output_format: &str,
        source: &str,
    ) -> Result<String, RenderServiceError> {
        let url = self.endpoint(diagram_type, output_format);
        debug!("POST {} ({} bytes)", url, source.len());

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(source.to_string())
            .send()
            .await
            .map_err(|e| RenderServiceError::Unreachable {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RenderServiceError::InvalidResponse {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(RenderServiceError::Status {
                url,
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        debug!("{} → {} bytes", url, body.len());
        Ok(body)
    }
}
