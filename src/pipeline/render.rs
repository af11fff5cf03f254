//! Format dispatch: one [`Artifact`] per requested [`OutputFormat`].
//!
//! JSON is rendered from the table; it is produced before the graph is
//! built so a table that cannot become a graph still yields its JSON dump.
//! DOT and PlantUML are pure text transformations of the graph. SVG is the
//! DOT source rendered by Kroki, the only step that leaves the process.

use crate::config::{KrokiSettings, OutputFormat};
use crate::error::RenderError;
use crate::model::{EbdGraph, EbdTable};
use crate::output::Artifact;
use crate::pipeline::{dot, kroki::KrokiClient, plantuml};
use tracing::debug;

/// Renders tables and graphs into artifacts.
#[derive(Debug, Clone)]
pub struct Renderer {
    kroki: KrokiClient,
}

impl Renderer {
    pub fn new(settings: &KrokiSettings) -> Self {
        Self {
            kroki: KrokiClient::new(settings),
        }
    }

    /// The structured-data artifact: the table as sorted, indented JSON.
    pub fn render_json(&self, table: &EbdTable) -> Result<Artifact, RenderError> {
        let json = table
            .to_sorted_json()
            .map_err(|e| RenderError::Serialization(e.to_string()))?;
        Ok(Artifact::new(&table.metadata.ebd_code, OutputFormat::Json, json))
    }

    /// Render a graph-derived format (`dot`, `puml` or `svg`).
    ///
    /// # Errors
    /// PlantUML structure errors, [`RenderError::Service`] for SVG, and
    /// [`RenderError::Serialization`] when called with
    /// [`OutputFormat::Json`] (use [`Renderer::render_json`]).
    pub async fn render_graph(
        &self,
        graph: &EbdGraph,
        format: OutputFormat,
    ) -> Result<Artifact, RenderError> {
        let key = &graph.metadata.ebd_code;
        let content = match format {
            OutputFormat::Json => {
                return Err(RenderError::Serialization(
                    "JSON is rendered from the table, not the graph".to_string(),
                ))
            }
            OutputFormat::Dot => dot::to_dot(graph),
            OutputFormat::Puml => plantuml::to_plantuml(graph)?,
            OutputFormat::Svg => {
                debug!("{}: rendering SVG via {}", key, self.kroki.base_url());
                self.kroki.dot_to_svg(&dot::to_dot(graph)).await?
            }
        };
        Ok(Artifact::new(key, format, content))
    }
}
