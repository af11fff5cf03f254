//! Configuration types for EBD extraction and rendering.
//!
//! Everything a run needs besides the input and output paths lives in
//! [`ToolchainConfig`], built via [`ToolchainConfigBuilder`]. The rendering
//! service location is a separate [`KrokiSettings`] value because it is the
//! only part that is normally sourced from the environment
//! (`KROKI_HOST` / `KROKI_PORT`).

use crate::error::EbdToolError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default Kroki host when `KROKI_HOST` is unset.
pub const DEFAULT_KROKI_HOST: &str = "localhost";

/// Default Kroki port when `KROKI_PORT` is unset.
pub const DEFAULT_KROKI_PORT: u16 = 8000;

/// Configuration for one extraction run.
///
/// # Example
/// ```rust
/// use ebd_toolchain::{OutputFormat, ToolchainConfig};
///
/// let config = ToolchainConfig::builder()
///     .format(OutputFormat::Json)
///     .format(OutputFormat::Svg)
///     .kroki_host("kroki.internal")
///     .kroki_port(8125)
///     .build()
///     .unwrap();
/// assert_eq!(config.formats.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct ToolchainConfig {
    /// Requested output formats. An ordered set, so duplicates collapse and
    /// formats are always produced in the same order.
    ///
    /// An empty set still extracts every table and builds every graph; it
    /// only validates the document.
    pub formats: BTreeSet<OutputFormat>,

    /// Where the SVG rendering service lives.
    pub kroki: KrokiSettings,

    /// Optional progress callback invoked once per decision tree.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for ToolchainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolchainConfig")
            .field("formats", &self.formats)
            .field("kroki", &self.kroki)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ToolchainConfig {
    /// Create a new builder for `ToolchainConfig`.
    pub fn builder() -> ToolchainConfigBuilder {
        ToolchainConfigBuilder {
            config: Self::default(),
        }
    }

    /// `true` if any requested format needs the decision graph.
    pub fn needs_graph(&self) -> bool {
        self.formats.iter().any(|f| f.requires_graph())
    }
}

/// Builder for [`ToolchainConfig`].
#[derive(Debug)]
pub struct ToolchainConfigBuilder {
    config: ToolchainConfig,
}

impl ToolchainConfigBuilder {
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.formats.insert(format);
        self
    }

    pub fn formats(mut self, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        self.config.formats.extend(formats);
        self
    }

    pub fn kroki(mut self, settings: KrokiSettings) -> Self {
        self.config.kroki = settings;
        self
    }

    pub fn kroki_host(mut self, host: impl Into<String>) -> Self {
        self.config.kroki.service_host = host.into();
        self
    }

    pub fn kroki_port(mut self, port: u16) -> Self {
        self.config.kroki.service_port = port;
        self
    }

    /// Attach a progress callback.
    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ToolchainConfig, EbdToolError> {
        let k = &self.config.kroki;
        if k.service_host.trim().is_empty() {
            return Err(EbdToolError::InvalidConfig(
                "Kroki host must not be empty".into(),
            ));
        }
        if k.service_port == 0 {
            return Err(EbdToolError::InvalidConfig(
                "Kroki port must be 1–65535, got 0".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Rendering service ────────────────────────────────────────────────────

/// Location of the Kroki rendering service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KrokiSettings {
    /// Host name or address. May carry an explicit `http://`/`https://`
    /// scheme; plain hosts are reached over `http`.
    pub service_host: String,
    pub service_port: u16,
}

impl Default for KrokiSettings {
    fn default() -> Self {
        Self {
            service_host: DEFAULT_KROKI_HOST.to_string(),
            service_port: DEFAULT_KROKI_PORT,
        }
    }
}

impl KrokiSettings {
    /// Read `KROKI_HOST` and `KROKI_PORT`, falling back to the defaults for
    /// unset variables. A port that is not a valid `u16` is an error.
    pub fn from_env() -> Result<Self, EbdToolError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`KrokiSettings::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EbdToolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(host) = lookup("KROKI_HOST").filter(|h| !h.trim().is_empty()) {
            settings.service_host = host.trim().to_string();
        }
        if let Some(port) = lookup("KROKI_PORT") {
            settings.service_port = port.trim().parse::<u16>().map_err(|_| {
                EbdToolError::InvalidConfig(format!(
                    "KROKI_PORT must be an integer 1–65535, got '{port}'"
                ))
            })?;
        }
        Ok(settings)
    }

    /// Base URL of the service, without a trailing slash.
    ///
    /// A port already present in the host wins over `service_port`.
    pub fn base_url(&self) -> String {
        let host = self.service_host.trim_end_matches('/');
        let (scheme, rest) = host.split_once("://").unwrap_or(("http", host));
        let authority_len = rest.find('/').unwrap_or(rest.len());
        let (authority, path) = rest.split_at(authority_len);
        // skip a bracketed IPv6 address when looking for the port separator
        let after_address = authority.rfind(']').map_or(authority, |i| &authority[i..]);
        if after_address.contains(':') {
            format!("{scheme}://{authority}{path}")
        } else {
            format!("{scheme}://{authority}:{}{path}", self.service_port)
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// One artifact kind per decision tree.
///
/// The derive order defines the production order inside a tree: the JSON
/// dump comes first because it only needs the table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured data: the extracted table as JSON.
    Json,
    /// Graph description: Graphviz DOT source.
    Dot,
    /// Diagram description: PlantUML activity diagram.
    Puml,
    /// Vector image rendered by the Kroki service.
    Svg,
}

impl OutputFormat {
    /// All formats, in production order.
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Json,
        OutputFormat::Dot,
        OutputFormat::Puml,
        OutputFormat::Svg,
    ];

    /// File extension of the artifact.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Dot => "dot",
            OutputFormat::Puml => "puml",
            OutputFormat::Svg => "svg",
        }
    }

    /// Everything except the JSON dump is derived from the graph.
    pub fn requires_graph(self) -> bool {
        !matches!(self, OutputFormat::Json)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = EbdToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" | "structured-data" => Ok(OutputFormat::Json),
            "dot" | "graph-description" => Ok(OutputFormat::Dot),
            "puml" | "diagram-description" => Ok(OutputFormat::Puml),
            "svg" | "vector-image" => Ok(OutputFormat::Svg),
            other => Err(EbdToolError::InvalidConfig(format!(
                "Unknown output format '{other}' (expected json, dot, puml or svg)"
            ))),
        }
    }
}
