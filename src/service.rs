//! Presentation shim: validates the two API keys, builds a fresh pipeline per
//! request and renders the outcome as the single string shown in the form.

use crate::config::{Credentials, ShopperConfig};
use crate::crew::{shopping_tasks, PipelineRunner, PipelineSettings, RunReport, ShoppingAgents};
use crate::error::{sanitize_error_message, ShopperError, ShopperResult};
use crate::llm::providers::openai::{OpenAiConfig, OpenAiProvider};
use crate::observability::metrics::metrics;
use crate::tools::ToolSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use crate::crew::EXAMPLE_QUERIES;

/// Builds the request-scoped pipeline for one query
pub trait CrewFactory: Send + Sync {
    fn build(&self, credentials: &Credentials, query: &str) -> ShopperResult<PipelineRunner>;
}

/// Production factory: OpenAI-compatible provider plus the HTTP tools
#[derive(Debug, Clone)]
pub struct HttpCrewFactory {
    config: ShopperConfig,
}

impl HttpCrewFactory {
    pub fn new(config: ShopperConfig) -> Self {
        Self { config }
    }

    fn llm_config(&self, credentials: &Credentials) -> OpenAiConfig {
        OpenAiConfig {
            api_key: credentials.llm_api_key.clone(),
            base_url: self.config.llm.base_url.clone(),
            timeout: Duration::from_secs(self.config.llm.timeout_secs),
            ..OpenAiConfig::default()
        }
    }
}

impl CrewFactory for HttpCrewFactory {
    fn build(&self, credentials: &Credentials, query: &str) -> ShopperResult<PipelineRunner> {
        let llm = OpenAiProvider::new(self.llm_config(credentials))?;
        let tools = ToolSet::from_credentials(credentials, &self.config.tools)?;
        let agents = ShoppingAgents::new(self.config.pipeline.verbose);

        PipelineRunner::new(
            Arc::new(llm),
            tools,
            shopping_tasks(query, &agents),
            PipelineSettings::from_config(&self.config),
        )
    }
}

/// Entry point shared by the web form and the CLI
#[derive(Clone)]
pub struct ShoppingService {
    factory: Arc<dyn CrewFactory>,
}

impl ShoppingService {
    pub fn new(factory: Arc<dyn CrewFactory>) -> Self {
        Self { factory }
    }

    pub fn from_config(config: ShopperConfig) -> Self {
        Self::new(Arc::new(HttpCrewFactory::new(config)))
    }

    /// Run the pipeline and return the final report, or the user-facing message
    ///
    /// Blank keys give exactly `"Please enter both API keys"` without building
    /// anything; every other failure gives `"An error occurred: {message}"`.
    pub async fn search_products(&self, llm_key: &str, search_key: &str, query: &str) -> String {
        match self.run(llm_key, search_key, query).await {
            Ok(report) => report.final_output().to_string(),
            Err(e) => e.to_user_message(),
        }
    }

    /// Like [`search_products`](Self::search_products) but keeps every stage output
    pub async fn run(
        &self,
        llm_key: &str,
        search_key: &str,
        query: &str,
    ) -> ShopperResult<RunReport> {
        let Some(credentials) = Credentials::from_form(llm_key, search_key) else {
            metrics().run_rejected();
            warn!("Search rejected: missing API key");
            return Err(ShopperError::MissingCredentials);
        };

        let mut runner = self.factory.build(&credentials, query).map_err(|e| {
            warn!(
                error = %sanitize_error_message(&e.to_string()),
                "Failed to build pipeline"
            );
            e
        })?;

        info!(run_id = %runner.run_id(), query = %query.trim(), "Starting shopping search");
        runner.run().await
    }
}
