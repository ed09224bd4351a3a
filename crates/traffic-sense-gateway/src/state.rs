//! Gateway shared state.

use std::sync::Arc;

use traffic_sense_agent::AgentService;
use traffic_sense_core::config::Config;

/// Shared state handed to every request handler.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub service: Arc<AgentService>,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, service: Arc<AgentService>) -> Self {
        Self {
            config,
            service,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Build the agent service the config asks for.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let service = AgentService::from_config(&config)?;
        Ok(Self::new(Arc::new(config), Arc::new(service)))
    }

    /// Attach a Prometheus handle so `/metrics` can render it.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
