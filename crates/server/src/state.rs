use std::sync::Arc;

use review_engine::cloud::CloudClient;
use review_engine::config::ReviewConfig;
use review_engine::error::ReviewError;
use review_engine::orchestrator::Orchestrator;
use review_engine::report::AccuracyReportBuilder;
use review_engine::stockfish::StockfishEvaluator;

/// The process-wide orchestrator; its run guard makes reviews single-flight.
pub type ReviewOrchestrator = Orchestrator<CloudClient, StockfishEvaluator, AccuracyReportBuilder>;

pub type SharedOrchestrator = Arc<ReviewOrchestrator>;

pub fn build_orchestrator(config: &ReviewConfig) -> Result<SharedOrchestrator, ReviewError> {
    let orchestrator = Orchestrator::new(
        CloudClient::new(&config.cloud_eval_url, config.cloud_timeout)?,
        StockfishEvaluator::new(&config.stockfish_path, config.stockfish_hash_mb),
        AccuracyReportBuilder,
        config.pool_settings(),
    );
    Ok(Arc::new(orchestrator))
}
