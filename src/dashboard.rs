//! Application state shared by the HTTP server and the CLI.
//!
//! [`Dashboard`] owns the three stores and the last query result, each behind
//! its own `tokio::sync::RwLock`. Mutations take a short write lock; model
//! calls run on snapshots so no lock is held across the network.
//!
//! Querying and stakeholder extraction are single-flight: while one call of a
//! kind is outstanding, a second is rejected with [`DashboardError::Busy`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::connector_fs::{select_paths, Selection};
use crate::gateway::{self, GatewayError, GeminiClient, ModelClient};
use crate::ids::{IdGenerator, UuidIds};
use crate::ingest::{ingest_selection, IngestError};
use crate::models::{
    AgentResult, DashboardSummary, EntrySummary, FileListing, RagSource, Stakeholder,
    StakeholderPatch,
};
use crate::progress::{IngestProgressReporter, NoProgress};
use crate::prompt::{assemble_extraction, assemble_query};
use crate::store::{KnowledgeBase, RagRegistry, StakeholderStore};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("a {0} is already in progress")]
    Busy(&'static str),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub struct Dashboard {
    config: Config,
    client: Arc<dyn ModelClient>,
    ids: Arc<dyn IdGenerator>,
    knowledge_base: RwLock<KnowledgeBase>,
    rag_sources: RwLock<RagRegistry>,
    stakeholders: RwLock<StakeholderStore>,
    last_result: RwLock<Option<AgentResult>>,
    query_in_flight: AtomicBool,
    extraction_in_flight: AtomicBool,
}

impl Dashboard {
    /// Build a dashboard talking to Gemini, with UUID ids.
    pub fn from_config(config: Config) -> Result<Self, GatewayError> {
        let client = GeminiClient::new(&config.agent)?;
        Ok(Self::new(config, Arc::new(client), Arc::new(UuidIds)))
    }

    pub fn new(config: Config, client: Arc<dyn ModelClient>, ids: Arc<dyn IdGenerator>) -> Self {
        let rag_sources = RagRegistry::seeded(&config.rag_sources, ids.as_ref());
        Self {
            config,
            client,
            ids,
            knowledge_base: RwLock::new(KnowledgeBase::new()),
            rag_sources: RwLock::new(rag_sources),
            stakeholders: RwLock::new(StakeholderStore::new()),
            last_result: RwLock::new(None),
            query_in_flight: AtomicBool::new(false),
            extraction_in_flight: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Knowledge base ──────────────────────────────────────────────────

    /// Select `paths` from disk and add them as one entry.
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> Result<EntrySummary, DashboardError> {
        self.ingest_paths_with(paths, &NoProgress).await
    }

    pub async fn ingest_paths_with(
        &self,
        paths: &[PathBuf],
        progress: &dyn IngestProgressReporter,
    ) -> Result<EntrySummary, DashboardError> {
        if paths.is_empty() {
            return Err(DashboardError::InvalidInput(
                "paths must not be empty".to_string(),
            ));
        }
        let selection = select_paths(paths, &self.config.ingest)?;
        self.ingest_with(selection, progress).await
    }

    /// Ingest an already-built selection. Nothing is stored on failure.
    pub async fn ingest(&self, selection: Selection) -> Result<EntrySummary, DashboardError> {
        self.ingest_with(selection, &NoProgress).await
    }

    async fn ingest_with(
        &self,
        selection: Selection,
        progress: &dyn IngestProgressReporter,
    ) -> Result<EntrySummary, DashboardError> {
        let entry =
            ingest_selection(selection, &self.config.ingest, self.ids.as_ref(), progress).await?;
        let entry = self.knowledge_base.write().await.add(entry);
        tracing::debug!(id = %entry.id, "knowledge base entry stored");
        Ok(EntrySummary::from(&*entry))
    }

    pub async fn remove_entry(&self, id: &str) -> bool {
        self.knowledge_base.write().await.remove(id)
    }

    pub async fn entries(&self) -> Vec<EntrySummary> {
        self.knowledge_base
            .read()
            .await
            .entries()
            .iter()
            .map(|e| EntrySummary::from(&**e))
            .collect()
    }

    pub async fn filter_files(&self, query: &str) -> Vec<FileListing> {
        self.knowledge_base.read().await.filter_files(query)
    }

    // ── RAG sources ─────────────────────────────────────────────────────

    /// Flip a source's active flag. `None` for an unknown id.
    pub async fn toggle_rag_source(&self, id: &str) -> Option<bool> {
        self.rag_sources.write().await.toggle(id)
    }

    pub async fn rag_sources(&self) -> Vec<RagSource> {
        self.rag_sources.read().await.all()
    }

    // ── Agent ───────────────────────────────────────────────────────────

    /// Ask the support agent a question for a client country.
    ///
    /// On success the result becomes the last result; on failure the last
    /// result is left as it was.
    pub async fn ask(&self, country: &str, question: &str) -> Result<AgentResult, DashboardError> {
        let country = country.trim();
        let question = question.trim();
        if country.is_empty() {
            return Err(DashboardError::InvalidInput(
                "country must not be empty".to_string(),
            ));
        }
        if question.is_empty() {
            return Err(DashboardError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        let _guard = InFlight::acquire(&self.query_in_flight).ok_or(DashboardError::Busy("query"))?;

        let entries = self.knowledge_base.read().await.entries();
        let sources = self.rag_sources.read().await.all();
        let request = assemble_query(
            country,
            question,
            &entries,
            &sources,
            self.config.agent.search_grounding,
        );

        let result = gateway::answer_query(self.client.as_ref(), &request).await?;
        *self.last_result.write().await = Some(result.clone());
        Ok(result)
    }

    pub async fn last_result(&self) -> Option<AgentResult> {
        self.last_result.read().await.clone()
    }

    // ── Stakeholders ────────────────────────────────────────────────────

    /// Extract stakeholders from the knowledge base and append them, dated
    /// today. Model failures yield an empty list rather than an error.
    pub async fn generate_stakeholders(&self) -> Result<Vec<Stakeholder>, DashboardError> {
        let _guard = InFlight::acquire(&self.extraction_in_flight)
            .ok_or(DashboardError::Busy("stakeholder extraction"))?;

        let entries = self.knowledge_base.read().await.entries();
        let request = assemble_extraction(&entries, self.config.agent.search_grounding);
        let items = gateway::extract_stakeholders(self.client.as_ref(), &request).await;

        let appended =
            self.stakeholders
                .write()
                .await
                .append_extracted(items, self.ids.as_ref(), today());
        tracing::info!(count = appended.len(), "stakeholders imported");
        Ok(appended)
    }

    pub async fn add_stakeholder(&self) -> Stakeholder {
        self.stakeholders
            .write()
            .await
            .add_manual(self.ids.as_ref(), today())
    }

    /// Merge `patch` into a stakeholder. `None` for an unknown id.
    pub async fn update_stakeholder(
        &self,
        id: &str,
        patch: StakeholderPatch,
    ) -> Option<Stakeholder> {
        self.stakeholders.write().await.update(id, patch)
    }

    pub async fn remove_stakeholder(&self, id: &str) -> bool {
        self.stakeholders.write().await.remove(id)
    }

    pub async fn stakeholders(&self) -> Vec<Stakeholder> {
        self.stakeholders.read().await.all()
    }

    pub async fn export_csv(&self) -> String {
        self.stakeholders.read().await.to_csv()
    }

    pub async fn summary(&self) -> DashboardSummary {
        let (knowledge_base_entries, files) = {
            let kb = self.knowledge_base.read().await;
            (kb.len(), kb.file_count())
        };
        DashboardSummary {
            knowledge_base_entries,
            files,
            active_rag_sources: self.rag_sources.read().await.active().len(),
            stakeholders: self.stakeholders.read().await.len(),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Holds a single-flight flag for the life of one call.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
