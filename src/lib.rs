//! # Sitter
//!
//! A local-first technical support desk backed by a generative model.
//!
//! Sitter keeps an in-memory knowledge base of customer documents, a list of
//! trusted external reference sites (RAG sources), and a stakeholder table.
//! Support questions are answered in English and Traditional Chinese by a
//! remote model that reads the attached documents and, when needed, searches
//! the web. The same model can scan the knowledge base for stakeholders.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ connector_fs│──▶│   ingest    │──▶│    store     │
//! │ (selection) │   │ admit+b64   │   │ KB/RAG/people│
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ snapshot
//!                   ┌─────────────┐   ┌──────▼───────┐
//!                   │   gateway   │◀──│    prompt    │
//!                   │ (Gemini)    │   │  assembler   │
//!                   └──────┬──────┘   └──────────────┘
//!                          ▼
//!                   ┌─────────────┐
//!                   │  dashboard  │──▶ CLI (sitter) / HTTP (server)
//!                   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export API_KEY=...
//! sitter ingest ./customer-docs            # preview what would be ingested
//! sitter ask --country Taiwan --kb ./customer-docs "Why does checkout fail?"
//! sitter stakeholders --kb ./customer-docs --csv > stakeholders.csv
//! sitter serve                              # JSON API on 127.0.0.1:7341
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`connector_fs`] | Filesystem selection |
//! | [`ingest`] | Admission filter and file encoding |
//! | [`progress`] | Ingestion progress on stderr |
//! | [`ids`] | Id generation |
//! | [`store`] | Knowledge base, RAG sources, stakeholders |
//! | [`prompt`] | Model request assembly |
//! | [`gateway`] | Model client and response parsing |
//! | [`fallbacks`] | Defaults for missing model output |
//! | [`dashboard`] | Shared application state |
//! | [`server`] | JSON HTTP API |
//! | [`sources`] | RAG source listing for the CLI |

pub mod config;
pub mod connector_fs;
pub mod dashboard;
pub mod fallbacks;
pub mod gateway;
pub mod ids;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod prompt;
pub mod server;
pub mod sources;
pub mod store;
