//! backfill-core
//!
//! Resumable, page-at-a-time backfill of repository data (pull requests,
//! branches, commits) for an installation, driven by a job queue.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, subscription, job, page, selector, decision, errors）
//! - **ports**: 抽象化レイヤー（SubscriptionStore, JobQueue, PageFetcher, Destination, Clock）
//! - **app**: アプリケーションロジック（catalog, executor, updater, orchestrator, worker）
//! - **impls**: 実装（InMemoryJobQueue, JsonFileSubscriptionStore など）
//! - **config** / **telemetry**: 設定とログ

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod telemetry;

pub use config::{ConfigError, SyncConfig};
