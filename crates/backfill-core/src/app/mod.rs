//! App - アプリケーション層
//!
//! ports を組み合わせて同期ロジックを実装します。
//!
//! # 主要コンポーネント
//! - **TaskCatalog**: task kind → PageFetcher（起動時検証つき）
//! - **StepExecutor**: 1 ページ fetch
//! - **updater**: ページ結果の反映と完了判定
//! - **SyncOrchestrator**: ジョブ 1 件の処理 / sync の開始
//! - **InstallationLimiter**: installation 単位の直列化
//! - **WorkerPool**: キューごとのワーカー
//! - **status**: 進捗ビュー

pub mod catalog;
pub mod executor;
pub mod limiter;
pub mod orchestrator;
pub mod status;
pub mod updater;
pub mod worker;

pub use self::catalog::{CatalogError, TaskCatalog, TaskCatalogBuilder};
pub use self::executor::StepExecutor;
pub use self::limiter::{InstallationLimiter, InstallationPermit};
pub use self::orchestrator::SyncOrchestrator;
pub use self::status::{InstallationProgress, NextStep, StatusReport, status_report};
pub use self::updater::apply_result;
pub use self::worker::WorkerPool;
