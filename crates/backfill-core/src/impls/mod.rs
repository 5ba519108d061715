//! Impls - ports の実装（開発用・テスト用）
//!
//! - **InMemoryJobQueue**: per-kind lease queue with retry scheduling
//! - **InMemorySubscriptionStore** / **JsonFileSubscriptionStore**: 正本
//! - **InMemorySource**: 固定データを返す PageFetcher
//! - **RecordingDestination**: 通知回数を数えるテスト用 destination
//!
//! 本番用の source/destination クライアントは別クレートに置く想定。

pub mod destination;
pub mod json_store;
pub mod memory_queue;
pub mod memory_source;
pub mod memory_store;

pub use self::destination::RecordingDestination;
pub use self::json_store::JsonFileSubscriptionStore;
pub use self::memory_queue::{InMemoryJobQueue, JobSnapshot, JobState};
pub use self::memory_source::{FetchCall, InMemorySource};
pub use self::memory_store::InMemorySubscriptionStore;
