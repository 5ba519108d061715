//! Ports - the seams to the outside world (hexagonal style).
//!
//! Each trait hides one external system:
//! - `SubscriptionStore`: where sync progress is persisted (source of truth)
//! - `JobQueue`: delivery of jobs to workers
//! - `PageFetcher`: the source system, one implementation per task kind
//! - `Destination`: the system we mirror into
//! - `Clock` / `IdGenerator`: time and ids, swappable in tests

pub mod clock;
pub mod destination;
pub mod fetcher;
pub mod id_generator;
pub mod queue;
pub mod subscription_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::destination::Destination;
pub use self::fetcher::{FetchContext, PageFetcher};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::queue::{JobLease, JobQueue, QueueCounts};
pub use self::subscription_store::SubscriptionStore;
