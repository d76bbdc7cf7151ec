//! Price Feed seam: latest quotes and historical closes.
//!
//! The Trade Engine talks to a raw [`PriceFeed`] so every trade executes
//! against a freshly fetched price. Read paths (portfolio view, analytics)
//! go through [`CachedPriceFeed`].

pub mod cache;
pub mod cached_feed;
pub mod feed;
pub mod memory;
pub mod pg_feed;
pub mod retry;

pub use cache::TtlCache;
pub use cached_feed::{CacheSettings, CachedPriceFeed};
pub use feed::{with_timeout, Bar, FeedError, Instrument, PriceFeed, Quote};
pub use memory::InMemoryPriceFeed;
pub use pg_feed::PgPriceFeed;
pub use retry::RetryPolicy;
