//! Auction orchestration.
//!
//! Runs the waterfall (or a bounded-concurrency auction) across registered
//! adapters within a time budget, converts every adapter failure into a
//! typed outcome, and hands winning fills to the ad cache.

mod breaker;
mod orchestrator;
mod request;

pub use breaker::{AdapterBreaker, BreakerConfig, BreakerState};
pub use orchestrator::{
    AuctionConfig, AuctionOrchestrator, AuctionOutcome, AuctionPhase, AuctionStrategy,
};
pub use request::{AdRequest, DEFAULT_ADAPTER_TIMEOUT};
