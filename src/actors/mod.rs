//! Actor-based polling
//!
//! Each discovered host gets one poller actor running as an independent tokio
//! task. All pollers share the schema and the writer.
//!
//! ## Architecture Overview
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │ collector (main) │
//!                 └────────┬─────────┘
//!                          │ spawns, one per host
//!           ┌──────────────┼──────────────┐
//!           │              │              │
//!    ┌──────▼──────┐       │       ┌──────▼──────┐
//!    │  Poller-1   │       │       │  Poller-N   │
//!    │  (host A)   │       │       │  (host N)   │
//!    └──────┬──────┘       │       └──────┬──────┘
//!           │              │              │
//!           └──────────────┼──────────────┘
//!                          │ Arc<Writer>
//!                 ┌────────▼─────────┐
//!                 │  Writer / Store  │
//!                 └──────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each poller has an mpsc command channel (PollNow, Shutdown)
//! 2. **Request/Response**: oneshot channels carry cycle reports back
//! 3. **Cancellation**: one shared `CancellationToken` stops every poller

pub mod messages;
pub mod poller;
