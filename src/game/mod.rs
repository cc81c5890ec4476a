//! Game session engine: one timed play-through over a fixed question sequence.

pub mod clock;
mod session;

pub use clock::{
    format_clock, parse_clock, Clock, IntervalTicker, ManualClock, SystemClock, TickSource,
};
pub use session::{
    normalize_answer, EndReason, GameResult, GameSession, Outcome, SessionError, SessionView,
    DEFAULT_TIME_BUDGET_SECS,
};
