pub mod clock;
pub mod seqlock;
pub mod telemetry;

pub use clock::*;
pub use seqlock::{Seqlock, TimestampCell};
pub use telemetry::*;
