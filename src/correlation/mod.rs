//! Correlation of shots and answers on a session channel.

mod correlator;
mod events;
mod results;

pub use correlator::{countdown_secs, CorrelationView, Correlator};
pub use events::{AnnounceError, AnswerEvent, ShotAnnouncement, ShotEvent, MIN_JOB_ID_LEN};
pub use results::{ResultEntry, ResultLog, DEFAULT_RETAIN, MAX_RETAIN, MIN_RETAIN};
