pub mod error;
pub mod event;
pub mod time;
pub mod traits;
pub mod types;

pub use error::LedgerError;
pub use event::{PresenceChange, PresenceEvent};
pub use time::{day_key, elapsed_whole_seconds, format_hms, parse_day_key};
pub use traits::{Clock, ManualClock, RecordStore, SystemClock};
pub use types::{AccountingRecord, PersistedRecord, Presentation, SubjectId};
