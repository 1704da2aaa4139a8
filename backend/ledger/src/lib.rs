pub mod accrual;
pub mod actor;
pub mod debounce;
pub mod ledger;
pub mod publisher;
pub mod query;
pub mod reconcile;
pub mod transition;
pub mod writer;

pub use actor::{spawn, start, LedgerConfig, LedgerHandle};
pub use ledger::Ledger;
pub use publisher::{LivePublisher, Snapshot, Subscription};
pub use query::VoiceTimeReport;
pub use reconcile::reconcile;
pub use transition::{TransitionKind, TransitionOutcome};
pub use writer::{FlushReport, PersistenceWriter};
