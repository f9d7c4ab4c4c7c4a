pub mod code;
pub mod domain;
pub mod ledger;
pub mod memory;
pub mod ports;

pub use code::{normalize_code, CodeSource, RandomCodeSource};
pub use domain::{AppendOutcome, AttendanceMark, ClassTally, GeoPoint, NewSession, Session};
pub use ledger::{LedgerError, LedgerResult, SessionLedger};
pub use memory::InMemorySessionStore;
pub use ports::{PortError, PortResult, SessionStore};
