//! Flat-file contracts for the attendance system.
//!
//! Identity directory, trainer label map, per-session records and the
//! consolidated attendance table all live as CSV under one data directory
//! described by [`Layout`]. Aggregation only ever reads complete, previously
//! closed session files; each session file is written exactly once.

pub mod attendance;
pub mod error;
pub mod label_map;
pub mod layout;
pub mod roster;
pub mod session;

pub use attendance::{aggregate, aggregate_and_write, AttendanceRow, AttendanceTable};
pub use error::StoreError;
pub use label_map::{load_label_map, write_label_map};
pub use layout::Layout;
pub use roster::{load_identities, load_roster, register, remove};
pub use session::{read_session, write_session, SessionRecord};
