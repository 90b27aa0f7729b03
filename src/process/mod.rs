// src/process/mod.rs
pub mod columns;
pub mod consolidate;
pub mod deaccumulate;
pub mod normalize;
pub mod numeric;
pub mod period;
pub mod read;

pub use consolidate::{AuditEntry, AuditStatus};
pub use normalize::CanonicalRecord;
pub use period::Period;
pub use read::RawTable;
