pub mod daily;

pub use daily::{to_int_or_none, yyyymmdd_to_iso, DailyObservation, MISSING_VALUE};
