pub mod clock;
pub mod error;
pub mod month;
pub mod nav;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "returns")]
pub mod returns;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::NavEngineError;
pub use month::MonthKey;
pub use nav::NavSeries;
pub use types::*;

/// Standard result type for all NAV engine operations
pub type NavEngineResult<T> = Result<T, NavEngineError>;
