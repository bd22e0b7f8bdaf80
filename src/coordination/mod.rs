//! Crosschain coordination contract access
//!
//! - Locating the coordination contract (configured or discovered)
//! - Read-only calls against it
//! - The production [`RemoteStatusSource`](crate::tracker::RemoteStatusSource)

pub mod contract;
pub mod setup;
pub mod source;

pub use contract::CoordinationContract;
pub use setup::{CoordinationContractInfo, CoordinationSetup};
pub use source::ChainStatusSource;
