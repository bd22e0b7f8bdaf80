//! Sample flows built on the tracker

pub mod simple;
pub mod watch;

pub use simple::{SampleContracts, SimpleSample, SimpleSampleParams};
pub use watch::watch_transactions;
