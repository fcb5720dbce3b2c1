//! Platform administration: fee percentage, fee collector and the set of
//! operators allowed to report race results.

pub mod policy;

pub use policy::{AdminPolicy, DEFAULT_FEE_PERCENT, MAX_FEE_PERCENT, check_fee_percent, fee_split};
