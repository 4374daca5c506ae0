//! License policy: expiry, tiers and grace windows.

pub mod expiry;
