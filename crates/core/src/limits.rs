//! Bounds shared by configuration and the aggregation engine.

/// Most decimals an average may be displayed with.
pub const MAX_PRECISION: u32 = 4;

/// Longest trend window, in months.
pub const MAX_TREND_MONTHS: u32 = 24;
