// Market data: instrument catalog, candle window, synthetic generator and local persistence
pub mod catalog;
pub mod generator;
pub mod market_data;
pub mod persist;
