// Engine services: the live market session, the analysis client and the simulated trade ledger.
pub mod analysis;
pub mod market_session;
pub mod trade_ledger;

pub use market_session::{MarketSession, SessionSnapshot};
