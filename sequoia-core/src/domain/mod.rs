//! Domain types shared by every layer.

pub mod bar;
pub mod symbol;

pub use bar::{PriceBar, PriceSeries};
pub use symbol::{Exchange, SymbolError, TickerSymbol};
