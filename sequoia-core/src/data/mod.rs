//! Data acquisition: resilient HTTP, source adapters and the waterfall.

pub mod circuit_breaker;
pub mod eastmoney;
pub mod http;
pub mod provider;
pub mod sina;
pub mod tushare;
pub mod waterfall;

pub use circuit_breaker::CircuitBreaker;
pub use eastmoney::EastmoneyAdapter;
pub use http::{
    HttpRequest, HttpResponse, Method, NetworkError, ResilientClient, RetryPolicy, Transport,
    TransportError,
};
pub use provider::{DataSource, SchemaError, SourceAdapter, SourceResult, SourcedSeries, Unavailable};
pub use sina::SinaAdapter;
pub use tushare::{TushareAdapter, TushareApi};
pub use waterfall::{DataWaterfall, SeriesFetcher, WaterfallConfig};
