//! Universe resolution: which symbols a run scans.

pub mod cache;
pub mod listing;
pub mod resolver;

pub use cache::UniverseCache;
pub use listing::{EastmoneyListing, ListingChannel, ListingError, TushareListing};
pub use resolver::{
    normalize_listing, ResolverConfig, UniverseError, UniverseResolver, UniverseSnapshot,
    UniverseSource, DEFAULT_FALLBACK,
};
