pub mod crawler;
pub mod traverse;
pub mod web;

pub use crawler::Fetcher;
pub use traverse::{FrontierEntry, TraversalLimits, traverse};
pub use web::PageFetcher;
