//! API authentication adapters

mod resolver;

pub use resolver::StaticTokenResolver;
