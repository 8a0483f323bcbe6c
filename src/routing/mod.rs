pub mod resolver;

pub use resolver::{ProviderResolver, order_candidates};
