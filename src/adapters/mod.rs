// Adapters layer: concrete registry implementations behind the domain ports.

pub mod http;
pub mod memory;

pub use http::HttpRegistry;
pub use memory::InMemoryRegistry;
