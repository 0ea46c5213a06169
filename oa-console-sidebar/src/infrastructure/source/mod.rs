pub mod http;
pub mod memory;

pub use http::HttpSidebarSource;
pub use memory::InMemorySidebarSource;
