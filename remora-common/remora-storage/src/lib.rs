pub mod settings;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "http")]
pub mod couch;
#[cfg(feature = "http")]
pub mod webdav;
#[cfg(feature = "http")]
mod http;

pub use settings::BackendSettings;
#[cfg(feature = "memory")]
pub use memory::MemoryBackend;
#[cfg(feature = "http")]
pub use couch::CouchBackend;
#[cfg(feature = "http")]
pub use webdav::WebDavBackend;
