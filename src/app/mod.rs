// App layer: outward-facing surfaces built on top of core.

#[cfg(feature = "server")]
pub mod server;
