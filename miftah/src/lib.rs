//! # Miftah — hierarchical dependency injection for Rust
//!
//! A declarative, hierarchical DI engine: bindings map tokens to
//! construction strategies, injectors resolve them transitively with
//! caching, cycle detection and precise diagnostic paths.

pub use miftah_injector::*;
pub use miftah_support::*;
