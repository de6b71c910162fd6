//! Provider registrations and inheritance resolution

mod builtin;
pub mod registry;

pub use builtin::builtin_registrations;
pub use registry::ProviderRegistry;
