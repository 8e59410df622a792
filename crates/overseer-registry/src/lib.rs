//! Composition root for the governance core.
//!
//! The [`ServiceRegistry`] builds the configuration store and every
//! service in dependency order, owns the pipeline, pushes configuration
//! changes into the live services, and drives periodic maintenance and
//! lifecycle transitions.

pub mod registry;

pub use registry::ServiceRegistry;
