//! Read-only lookups.

mod domain;

pub use domain::DomainDataSource;
