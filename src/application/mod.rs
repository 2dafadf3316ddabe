//! Application services and the ports they depend on.

pub mod banners;
pub mod error;
pub mod repos;
