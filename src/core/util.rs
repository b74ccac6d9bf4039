//! General helper utilities

pub mod delaunay_validation;

pub use delaunay_validation::{DelaunayValidationError, find_delaunay_violations, is_delaunay};
