pub mod accessors;
pub mod context;
pub mod error;
pub mod misc;
pub mod predicates;
pub mod signature_sets;
pub mod signing;
