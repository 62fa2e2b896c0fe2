//! Typed database queries, one module per entity

pub mod exams;
pub mod responses;
pub mod results;
pub mod sessions;
pub mod tokens;
pub mod violations;
