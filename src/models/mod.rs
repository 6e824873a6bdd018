//! Domain model module declarations.

pub mod descriptor;
pub mod session;
