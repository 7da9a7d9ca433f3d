//! Validation utilities
//!
//! Pure validation and parsing functions with no I/O dependencies.

pub mod bounds;
pub mod parsing;

pub use bounds::{checked_byte_size, checked_element_count, validate_array_bounds};
pub use parsing::{parse_fields, parse_usize};
