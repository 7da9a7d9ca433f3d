//! Abstract interfaces shared by the tile storage crates

pub mod element;

pub use element::MatrixElement;
