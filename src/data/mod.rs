//! Data handling: frames, CSV I/O, feature typing and target decoding

pub mod frame;
pub mod loader;
pub mod preprocess;
pub mod target;

pub use frame::{Categorical, Column, ColumnData, Frame};
pub use loader::DataLoader;
pub use preprocess::preprocess;
pub use target::BinaryTarget;
