mod shape_index;

pub use shape_index::*;
