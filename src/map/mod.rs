pub mod bounds;
pub mod layer;
pub mod map;
