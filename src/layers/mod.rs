pub mod area;
pub mod factory;
pub mod menu;
pub mod popup;
pub mod query;
pub mod spec;
