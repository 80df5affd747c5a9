pub mod arcgis;
pub mod fetch;
