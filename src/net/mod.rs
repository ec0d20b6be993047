pub mod aoi;
pub mod protocol;
