//! File metadata formats: AppleDouble sidecars and resource fork maps.

pub mod appledouble;
pub mod resource;
