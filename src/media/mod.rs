pub mod clip;
pub mod frame;
