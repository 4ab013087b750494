pub mod analysis;
pub mod capture;
pub mod device;
pub mod stream;
