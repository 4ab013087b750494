pub mod history;
pub mod ramp;
