pub mod guides;
pub mod input;
pub mod viewport;
