pub mod frame;
pub mod gpu;
pub mod pipeline;
pub mod scene;
pub mod text;
