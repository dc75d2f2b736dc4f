mod input;
mod loop_runner;
mod renderer;

pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{run_app, AppError, LoopConfig, SceneDriver};
pub use renderer::FrameRenderer;
