pub mod skeleton_renderer;
