pub mod cpu_skeleton_renderer;
