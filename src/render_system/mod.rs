pub mod accumulate_shader;
pub mod backend;
pub mod environment;
pub mod frame_target;
pub mod interactive_rendering;
pub mod raytrace_shader;
pub mod sample_accumulator;
pub mod scene;
pub mod software_device;
