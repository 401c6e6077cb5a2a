pub mod audio;
pub mod index;
pub mod pipeline;
pub mod shared;
pub mod video;
