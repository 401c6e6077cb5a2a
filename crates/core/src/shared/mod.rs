pub mod constants;
pub mod hardware;
pub mod model_resolver;
pub mod timestamp;
