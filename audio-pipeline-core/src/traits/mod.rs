pub mod device;
pub mod environment;
pub mod messaging;
pub mod rendering;
