//! 命令定义和实现

pub mod decode;
pub mod stream;

pub use decode::DecodeCommand;
pub use stream::StreamCommand;
