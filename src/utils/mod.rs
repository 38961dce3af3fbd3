pub mod portal;
pub mod snapshot;
pub mod wechat;
