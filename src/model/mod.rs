pub mod downloader;
pub mod meta;
pub mod registry;

pub use downloader::{ModelDownloader, ModelFiles};
pub use meta::{InputType, ModelCategory, ModelMeta};
pub use registry::Registry;
