//! ZView 文件处理
//!
//! - `.dxf` 导入（事件式读取，按图层累积形状）
//! - 设置存储：JSON文件、SQLite

pub mod document;
pub mod dxf_io;
pub mod error;
pub mod settings_store;

pub use document::{Annotation, Document};
pub use error::FileError;
pub use settings_store::{JsonFileStore, SqliteStore};
