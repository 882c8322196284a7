//! 文件操作错误定义

use thiserror::Error;
use zview_core::property::PropertyError;
use zview_core::settings::StoreError;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DXF error: {0}")]
    Dxf(String),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),

    #[error("Property error: {0}")]
    Property(#[from] PropertyError),
}

