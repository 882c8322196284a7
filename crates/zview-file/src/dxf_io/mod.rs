//! DXF导入
//!
//! 流程：[`DxfEventReader`] 遍历图纸并回调 [`DxfReader`]，
//! 后者按 [`DxfReaderOptions`] 缩放坐标、跳过退化图元并按图层累积形状，
//! 最后由 [`DxfReader::transfer`] 生成 [`Document`]。

mod events;
mod parameters;
mod reader;

pub use events::{
    block_layer_name, is_block_layer, DxfEventHandler, DxfEventReader, ReadStats, SplineData,
    BLOCK_LAYER_PREFIX,
};
pub use parameters::{DxfReaderOptions, DxfReaderParameterKeys, DxfReaderParameters};
pub use reader::DxfReader;

use crate::document::Document;
use crate::error::FileError;
use std::path::Path;
use zview_core::color::Color;

/// 从DXF文件导入
pub fn import(path: &Path, options: &DxfReaderOptions) -> Result<Document, FileError> {
    let mut reader = DxfReader::new(*options);
    reader.read_file(path)?;

    let mut document = reader.transfer();
    document.metadata.source = Some(path.to_path_buf());
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        document.metadata.title = stem.to_string();
    }

    Ok(document)
}

/// AutoCAD颜色索引(ACI)转颜色
pub fn aci_to_color(aci: u8) -> Color {
    match aci {
        1 => Color::RED,
        2 => Color::YELLOW,
        3 => Color::GREEN,
        4 => Color::CYAN,
        5 => Color::BLUE,
        6 => Color::MAGENTA,
        7 => Color::WHITE,
        8 => Color::GRAY,
        _ => Color::WHITE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.dxf");

        let mut drawing = dxf::Drawing::new();
        let mut circle = dxf::entities::Circle::default();
        circle.radius = 5.0;
        drawing.add_entity(dxf::entities::Entity::new(
            dxf::entities::EntityType::Circle(circle),
        ));
        let mut degenerate = dxf::entities::Circle::default();
        degenerate.radius = 0.0;
        drawing.add_entity(dxf::entities::Entity::new(
            dxf::entities::EntityType::Circle(degenerate),
        ));
        drawing.save_file(&path).unwrap();

        let options = DxfReaderOptions {
            scaling: 2.0,
            ..DxfReaderOptions::default()
        };
        let document = import(&path, &options).unwrap();

        assert_eq!(document.metadata.title, "plate");
        assert_eq!(document.entity_count(), 1);
        let bounds = document.bounds().unwrap();
        assert!((bounds.max.x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_aci_colors() {
        assert_eq!(aci_to_color(1), Color::RED);
        assert_eq!(aci_to_color(200), Color::WHITE);
    }
}
