//! 导入文档数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use zview_core::entity::{Entity, EntityId};
use zview_core::layer::LayerManager;
use zview_core::math::{BoundingBox3, Point3};

/// 文档元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// 文档标题
    pub title: String,

    /// 来源文件
    pub source: Option<PathBuf>,

    /// 导入时间
    pub imported_at: DateTime<Utc>,

    /// 单位（导入时已按缩放系数换算）
    pub units: String,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            source: None,
            imported_at: Utc::now(),
            units: "mm".to_string(),
        }
    }
}

/// 注释（文字、尺寸标注），不参与形状构造
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Annotation {
    Text {
        layer: String,
        position: Point3,
        height: f64,
        text: String,
    },
    Dimension {
        layer: String,
        start: Point3,
        end: Point3,
        /// 文字位置
        position: Point3,
        rotation: f64,
    },
}

impl Annotation {
    pub fn layer(&self) -> &str {
        match self {
            Annotation::Text { layer, .. } | Annotation::Dimension { layer, .. } => layer,
        }
    }
}

/// 导入结果文档
#[derive(Debug, Default)]
pub struct Document {
    /// 元数据
    pub metadata: DocumentMetadata,

    /// 所有实体（ID单调递增，按导入顺序排列）
    entities: BTreeMap<EntityId, Entity>,

    /// 图层管理器
    pub layers: LayerManager,

    annotations: Vec<Annotation>,
}

impl Document {
    /// 创建新文档
    pub fn new() -> Self {
        Self::default()
    }

    /// 从文件导入，参数使用默认值
    pub fn open(path: impl AsRef<Path>) -> Result<Self, crate::FileError> {
        let path = path.as_ref();

        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("dxf") => crate::dxf_io::import(path, &crate::dxf_io::DxfReaderOptions::default()),
            _ => Err(crate::FileError::InvalidFormat(
                "Unknown file extension".to_string(),
            )),
        }
    }

    /// 添加实体
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.entities.insert(id, entity);
        id
    }

    /// 获取所有实体
    pub fn all_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// 指定图层上的实体
    pub fn entities_on_layer<'a>(&'a self, layer: &'a str) -> impl Iterator<Item = &'a Entity> {
        self.entities.values().filter(move |e| e.layer == layer)
    }

    /// 获取实体数量
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// 计算所有实体的包围盒
    pub fn bounds(&self) -> Option<BoundingBox3> {
        let mut iter = self.entities.values();
        let first = iter.next()?;
        let mut bbox = first.bounding_box();

        for entity in iter {
            bbox = bbox.union(&entity.bounding_box());
        }

        if bbox.is_empty() {
            None
        } else {
            Some(bbox)
        }
    }
}
