//! 实体标识和管理
//!
//! 实体是导入文档中的一个形状，挂在某个图层上。

use crate::color::Color;
use crate::geometry::Shape;
use crate::math::BoundingBox3;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// 全局实体ID生成器
static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// 实体唯一标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// 创建新的实体ID
    pub fn new() -> Self {
        Self(ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// 文档实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,

    pub shape: Shape,

    /// 所属图层名
    pub layer: String,

    /// 覆盖图层颜色，`None` 表示随层
    pub color: Option<Color>,

    pub visible: bool,
}

impl Entity {
    pub fn new(shape: Shape) -> Self {
        Self {
            id: EntityId::new(),
            shape,
            layer: "0".to_string(),
            color: None,
            visible: true,
        }
    }

    /// 使用指定的图层
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = layer.into();
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// 获取包围盒
    pub fn bounding_box(&self) -> BoundingBox3 {
        self.shape.bounding_box()
    }
}
