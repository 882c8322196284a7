//! 图层管理
//!
//! 导入的形状按来源图层分组。

use crate::color::Color;
use serde::{Deserialize, Serialize};

/// 图层定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// 图层名称
    pub name: String,

    /// 图层颜色
    pub color: Color,

    /// 是否可见
    pub visible: bool,

    /// 描述
    pub description: String,
}

impl Layer {
    /// 创建新图层
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: Color::WHITE,
            visible: true,
            description: String::new(),
        }
    }

    /// 默认图层（0层）
    pub fn default_layer() -> Self {
        Self {
            description: "Default layer".to_string(),
            ..Self::new("0")
        }
    }

    /// 设置颜色
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// 图层管理器，保持插入顺序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerManager {
    layers: Vec<Layer>,
}

impl LayerManager {
    /// 创建只含0层的管理器
    pub fn new() -> Self {
        Self {
            layers: vec![Layer::default_layer()],
        }
    }

    /// 添加新图层，同名图层已存在时失败
    pub fn add_layer(&mut self, layer: Layer) -> Result<(), LayerError> {
        if self.contains(&layer.name) {
            return Err(LayerError::LayerAlreadyExists(layer.name));
        }
        self.layers.push(layer);
        Ok(())
    }

    /// 获取图层，不存在时创建
    pub fn ensure_layer(&mut self, name: &str) -> &mut Layer {
        let index = match self.layers.iter().position(|l| l.name == name) {
            Some(index) => index,
            None => {
                self.layers.push(Layer::new(name));
                self.layers.len() - 1
            }
        };
        &mut self.layers[index]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.iter().any(|l| l.name == name)
    }

    /// 获取图层（按名称）
    pub fn get_layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// 获取所有图层
    pub fn all_layers(&self) -> &[Layer] {
        &self.layers
    }

    /// 图层数量
    pub fn count(&self) -> usize {
        self.layers.len()
    }
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 图层操作错误
#[derive(Debug, Clone, thiserror::Error)]
pub enum LayerError {
    #[error("Layer already exists: {0}")]
    LayerAlreadyExists(String),
}
