//! 颜色定义
//!
//! 图层颜色和颜色类型属性共用的RGBA颜色。

use serde::{Deserialize, Serialize};
use std::fmt;

/// RGBA颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// 解析 `#RRGGBB` 或 `#RRGGBBAA` 形式的文本
    pub fn parse(text: &str) -> Option<Self> {
        let digits = text.trim().strip_prefix('#')?;
        let bytes = hex::decode(digits).ok()?;
        match bytes.as_slice() {
            [r, g, b] => Some(Self::new(*r, *g, *b)),
            [r, g, b, a] => Some(Self::with_alpha(*r, *g, *b, *a)),
            _ => None,
        }
    }

    // 预定义颜色（AutoCAD ACI颜色兼容）
    pub const RED: Color = Color::new(255, 0, 0);
    pub const YELLOW: Color = Color::new(255, 255, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const CYAN: Color = Color::new(0, 255, 255);
    pub const BLUE: Color = Color::new(0, 0, 255);
    pub const MAGENTA: Color = Color::new(255, 0, 255);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const GRAY: Color = Color::new(128, 128, 128);
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// 输出 `#RRGGBBAA`
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", hex::encode_upper([self.r, self.g, self.b, self.a]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_text() {
        let color = Color::with_alpha(0x12, 0xAB, 0x00, 0x80);
        assert_eq!(color.to_string(), "#12AB0080");
        assert_eq!(Color::parse("#12AB0080"), Some(color));
        assert_eq!(Color::parse("#FF0000"), Some(Color::RED));
        assert_eq!(Color::parse("FF0000"), None);
        assert_eq!(Color::parse("#FF00"), None);
    }
}
