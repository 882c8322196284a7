//! 属性值与存储值之间的转换
//!
//! 保存时总是写出与区域设置无关的形式（数值保持数值，复合值使用固定文本格式）。
//! 加载时除了这些形式，还接受按当前区域设置书写的数值文本，以及带单位符号的物理量文本。

use super::store::StoredValue;
use crate::color::Color;
use crate::math::Point3;
use crate::property::{CheckState, PropertyKind, QuantityValue, Variant};
use crate::units::Unit;
use chrono::{DateTime, Utc};

/// 区域设置（只关心小数分隔符）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    language: String,
    decimal_separator: char,
}

impl Locale {
    /// 与区域无关的 "C" 区域设置
    pub fn c() -> Self {
        Self {
            language: "C".to_string(),
            decimal_separator: '.',
        }
    }

    /// 根据语言代码（如 `fr`、`de_DE`）创建
    pub fn from_language_code(code: &str) -> Self {
        let language: String = code
            .split(['_', '-', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let decimal_separator = match language.as_str() {
            "fr" | "de" | "es" | "it" | "pt" | "ru" | "nl" | "pl" | "cs" | "tr" => ',',
            _ => '.',
        };
        Self {
            language,
            decimal_separator,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    /// 解析十进制数，同时接受 `.` 和本区域的小数分隔符
    pub fn parse_decimal(&self, text: &str) -> Option<f64> {
        let text = text.trim();
        if let Ok(value) = text.parse::<f64>() {
            return Some(value);
        }
        if self.decimal_separator != '.' {
            let normalized = text.replace(self.decimal_separator, ".");
            return normalized.parse::<f64>().ok();
        }
        None
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::c()
    }
}

/// 转换失败
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot convert to {expected}: {reason}")]
pub struct ConversionError {
    pub expected: &'static str,
    pub reason: String,
}

impl ConversionError {
    fn new(kind: PropertyKind, reason: impl Into<String>) -> Self {
        Self {
            expected: kind.type_name(),
            reason: reason.into(),
        }
    }

    fn unexpected(kind: PropertyKind, value: &StoredValue) -> Self {
        Self::new(kind, format!("unexpected {} value", value.type_name()))
    }
}

/// 属性值转换策略
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValueConversion {
    double_precision: usize,
}

impl PropertyValueConversion {
    pub fn new() -> Self {
        Self {
            double_precision: 6,
        }
    }

    /// 显示浮点数时的小数位数
    pub fn double_precision(&self) -> usize {
        self.double_precision
    }

    pub fn set_double_precision(&mut self, precision: usize) {
        self.double_precision = precision;
    }

    /// 变体 → 存储值
    pub fn to_stored(&self, variant: &Variant) -> StoredValue {
        match variant {
            Variant::Bool(v) => StoredValue::Bool(*v),
            Variant::Int(v) => StoredValue::Int(*v),
            Variant::Double(v) => stored_double(*v),
            Variant::String(v) => StoredValue::String(v.clone()),
            Variant::ByteArray(v) => StoredValue::String(hex::encode(v)),
            Variant::StringList(v) => StoredValue::StringList(v.clone()),
            Variant::DateTime(v) => StoredValue::DateTime(*v),
            Variant::CheckState(v) => StoredValue::Int(v.to_i64()),
            Variant::Point(p) => StoredValue::String(format!("{};{};{}", p.x, p.y, p.z)),
            Variant::Color(c) => StoredValue::String(c.to_string()),
            Variant::Quantity(q) => stored_double(q.value),
        }
    }

    /// 存储值 → 变体，目标类型由属性决定
    pub fn from_stored(
        &self,
        kind: PropertyKind,
        value: &StoredValue,
        locale: &Locale,
    ) -> Result<Variant, ConversionError> {
        let unexpected = || ConversionError::unexpected(kind, value);

        match kind {
            PropertyKind::Bool => match value {
                StoredValue::Bool(v) => Ok(Variant::Bool(*v)),
                StoredValue::Int(0) => Ok(Variant::Bool(false)),
                StoredValue::Int(1) => Ok(Variant::Bool(true)),
                StoredValue::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(Variant::Bool(true)),
                    "false" | "0" => Ok(Variant::Bool(false)),
                    _ => Err(ConversionError::new(kind, format!("'{}' is not a boolean", text))),
                },
                _ => Err(unexpected()),
            },
            PropertyKind::Int => match value {
                StoredValue::Int(v) => Ok(Variant::Int(*v)),
                StoredValue::Double(v) if v.fract() == 0.0 => Ok(Variant::Int(*v as i64)),
                StoredValue::String(text) => text
                    .trim()
                    .parse::<i64>()
                    .map(Variant::Int)
                    .map_err(|e| ConversionError::new(kind, format!("'{}': {}", text, e))),
                _ => Err(unexpected()),
            },
            PropertyKind::Double => match value {
                StoredValue::Double(v) => Ok(Variant::Double(*v)),
                StoredValue::Int(v) => Ok(Variant::Double(*v as f64)),
                StoredValue::String(text) => locale
                    .parse_decimal(text)
                    .map(Variant::Double)
                    .ok_or_else(|| ConversionError::new(kind, format!("'{}' is not a number", text))),
                _ => Err(unexpected()),
            },
            PropertyKind::CheckState => {
                let code = match value {
                    StoredValue::Int(v) => Some(*v),
                    StoredValue::Bool(v) => Some(if *v { 2 } else { 0 }),
                    StoredValue::String(text) => text.trim().parse::<i64>().ok(),
                    _ => return Err(unexpected()),
                };
                code.and_then(CheckState::from_i64)
                    .map(Variant::CheckState)
                    .ok_or_else(|| ConversionError::new(kind, "invalid check state code"))
            }
            PropertyKind::ByteArray => match value {
                StoredValue::String(text) => hex::decode(text.trim())
                    .map(Variant::ByteArray)
                    .map_err(|e| ConversionError::new(kind, e.to_string())),
                _ => Err(unexpected()),
            },
            PropertyKind::String => match value {
                StoredValue::String(v) => Ok(Variant::String(v.clone())),
                StoredValue::Bool(v) => Ok(Variant::String(v.to_string())),
                StoredValue::Int(v) => Ok(Variant::String(v.to_string())),
                StoredValue::Double(v) => Ok(Variant::String(v.to_string())),
                _ => Err(unexpected()),
            },
            PropertyKind::StringList => match value {
                StoredValue::StringList(v) => Ok(Variant::StringList(v.clone())),
                StoredValue::String(v) => Ok(Variant::StringList(vec![v.clone()])),
                _ => Err(unexpected()),
            },
            PropertyKind::DateTime => match value {
                StoredValue::DateTime(v) => Ok(Variant::DateTime(*v)),
                StoredValue::String(text) => DateTime::parse_from_rfc3339(text.trim())
                    .map(|dt| Variant::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|e| ConversionError::new(kind, e.to_string())),
                _ => Err(unexpected()),
            },
            PropertyKind::Point => match value {
                StoredValue::String(text) => parse_point(text, locale)
                    .map(Variant::Point)
                    .ok_or_else(|| ConversionError::new(kind, format!("'{}' is not x;y;z", text))),
                _ => Err(unexpected()),
            },
            PropertyKind::Color => match value {
                StoredValue::String(text) => Color::parse(text)
                    .map(Variant::Color)
                    .ok_or_else(|| ConversionError::new(kind, format!("'{}' is not #RRGGBB[AA]", text))),
                _ => Err(unexpected()),
            },
            PropertyKind::Quantity(unit) => {
                let magnitude = match value {
                    StoredValue::Double(v) => *v,
                    StoredValue::Int(v) => *v as f64,
                    StoredValue::String(text) => match locale.parse_decimal(text) {
                        Some(v) => v,
                        None => parse_quantity(text, unit, locale)
                            .map_err(|reason| ConversionError::new(kind, reason))?,
                    },
                    _ => return Err(unexpected()),
                };
                Ok(Variant::Quantity(QuantityValue {
                    unit,
                    value: magnitude,
                }))
            }
        }
    }

    /// 格式化为显示文本
    pub fn format_value(&self, variant: &Variant, locale: &Locale) -> String {
        match variant {
            Variant::Double(v) => self.format_double(*v, locale),
            Variant::Quantity(q) => format!(
                "{} {}",
                self.format_double(q.value, locale),
                q.unit.canonical_symbol()
            ),
            Variant::Point(p) => format!(
                "({}; {}; {})",
                self.format_double(p.x, locale),
                self.format_double(p.y, locale),
                self.format_double(p.z, locale)
            ),
            other => other.to_string(),
        }
    }

    fn format_double(&self, value: f64, locale: &Locale) -> String {
        let mut text = format!("{:.*}", self.double_precision, value);
        if text.contains('.') {
            let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
            text.truncate(trimmed);
        }
        if locale.decimal_separator() != '.' {
            text = text.replace('.', &locale.decimal_separator().to_string());
        }
        text
    }
}

impl Default for PropertyValueConversion {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_point(text: &str, locale: &Locale) -> Option<Point3> {
    let coords: Vec<f64> = text
        .split(';')
        .map(|part| locale.parse_decimal(part))
        .collect::<Option<_>>()?;
    match coords.as_slice() {
        [x, y, z] => Some(Point3::new(*x, *y, *z)),
        _ => None,
    }
}

/// 解析 `"<数值> <单位符号>"`，结果换算为规范单位
/// JSON 没有无穷大和 NaN，非有限值以文本保存（`inf`、`-inf`、`NaN`）
fn stored_double(value: f64) -> StoredValue {
    if value.is_finite() {
        StoredValue::Double(value)
    } else {
        StoredValue::String(value.to_string())
    }
}

fn parse_quantity(text: &str, unit: Unit, locale: &Locale) -> Result<f64, String> {
    let text = text.trim();
    let split = text
        .char_indices()
        .find(|&(_, c)| {
            !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.') || c == locale.decimal_separator())
        })
        .map(|(index, _)| index)
        .unwrap_or(text.len());
    let (number, symbol) = text.split_at(split);

    let magnitude = locale
        .parse_decimal(number)
        .ok_or_else(|| format!("'{}' has no numeric value", text))?;
    let factor = unit
        .factor_to_canonical(symbol)
        .ok_or_else(|| format!("'{}' is not a {} unit", symbol.trim(), unit))?;
    Ok(magnitude * factor)
}
