//! 类型擦除的变体值
//!
//! 用于在异构属性、界面绑定和持久化之间统一传递值。

use crate::color::Color;
use crate::math::Point3;
use crate::units::Unit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 三态勾选状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CheckState {
    #[default]
    Unchecked,
    PartiallyChecked,
    Checked,
}

impl CheckState {
    pub fn to_i64(self) -> i64 {
        match self {
            CheckState::Unchecked => 0,
            CheckState::PartiallyChecked => 1,
            CheckState::Checked => 2,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(CheckState::Unchecked),
            1 => Some(CheckState::PartiallyChecked),
            2 => Some(CheckState::Checked),
            _ => None,
        }
    }
}

/// 带单位标签的数值（规范单位）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantityValue {
    pub unit: Unit,
    pub value: f64,
}

/// 变体值
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    ByteArray(Vec<u8>),
    StringList(Vec<String>),
    DateTime(DateTime<Utc>),
    CheckState(CheckState),
    Point(Point3),
    Color(Color),
    Quantity(QuantityValue),
}

impl Variant {
    /// 变体类型名称，用于错误信息
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Bool(_) => "bool",
            Variant::Int(_) => "int",
            Variant::Double(_) => "double",
            Variant::String(_) => "string",
            Variant::ByteArray(_) => "byte array",
            Variant::StringList(_) => "string list",
            Variant::DateTime(_) => "date-time",
            Variant::CheckState(_) => "check state",
            Variant::Point(_) => "point",
            Variant::Color(_) => "color",
            Variant::Quantity(q) => match q.unit {
                Unit::Length => "length quantity",
                Unit::Area => "area quantity",
                Unit::Volume => "volume quantity",
                Unit::Mass => "mass quantity",
                Unit::Time => "time quantity",
                Unit::Angle => "angle quantity",
                Unit::Velocity => "velocity quantity",
            },
        }
    }

    /// 精确转换为整数（浮点数必须无小数部分）
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Variant::Int(v) => Some(*v),
            Variant::Double(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Some(*v as i64),
            _ => None,
        }
    }

    /// 转换为浮点数（整数可无损提升）
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Variant::Double(v) => Some(*v),
            Variant::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Bool(v) => write!(f, "{}", v),
            Variant::Int(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::String(v) => f.write_str(v),
            Variant::ByteArray(v) => f.write_str(&hex::encode(v)),
            Variant::StringList(v) => f.write_str(&v.join(", ")),
            Variant::DateTime(v) => f.write_str(&v.to_rfc3339()),
            Variant::CheckState(v) => write!(f, "{:?}", v),
            Variant::Point(p) => write!(f, "({}, {}, {})", p.x, p.y, p.z),
            Variant::Color(c) => write!(f, "{}", c),
            Variant::Quantity(q) => write!(f, "{}{}", q.value, q.unit.canonical_symbol()),
        }
    }
}
