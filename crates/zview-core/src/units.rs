//! 单位系统
//!
//! 物理量类别（长度、面积、体积、质量、时间、角度、速度）及其规范单位。
//!
//! 内部统一使用规范单位存储：长度毫米、面积平方毫米、体积立方毫米、
//! 质量千克、时间秒、角度弧度、速度毫米每秒。只在解析和显示时转换。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// 物理量类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Length,
    Area,
    Volume,
    Mass,
    Time,
    Angle,
    Velocity,
}

impl Unit {
    /// 规范单位符号
    pub fn canonical_symbol(&self) -> &'static str {
        match self {
            Unit::Length => "mm",
            Unit::Area => "mm²",
            Unit::Volume => "mm³",
            Unit::Mass => "kg",
            Unit::Time => "s",
            Unit::Angle => "rad",
            Unit::Velocity => "mm/s",
        }
    }

    /// 类别名称（同时用作持久化时的单位标签）
    pub fn name(&self) -> &'static str {
        match self {
            Unit::Length => "length",
            Unit::Area => "area",
            Unit::Volume => "volume",
            Unit::Mass => "mass",
            Unit::Time => "time",
            Unit::Angle => "angle",
            Unit::Velocity => "velocity",
        }
    }

    /// 获取某个单位符号到规范单位的换算因子
    ///
    /// 符号不属于本类别时返回 `None`。空符号视为规范单位。
    pub fn factor_to_canonical(&self, symbol: &str) -> Option<f64> {
        let symbol = symbol.trim();
        if symbol.is_empty() || symbol == self.canonical_symbol() {
            return Some(1.0);
        }

        match self {
            Unit::Length => LengthUnit::from_str(symbol).map(|u| u.to_mm_factor()),
            Unit::Area => {
                let base = symbol.trim_end_matches(['²', '2']);
                (base.len() < symbol.len())
                    .then(|| LengthUnit::from_str(base))
                    .flatten()
                    .map(|u| u.to_mm_factor().powi(2))
            }
            Unit::Volume => {
                let base = symbol.trim_end_matches(['³', '3']);
                (base.len() < symbol.len())
                    .then(|| LengthUnit::from_str(base))
                    .flatten()
                    .map(|u| u.to_mm_factor().powi(3))
            }
            Unit::Mass => match symbol {
                "g" => Some(0.001),
                "mg" => Some(1e-6),
                "t" => Some(1000.0),
                "lb" => Some(0.453_592_37),
                "oz" => Some(0.028_349_523_125),
                _ => None,
            },
            Unit::Time => match symbol {
                "ms" => Some(0.001),
                "min" => Some(60.0),
                "h" => Some(3600.0),
                _ => None,
            },
            Unit::Angle => AngleUnit::from_symbol(symbol).map(|u| u.to_radians(1.0)),
            Unit::Velocity => {
                let (length, time) = symbol.split_once('/')?;
                let length = LengthUnit::from_str(length)?.to_mm_factor();
                let time = Unit::Time.factor_to_canonical(time)?;
                Some(length / time)
            }
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 编译期确定的物理量类别
pub trait QuantityUnit: Copy + Send + Sync + fmt::Debug + 'static {
    const UNIT: Unit;
}

macro_rules! quantity_unit {
    ($($(#[$doc:meta])* $name:ident => $unit:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct $name;

            impl QuantityUnit for $name {
                const UNIT: Unit = Unit::$unit;
            }
        )*
    };
}

quantity_unit! {
    /// 长度（毫米）
    LengthUnitTag => Length,
    /// 面积（平方毫米）
    AreaUnitTag => Area,
    /// 体积（立方毫米）
    VolumeUnitTag => Volume,
    /// 质量（千克）
    MassUnitTag => Mass,
    /// 时间（秒）
    TimeUnitTag => Time,
    /// 角度（弧度）
    AngleUnitTag => Angle,
    /// 速度（毫米每秒）
    VelocityUnitTag => Velocity,
}

/// 带单位类别的物理量，数值以规范单位表示
#[derive(Debug, Clone, Copy)]
pub struct Quantity<U: QuantityUnit> {
    value: f64,
    _unit: PhantomData<U>,
}

// 只比较数值，类别已由类型参数保证一致
impl<U: QuantityUnit> PartialEq for Quantity<U> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<U: QuantityUnit> PartialOrd for Quantity<U> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl<U: QuantityUnit> Quantity<U> {
    pub const fn new(value: f64) -> Self {
        Self {
            value,
            _unit: PhantomData,
        }
    }

    /// 规范单位下的数值
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        U::UNIT
    }
}

impl<U: QuantityUnit> Default for Quantity<U> {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl<U: QuantityUnit> fmt::Display for Quantity<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, U::UNIT.canonical_symbol())
    }
}

pub type Length = Quantity<LengthUnitTag>;
pub type Area = Quantity<AreaUnitTag>;
pub type Volume = Quantity<VolumeUnitTag>;
pub type Mass = Quantity<MassUnitTag>;
pub type Time = Quantity<TimeUnitTag>;
pub type Angle = Quantity<AngleUnitTag>;
pub type Velocity = Quantity<VelocityUnitTag>;

/// 长度单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LengthUnit {
    /// 英寸
    Inch,
    /// 英尺 (12 英寸)
    Foot,
    /// 英里 (1760 码)
    Mile,
    /// 毫米 (默认)
    #[default]
    Millimeter,
    /// 厘米
    Centimeter,
    /// 米
    Meter,
    /// 千米
    Kilometer,
    /// 密尔 (0.001 英寸)
    Mil,
    /// 码 (3 英尺)
    Yard,
    /// 纳米
    Nanometer,
    /// 微米
    Micron,
}

impl LengthUnit {
    /// 获取单位到毫米的转换因子
    pub fn to_mm_factor(&self) -> f64 {
        match self {
            LengthUnit::Inch => 25.4,
            LengthUnit::Foot => 304.8,
            LengthUnit::Mile => 1_609_344.0,
            LengthUnit::Millimeter => 1.0,
            LengthUnit::Centimeter => 10.0,
            LengthUnit::Meter => 1000.0,
            LengthUnit::Kilometer => 1_000_000.0,
            LengthUnit::Mil => 0.0254,
            LengthUnit::Yard => 914.4,
            LengthUnit::Nanometer => 1e-6,
            LengthUnit::Micron => 0.001,
        }
    }

    /// 从字符串解析单位
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" => Some(LengthUnit::Millimeter),
            "cm" | "centimeter" | "centimeters" => Some(LengthUnit::Centimeter),
            "m" | "meter" | "meters" => Some(LengthUnit::Meter),
            "km" | "kilometer" | "kilometers" => Some(LengthUnit::Kilometer),
            "in" | "inch" | "inches" | "\"" => Some(LengthUnit::Inch),
            "ft" | "foot" | "feet" | "'" => Some(LengthUnit::Foot),
            "mi" | "mile" | "miles" => Some(LengthUnit::Mile),
            "yd" | "yard" | "yards" => Some(LengthUnit::Yard),
            "mil" => Some(LengthUnit::Mil),
            "µm" | "um" | "micron" => Some(LengthUnit::Micron),
            "nm" | "nanometer" => Some(LengthUnit::Nanometer),
            _ => None,
        }
    }
}

/// 角度单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AngleUnit {
    /// 度
    #[default]
    Degrees,
    /// 弧度
    Radians,
    /// 百分度
    Gradians,
}

impl AngleUnit {
    /// 转换为弧度
    pub fn to_radians(&self, value: f64) -> f64 {
        match self {
            AngleUnit::Degrees => value.to_radians(),
            AngleUnit::Radians => value,
            AngleUnit::Gradians => value * std::f64::consts::PI / 200.0,
        }
    }

    /// 从符号解析
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "°" | "deg" => Some(AngleUnit::Degrees),
            "rad" => Some(AngleUnit::Radians),
            "gon" | "grad" => Some(AngleUnit::Gradians),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_factors() {
        assert!((LengthUnit::Inch.to_mm_factor() - 25.4).abs() < 0.001);
        assert_eq!(LengthUnit::from_str("Meters"), Some(LengthUnit::Meter));
        assert!((AngleUnit::Degrees.to_radians(180.0) - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_factor_to_canonical() {
        assert_eq!(Unit::Length.factor_to_canonical("cm"), Some(10.0));
        assert_eq!(Unit::Length.factor_to_canonical(""), Some(1.0));
        assert_eq!(Unit::Area.factor_to_canonical("cm²"), Some(100.0));
        assert_eq!(Unit::Volume.factor_to_canonical("m3"), Some(1e9));
        assert_eq!(Unit::Mass.factor_to_canonical("g"), Some(0.001));
        assert_eq!(Unit::Velocity.factor_to_canonical("m/s"), Some(1000.0));
        assert!((Unit::Angle.factor_to_canonical("°").unwrap() - 1f64.to_radians()).abs() < 1e-12);
        // 类别不匹配
        assert_eq!(Unit::Mass.factor_to_canonical("mm"), None);
        assert_eq!(Unit::Area.factor_to_canonical("mm"), None);
    }

    #[test]
    fn test_quantity_unit_tag() {
        let length = Length::new(12.5);
        assert_eq!(length.unit(), Unit::Length);
        assert_eq!(length.to_string(), "12.5mm");
        assert_eq!(Angle::default().value(), 0.0);
    }

    #[test]
    fn test_quantity_comparison() {
        assert_eq!(Length::new(3.0), Length::new(3.0));
        assert!(Length::new(1.0) < Length::new(2.5));
        assert!(Angle::new(f64::NAN).partial_cmp(&Angle::new(0.0)).is_none());
    }
}
