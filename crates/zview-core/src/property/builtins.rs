//! 内置属性类型
//!
//! - [`GenericProperty<T>`]: 单值属性，带声明时的默认值
//! - [`GenericScalarProperty<T>`]: 数值属性，可选范围约束
//! - [`PropertyQuantity<U>`]: 物理量属性，单位类别编译期固定

use super::{Property, PropertyBase, PropertyError, PropertyKind, Variant};
use super::variant::{CheckState, QuantityValue};
use crate::color::Color;
use crate::math::Point3;
use crate::units::{
    AngleUnitTag, AreaUnitTag, LengthUnitTag, MassUnitTag, Quantity, QuantityUnit, TimeUnitTag,
    Unit, VelocityUnitTag, VolumeUnitTag,
};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;

/// 可存入属性的值类型
///
/// 装箱（`to_variant`）总是成功；拆箱只接受相同或可无损转换的变体。
pub trait PropertyValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    fn kind() -> PropertyKind;

    fn to_variant(&self) -> Variant;

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError>;
}

fn incompatible<T: PropertyValue>(found: &Variant) -> PropertyError {
    PropertyError::IncompatibleType {
        expected: T::kind().type_name(),
        found: found.type_name(),
    }
}

impl PropertyValue for bool {
    fn kind() -> PropertyKind {
        PropertyKind::Bool
    }

    fn to_variant(&self) -> Variant {
        Variant::Bool(*self)
    }

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        match variant {
            Variant::Bool(v) => Ok(*v),
            other => Err(incompatible::<Self>(other)),
        }
    }
}

impl PropertyValue for i32 {
    fn kind() -> PropertyKind {
        PropertyKind::Int
    }

    fn to_variant(&self) -> Variant {
        Variant::Int(i64::from(*self))
    }

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        variant
            .to_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| incompatible::<Self>(variant))
    }
}

impl PropertyValue for f64 {
    fn kind() -> PropertyKind {
        PropertyKind::Double
    }

    fn to_variant(&self) -> Variant {
        Variant::Double(*self)
    }

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        variant.to_f64().ok_or_else(|| incompatible::<Self>(variant))
    }
}

impl PropertyValue for String {
    fn kind() -> PropertyKind {
        PropertyKind::String
    }

    fn to_variant(&self) -> Variant {
        Variant::String(self.clone())
    }

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        match variant {
            Variant::String(v) => Ok(v.clone()),
            Variant::ByteArray(bytes) => {
                String::from_utf8(bytes.clone()).map_err(|_| incompatible::<Self>(variant))
            }
            other => Err(incompatible::<Self>(other)),
        }
    }
}

impl PropertyValue for Vec<u8> {
    fn kind() -> PropertyKind {
        PropertyKind::ByteArray
    }

    fn to_variant(&self) -> Variant {
        Variant::ByteArray(self.clone())
    }

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        match variant {
            Variant::ByteArray(v) => Ok(v.clone()),
            Variant::String(text) => Ok(text.as_bytes().to_vec()),
            other => Err(incompatible::<Self>(other)),
        }
    }
}

impl PropertyValue for Vec<String> {
    fn kind() -> PropertyKind {
        PropertyKind::StringList
    }

    fn to_variant(&self) -> Variant {
        Variant::StringList(self.clone())
    }

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        match variant {
            Variant::StringList(v) => Ok(v.clone()),
            other => Err(incompatible::<Self>(other)),
        }
    }
}

impl PropertyValue for DateTime<Utc> {
    fn kind() -> PropertyKind {
        PropertyKind::DateTime
    }

    fn to_variant(&self) -> Variant {
        Variant::DateTime(*self)
    }

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        match variant {
            Variant::DateTime(v) => Ok(*v),
            other => Err(incompatible::<Self>(other)),
        }
    }
}

impl PropertyValue for CheckState {
    fn kind() -> PropertyKind {
        PropertyKind::CheckState
    }

    fn to_variant(&self) -> Variant {
        Variant::CheckState(*self)
    }

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        match variant {
            Variant::CheckState(v) => Ok(*v),
            Variant::Bool(true) => Ok(CheckState::Checked),
            Variant::Bool(false) => Ok(CheckState::Unchecked),
            Variant::Int(code) => {
                CheckState::from_i64(*code).ok_or_else(|| incompatible::<Self>(variant))
            }
            other => Err(incompatible::<Self>(other)),
        }
    }
}

impl PropertyValue for Point3 {
    fn kind() -> PropertyKind {
        PropertyKind::Point
    }

    fn to_variant(&self) -> Variant {
        Variant::Point(*self)
    }

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        match variant {
            Variant::Point(v) => Ok(*v),
            other => Err(incompatible::<Self>(other)),
        }
    }
}

impl PropertyValue for Color {
    fn kind() -> PropertyKind {
        PropertyKind::Color
    }

    fn to_variant(&self) -> Variant {
        Variant::Color(*self)
    }

    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        match variant {
            Variant::Color(v) => Ok(*v),
            other => Err(incompatible::<Self>(other)),
        }
    }
}

impl<U: QuantityUnit> PropertyValue for Quantity<U> {
    fn kind() -> PropertyKind {
        PropertyKind::Quantity(U::UNIT)
    }

    fn to_variant(&self) -> Variant {
        Variant::Quantity(QuantityValue {
            unit: U::UNIT,
            value: self.value(),
        })
    }

    /// 纯数值视为已经以本属性的单位表示
    fn from_variant(variant: &Variant) -> Result<Self, PropertyError> {
        match variant {
            Variant::Quantity(q) if q.unit == U::UNIT => Ok(Self::new(q.value)),
            Variant::Double(_) | Variant::Int(_) => variant
                .to_f64()
                .map(Self::new)
                .ok_or_else(|| incompatible::<Self>(variant)),
            other => Err(incompatible::<Self>(other)),
        }
    }
}

/// 支持范围约束的数值类型
pub trait Scalar: PropertyValue + Copy + PartialOrd + fmt::Display {
    const LOWEST: Self;
    const HIGHEST: Self;
    const UNIT_STEP: Self;
}

impl Scalar for i32 {
    const LOWEST: Self = i32::MIN;
    const HIGHEST: Self = i32::MAX;
    const UNIT_STEP: Self = 1;
}

impl Scalar for f64 {
    const LOWEST: Self = f64::MIN;
    const HIGHEST: Self = f64::MAX;
    const UNIT_STEP: Self = 1.0;
}

/// 数值范围约束
///
/// 只在属性组的写入流程中生效，修改边界本身不会重新校验当前值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarConstraints<T: Scalar> {
    minimum: T,
    maximum: T,
    single_step: T,
    enabled: bool,
}

impl<T: Scalar> ScalarConstraints<T> {
    /// 创建已启用的约束
    pub fn new(minimum: T, maximum: T, single_step: T) -> Self {
        Self {
            minimum,
            maximum,
            single_step,
            enabled: true,
        }
    }

    pub fn minimum(&self) -> T {
        self.minimum
    }

    pub fn maximum(&self) -> T {
        self.maximum
    }

    /// 界面步进提示
    pub fn single_step(&self) -> T {
        self.single_step
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    pub fn set_single_step(&mut self, step: T) {
        self.single_step = step;
    }

    /// 同时更新上下界
    pub fn set_range(&mut self, minimum: T, maximum: T) -> Result<(), PropertyError> {
        if !(minimum <= maximum) {
            return Err(PropertyError::Invalid(format!(
                "minimum {} is greater than maximum {}",
                minimum, maximum
            )));
        }
        self.minimum = minimum;
        self.maximum = maximum;
        Ok(())
    }

    /// 检查值是否满足约束（NaN 视为越界）
    pub fn check(&self, value: T) -> Result<(), PropertyError> {
        if !self.enabled {
            return Ok(());
        }
        // 用否定形式比较，NaN 不满足任何比较
        if !(value >= self.minimum && value <= self.maximum) {
            return Err(PropertyError::OutOfRange {
                value: value.to_string(),
                minimum: self.minimum.to_string(),
                maximum: self.maximum.to_string(),
            });
        }
        Ok(())
    }
}

impl<T: Scalar> Default for ScalarConstraints<T> {
    fn default() -> Self {
        Self {
            minimum: T::LOWEST,
            maximum: T::HIGHEST,
            single_step: T::UNIT_STEP,
            enabled: false,
        }
    }
}

/// 带类型值的属性，属性组据此实现类型化的 `set_value`
pub trait ValueProperty: Property {
    type Value: PropertyValue;

    fn value(&self) -> &Self::Value;

    /// 原始赋值，返回旧值
    fn replace_value(&mut self, value: Self::Value) -> Self::Value;
}

/// 带约束的属性
pub trait Constrained: Property {
    type Bound: Scalar;

    fn constraints(&self) -> &ScalarConstraints<Self::Bound>;

    fn constraints_mut(&mut self) -> &mut ScalarConstraints<Self::Bound>;
}

macro_rules! property_builders {
    () => {
        /// 设置界面标签
        pub fn with_label(mut self, label: impl Into<String>) -> Self {
            self.base_mut().set_label(label);
            self
        }

        pub fn with_description(mut self, text: impl Into<String>) -> Self {
            self.base_mut().set_description(text);
            self
        }

        pub fn with_user_read_only(mut self, on: bool) -> Self {
            self.base_mut().set_user_read_only(on);
            self
        }

        pub fn with_user_visible(mut self, on: bool) -> Self {
            self.base_mut().set_user_visible(on);
            self
        }
    };
}

/// 单值属性
#[derive(Debug, Clone)]
pub struct GenericProperty<T: PropertyValue> {
    base: PropertyBase,
    value: T,
    default_value: T,
}

impl<T: PropertyValue> GenericProperty<T> {
    /// 创建属性，初始值同时作为默认值
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            base: PropertyBase::new(name),
            default_value: value.clone(),
            value,
        }
    }

    property_builders!();

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn default_value(&self) -> &T {
        &self.default_value
    }

    /// 未加入属性组时直接写入
    ///
    /// 加入属性组后，属性只能通过 [`PropertyGroup`](super::PropertyGroup) 写入。
    pub fn set_value(&mut self, value: T) {
        self.value = value;
    }
}

impl<T: PropertyValue> Property for GenericProperty<T> {
    fn base(&self) -> &PropertyBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PropertyBase {
        &mut self.base
    }

    fn kind(&self) -> PropertyKind {
        T::kind()
    }

    fn value_as_variant(&self) -> Variant {
        self.value.to_variant()
    }

    fn default_value_as_variant(&self) -> Variant {
        self.default_value.to_variant()
    }

    fn assign_variant(&mut self, variant: &Variant) -> Result<(), PropertyError> {
        self.value = T::from_variant(variant)?;
        Ok(())
    }

    fn restore_default_value(&mut self) {
        self.value = self.default_value.clone();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T: PropertyValue> ValueProperty for GenericProperty<T> {
    type Value = T;

    fn value(&self) -> &T {
        &self.value
    }

    fn replace_value(&mut self, value: T) -> T {
        std::mem::replace(&mut self.value, value)
    }
}

/// 数值属性
#[derive(Debug, Clone)]
pub struct GenericScalarProperty<T: Scalar> {
    inner: GenericProperty<T>,
    constraints: ScalarConstraints<T>,
}

impl<T: Scalar> GenericScalarProperty<T> {
    /// 创建不带约束的数值属性
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            inner: GenericProperty::new(name, value),
            constraints: ScalarConstraints::default(),
        }
    }

    /// 启用范围约束
    pub fn with_constraints(mut self, minimum: T, maximum: T, single_step: T) -> Self {
        self.constraints = ScalarConstraints::new(minimum, maximum, single_step);
        self
    }

    property_builders!();

    pub fn value(&self) -> &T {
        self.inner.value()
    }

    pub fn default_value(&self) -> &T {
        self.inner.default_value()
    }

    pub fn constraints(&self) -> &ScalarConstraints<T> {
        &self.constraints
    }

    pub fn minimum(&self) -> T {
        self.constraints.minimum()
    }

    pub fn maximum(&self) -> T {
        self.constraints.maximum()
    }

    pub fn single_step(&self) -> T {
        self.constraints.single_step()
    }

    /// 未加入属性组时直接写入，不检查约束
    pub fn set_value(&mut self, value: T) {
        self.inner.set_value(value);
    }
}

impl<T: Scalar> Property for GenericScalarProperty<T> {
    fn base(&self) -> &PropertyBase {
        self.inner.base()
    }

    fn base_mut(&mut self) -> &mut PropertyBase {
        self.inner.base_mut()
    }

    fn kind(&self) -> PropertyKind {
        T::kind()
    }

    fn value_as_variant(&self) -> Variant {
        self.inner.value_as_variant()
    }

    fn default_value_as_variant(&self) -> Variant {
        self.inner.default_value_as_variant()
    }

    fn assign_variant(&mut self, variant: &Variant) -> Result<(), PropertyError> {
        self.inner.assign_variant(variant)
    }

    fn restore_default_value(&mut self) {
        self.inner.restore_default_value();
    }

    fn check_constraints(&self) -> Result<(), PropertyError> {
        self.constraints.check(*self.inner.value())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T: Scalar> ValueProperty for GenericScalarProperty<T> {
    type Value = T;

    fn value(&self) -> &T {
        self.inner.value()
    }

    fn replace_value(&mut self, value: T) -> T {
        self.inner.replace_value(value)
    }
}

impl<T: Scalar> Constrained for GenericScalarProperty<T> {
    type Bound = T;

    fn constraints(&self) -> &ScalarConstraints<T> {
        &self.constraints
    }

    fn constraints_mut(&mut self) -> &mut ScalarConstraints<T> {
        &mut self.constraints
    }
}

/// 物理量属性，数值以规范单位存储
#[derive(Debug, Clone)]
pub struct PropertyQuantity<U: QuantityUnit> {
    inner: GenericProperty<Quantity<U>>,
    constraints: ScalarConstraints<f64>,
}

impl<U: QuantityUnit> PropertyQuantity<U> {
    /// `value` 以规范单位表示
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            inner: GenericProperty::new(name, Quantity::new(value)),
            constraints: ScalarConstraints::default(),
        }
    }

    /// 启用范围约束（规范单位）
    pub fn with_constraints(mut self, minimum: f64, maximum: f64, single_step: f64) -> Self {
        self.constraints = ScalarConstraints::new(minimum, maximum, single_step);
        self
    }

    property_builders!();

    pub fn unit(&self) -> Unit {
        U::UNIT
    }

    pub fn quantity(&self) -> Quantity<U> {
        *self.inner.value()
    }

    pub fn quantity_value(&self) -> f64 {
        self.inner.value().value()
    }

    pub fn constraints(&self) -> &ScalarConstraints<f64> {
        &self.constraints
    }

    /// 未加入属性组时直接写入
    pub fn set_quantity(&mut self, quantity: Quantity<U>) {
        self.inner.set_value(quantity);
    }

    /// 未加入属性组时直接写入，数值视为本属性的单位
    pub fn set_quantity_value(&mut self, value: f64) {
        self.inner.set_value(Quantity::new(value));
    }
}

impl<U: QuantityUnit> Property for PropertyQuantity<U> {
    fn base(&self) -> &PropertyBase {
        self.inner.base()
    }

    fn base_mut(&mut self) -> &mut PropertyBase {
        self.inner.base_mut()
    }

    fn kind(&self) -> PropertyKind {
        PropertyKind::Quantity(U::UNIT)
    }

    fn value_as_variant(&self) -> Variant {
        self.inner.value_as_variant()
    }

    fn default_value_as_variant(&self) -> Variant {
        self.inner.default_value_as_variant()
    }

    fn assign_variant(&mut self, variant: &Variant) -> Result<(), PropertyError> {
        self.inner.assign_variant(variant)
    }

    fn restore_default_value(&mut self) {
        self.inner.restore_default_value();
    }

    fn check_constraints(&self) -> Result<(), PropertyError> {
        self.constraints.check(self.quantity_value())
    }

    fn quantity_unit(&self) -> Option<Unit> {
        Some(U::UNIT)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<U: QuantityUnit> ValueProperty for PropertyQuantity<U> {
    type Value = Quantity<U>;

    fn value(&self) -> &Quantity<U> {
        self.inner.value()
    }

    fn replace_value(&mut self, value: Quantity<U>) -> Quantity<U> {
        self.inner.replace_value(value)
    }
}

impl<U: QuantityUnit> Constrained for PropertyQuantity<U> {
    type Bound = f64;

    fn constraints(&self) -> &ScalarConstraints<f64> {
        &self.constraints
    }

    fn constraints_mut(&mut self) -> &mut ScalarConstraints<f64> {
        &mut self.constraints
    }
}

pub type PropertyBool = GenericProperty<bool>;
pub type PropertyInt = GenericScalarProperty<i32>;
pub type PropertyDouble = GenericScalarProperty<f64>;
pub type PropertyCheckState = GenericProperty<CheckState>;
pub type PropertyByteArray = GenericProperty<Vec<u8>>;
pub type PropertyString = GenericProperty<String>;
pub type PropertyStringList = GenericProperty<Vec<String>>;
pub type PropertyDateTime = GenericProperty<DateTime<Utc>>;
pub type PropertyPoint = GenericProperty<Point3>;
pub type PropertyColor = GenericProperty<Color>;

pub type PropertyLength = PropertyQuantity<LengthUnitTag>;
pub type PropertyArea = PropertyQuantity<AreaUnitTag>;
pub type PropertyVolume = PropertyQuantity<VolumeUnitTag>;
pub type PropertyMass = PropertyQuantity<MassUnitTag>;
pub type PropertyTime = PropertyQuantity<TimeUnitTag>;
pub type PropertyAngle = PropertyQuantity<AngleUnitTag>;
pub type PropertyVelocity = PropertyQuantity<VelocityUnitTag>;
