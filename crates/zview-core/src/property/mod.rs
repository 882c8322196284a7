//! 类型化属性框架
//!
//! 一个属性是带名称、可观察、可校验的单值单元。具体的值存储由
//! [`GenericProperty`] 等内置类型提供，本模块只定义所有属性共享的部分：
//!
//! - [`PropertyBase`]: 名称、描述、只读/可见/启用标志、所属属性组
//! - [`Property`]: 固定的能力接口（类型标签、变体读写、约束检查、恢复默认值）
//! - [`PropertyGroup`]: 有序属性容器，所有属性写入都经过它的写入流程
//!
//! # 示例
//!
//! ```rust
//! use zview_core::property::{PropertyDouble, PropertyGroup};
//!
//! let mut group = PropertyGroup::new();
//! let scaling = group
//!     .add(PropertyDouble::new("scaling", 50.0).with_constraints(0.0, 100.0, 1.0))
//!     .unwrap();
//!
//! assert!(group.set_value(scaling, 150.0).is_err());
//! assert_eq!(*group[scaling].value(), 50.0);
//! assert!(group.set_value(scaling, 75.0).is_ok());
//! ```

mod builtins;
mod group;
mod variant;

pub use builtins::*;
pub use group::*;
pub use variant::*;

use crate::units::Unit;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// 全局属性组ID生成器
static GROUP_COUNTER: AtomicU64 = AtomicU64::new(1);

/// 属性组唯一标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(u64);

impl GroupId {
    /// 分配新的属性组ID
    pub fn new() -> Self {
        Self(GROUP_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

/// 属性在所属组内的位置（声明顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub(crate) usize);

impl PropertyId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// 对某个组内属性的非拥有引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    pub group: GroupId,
    pub property: PropertyId,
}

/// 带具体类型的属性引用，由 [`PropertyGroup::add`] 返回
pub struct PropertyKey<P> {
    group: GroupId,
    id: PropertyId,
    _marker: PhantomData<fn() -> P>,
}

impl<P> PropertyKey<P> {
    pub(crate) fn new(group: GroupId, id: PropertyId) -> Self {
        Self {
            group,
            id,
            _marker: PhantomData,
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn id(&self) -> PropertyId {
        self.id
    }
}

impl<P> Clone for PropertyKey<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for PropertyKey<P> {}

impl<P> PartialEq for PropertyKey<P> {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group && self.id == other.id
    }
}

impl<P> Eq for PropertyKey<P> {}

impl<P> fmt::Debug for PropertyKey<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyKey")
            .field("group", &self.group)
            .field("id", &self.id)
            .finish()
    }
}

impl<P> From<PropertyKey<P>> for PropertyRef {
    fn from(key: PropertyKey<P>) -> Self {
        PropertyRef {
            group: key.group,
            property: key.id,
        }
    }
}

/// 属性类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Bool,
    Int,
    Double,
    CheckState,
    ByteArray,
    String,
    StringList,
    DateTime,
    Point,
    Color,
    Quantity(Unit),
}

impl PropertyKind {
    /// 稳定的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyKind::Bool => "Bool",
            PropertyKind::Int => "Int",
            PropertyKind::Double => "Double",
            PropertyKind::CheckState => "CheckState",
            PropertyKind::ByteArray => "ByteArray",
            PropertyKind::String => "String",
            PropertyKind::StringList => "StringList",
            PropertyKind::DateTime => "DateTime",
            PropertyKind::Point => "Point",
            PropertyKind::Color => "Color",
            PropertyKind::Quantity(Unit::Length) => "Length",
            PropertyKind::Quantity(Unit::Area) => "Area",
            PropertyKind::Quantity(Unit::Volume) => "Volume",
            PropertyKind::Quantity(Unit::Mass) => "Mass",
            PropertyKind::Quantity(Unit::Time) => "Time",
            PropertyKind::Quantity(Unit::Angle) => "Angle",
            PropertyKind::Quantity(Unit::Velocity) => "Velocity",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// 属性操作错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyError {
    #[error("Value {value} is out of range [{minimum}, {maximum}]")]
    OutOfRange {
        value: String,
        minimum: String,
        maximum: String,
    },

    #[error("Invalid value: {0}")]
    Invalid(String),

    #[error("Incompatible type: expected {expected}, found {found}")]
    IncompatibleType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Property not found in group")]
    NotFound,

    #[error("Duplicate property name: {0}")]
    DuplicateName(String),
}

impl PropertyError {
    /// 是否属于校验失败（写入已被回滚）
    pub fn is_validation(&self) -> bool {
        matches!(self, PropertyError::OutOfRange { .. } | PropertyError::Invalid(_))
    }
}

/// 所有属性共有的元数据
#[derive(Debug, Clone)]
pub struct PropertyBase {
    name: String,
    label: Option<String>,
    description: String,
    user_read_only: bool,
    user_visible: bool,
    enabled: bool,
    group: Option<GroupId>,
}

impl PropertyBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            description: String::new(),
            user_read_only: false,
            user_visible: true,
            enabled: true,
            group: None,
        }
    }

    /// 稳定名称，同时作为设置项的标识符
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 界面标签，未设置时回退到名称
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, text: impl Into<String>) {
        self.description = text.into();
    }

    pub fn is_user_read_only(&self) -> bool {
        self.user_read_only
    }

    pub fn set_user_read_only(&mut self, on: bool) {
        self.user_read_only = on;
    }

    pub fn is_user_visible(&self) -> bool {
        self.user_visible
    }

    pub fn set_user_visible(&mut self, on: bool) {
        self.user_visible = on;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 所属属性组（非拥有关系，加入组后不再改变）
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub(crate) fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    pub(crate) fn attach(&mut self, group: GroupId) {
        debug_assert!(self.group.is_none(), "property already belongs to a group");
        self.group = Some(group);
    }
}

/// 属性能力接口
///
/// 每种具体属性类型实现这组固定操作，属性组和设置只通过它们访问值。
/// `assign_*` 方法只做类型转换和赋值，不做校验也不发通知；
/// 对已加入组的属性，校验、回滚和通知由 [`PropertyGroup`] 的写入流程负责。
pub trait Property: Any + Send + fmt::Debug {
    fn base(&self) -> &PropertyBase;

    fn base_mut(&mut self) -> &mut PropertyBase;

    /// 类型标签
    fn kind(&self) -> PropertyKind;

    /// 当前值装箱
    fn value_as_variant(&self) -> Variant;

    /// 默认值装箱
    fn default_value_as_variant(&self) -> Variant;

    /// 从变体拆箱并赋值；类型不兼容时返回错误且不修改值
    fn assign_variant(&mut self, variant: &Variant) -> Result<(), PropertyError>;

    /// 恢复为声明时的默认值（原始赋值，不经过校验）
    fn restore_default_value(&mut self);

    /// 标量/物理量约束检查
    fn check_constraints(&self) -> Result<(), PropertyError> {
        Ok(())
    }

    /// 物理量属性的单位类别
    fn quantity_unit(&self) -> Option<Unit> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn label(&self) -> &str {
        self.base().label()
    }

    fn is_enabled(&self) -> bool {
        self.base().is_enabled()
    }

    /// 当前值是否等于默认值
    fn is_default(&self) -> bool {
        self.value_as_variant() == self.default_value_as_variant()
    }
}
