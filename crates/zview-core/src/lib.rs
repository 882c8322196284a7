//! ZView 核心库
//!
//! 提供导入所需的几何与单位，以及类型化的属性/设置框架。
//!
//! # 架构设计
//!
//! - `property`: 属性、属性组（唯一写入入口：校验、回滚、通知）
//! - `settings`: 分组/小节/设置项注册表，负责持久化和批量重置
//! - `geometry`: 顶点、边、组合形状及其曲线
//!
//! # 示例
//!
//! ```rust
//! use zview_core::prelude::*;
//!
//! let mut group = PropertyGroup::new();
//! let flag = group.add(PropertyBool::new("import_annotations", true)).unwrap();
//!
//! let mut settings = Settings::new();
//! settings.add_property_group(group);
//! let import = settings.add_group("import").unwrap();
//! settings.add_setting(flag, import).unwrap();
//!
//! let mut store = MemoryStore::new();
//! settings.save(&mut store).unwrap();
//! assert_eq!(
//!     store.get("import/import_annotations"),
//!     Some(&StoredValue::Bool(true))
//! );
//! ```

pub mod color;
pub mod entity;
pub mod geometry;
pub mod layer;
pub mod math;
pub mod property;
pub mod settings;
pub mod transform;
pub mod units;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::color::Color;
    pub use crate::entity::{Entity, EntityId};
    pub use crate::geometry::{Arc, BSplineCurve, Circle, Curve, Ellipse, GeometryError, Line, Shape};
    pub use crate::layer::{Layer, LayerManager};
    pub use crate::math::{BoundingBox3, Point3, Vector3};
    pub use crate::property::{
        CheckState, GroupId, Property, PropertyBool, PropertyDouble, PropertyError, PropertyEvent,
        PropertyGroup, PropertyGroupHooks, PropertyInt, PropertyKey, PropertyKind, PropertyRef,
        PropertyString, Variant,
    };
    pub use crate::settings::{
        GroupIndex, LoadReport, MemoryStore, SectionIndex, SettingIndex, Settings, SettingsError,
        SettingsStore, StoreError, StoredValue,
    };
    pub use crate::transform::Transform3D;
    pub use crate::units::{Quantity, Unit};
}
