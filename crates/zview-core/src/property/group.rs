//! 属性组
//!
//! 属性组按声明顺序持有属性，是属性写入的唯一入口：
//! 保存旧值 → 赋值 → 约束检查与组校验 → 失败回滚 / 成功通知。

use super::{
    Constrained, GroupId, Property, PropertyError, PropertyId, PropertyKey, PropertyRef,
    ValueProperty, Variant,
};
use std::fmt;
use std::ops::{Deref, DerefMut, Index};

/// 属性组回调
///
/// 默认实现不做任何事，所有写入都视为有效。
pub trait PropertyGroupHooks: Send {
    /// 某个属性的值已提交
    fn on_property_changed(&mut self, _property: &dyn Property) {}

    /// 某个属性的启用状态已改变
    fn on_property_enabled(&mut self, _property: &dyn Property, _on: bool) {}

    /// 组级校验，在约束检查之后调用
    fn is_property_valid(&self, _property: &dyn Property) -> Result<(), PropertyError> {
        Ok(())
    }
}

struct NoHooks;

impl PropertyGroupHooks for NoHooks {}

/// 属性通知事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyEvent {
    Changed { group: GroupId, property: PropertyId },
    Enabled {
        group: GroupId,
        property: PropertyId,
        on: bool,
    },
}

impl PropertyEvent {
    pub fn property_ref(&self) -> PropertyRef {
        match *self {
            PropertyEvent::Changed { group, property } | PropertyEvent::Enabled { group, property, .. } => {
                PropertyRef { group, property }
            }
        }
    }
}

/// 事件监听器，在写入提交后同步调用
pub type PropertyListener = Box<dyn FnMut(&PropertyEvent, &dyn Property) + Send>;

/// 有序属性集合
pub struct PropertyGroup {
    id: GroupId,
    parent: Option<GroupId>,
    properties: Vec<Box<dyn Property>>,
    hooks: Box<dyn PropertyGroupHooks>,
    listeners: Vec<PropertyListener>,
    block_depth: usize,
}

impl PropertyGroup {
    pub fn new() -> Self {
        Self::with_hooks(NoHooks)
    }

    /// 使用自定义回调创建属性组
    pub fn with_hooks(hooks: impl PropertyGroupHooks + 'static) -> Self {
        Self {
            id: GroupId::new(),
            parent: None,
            properties: Vec::new(),
            hooks: Box::new(hooks),
            listeners: Vec::new(),
            block_depth: 0,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// 上级属性组（只读的反向引用）
    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: GroupId) {
        self.parent = Some(parent);
    }

    /// 加入属性，属性名在组内必须唯一
    pub fn add<P: Property>(&mut self, mut property: P) -> Result<PropertyKey<P>, PropertyError> {
        if self.find(property.name()).is_some() {
            return Err(PropertyError::DuplicateName(property.name().to_string()));
        }
        property.base_mut().attach(self.id);
        let id = PropertyId(self.properties.len());
        self.properties.push(Box::new(property));
        Ok(PropertyKey::new(self.id, id))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// 按声明顺序遍历
    pub fn properties(&self) -> impl Iterator<Item = (PropertyId, &dyn Property)> {
        self.properties
            .iter()
            .enumerate()
            .map(|(index, p)| (PropertyId(index), p.as_ref()))
    }

    pub fn property(&self, id: PropertyId) -> Option<&dyn Property> {
        self.properties.get(id.0).map(|p| p.as_ref())
    }

    /// 按名称查找
    pub fn find(&self, name: &str) -> Option<PropertyId> {
        self.properties
            .iter()
            .position(|p| p.name() == name)
            .map(PropertyId)
    }

    pub fn contains(&self, property: PropertyRef) -> bool {
        property.group == self.id && property.property.0 < self.properties.len()
    }

    /// 类型化读取
    pub fn get<P: Property>(&self, key: PropertyKey<P>) -> Option<&P> {
        if key.group() != self.id {
            return None;
        }
        self.properties
            .get(key.id().0)
            .and_then(|p| p.as_any().downcast_ref::<P>())
    }

    fn get_mut<P: Property>(&mut self, key: PropertyKey<P>) -> Result<&mut P, PropertyError> {
        if key.group() != self.id {
            return Err(PropertyError::NotFound);
        }
        self.properties
            .get_mut(key.id().0)
            .and_then(|p| p.as_any_mut().downcast_mut::<P>())
            .ok_or(PropertyError::NotFound)
    }

    fn checked_id<P>(&self, key: PropertyKey<P>) -> Result<PropertyId, PropertyError> {
        if key.group() == self.id {
            Ok(key.id())
        } else {
            Err(PropertyError::NotFound)
        }
    }

    /// 写入类型化的值
    pub fn set_value<P: ValueProperty>(
        &mut self,
        key: PropertyKey<P>,
        value: P::Value,
    ) -> Result<(), PropertyError> {
        let id = self.checked_id(key)?;
        self.write_with(id, move |property| {
            let property = property
                .as_any_mut()
                .downcast_mut::<P>()
                .ok_or(PropertyError::NotFound)?;
            property.replace_value(value);
            Ok(())
        })
    }

    /// 从变体写入，类型不兼容时不修改值
    pub fn set_value_from_variant(
        &mut self,
        id: PropertyId,
        variant: &Variant,
    ) -> Result<(), PropertyError> {
        self.write_with(id, |property| property.assign_variant(variant))
    }

    /// 写入物理量属性的原始数值（视为属性自身的单位）
    pub fn set_quantity_value(&mut self, id: PropertyId, value: f64) -> Result<(), PropertyError> {
        let property = self.property(id).ok_or(PropertyError::NotFound)?;
        if property.quantity_unit().is_none() {
            return Err(PropertyError::IncompatibleType {
                expected: "quantity",
                found: property.kind().type_name(),
            });
        }
        self.set_value_from_variant(id, &Variant::Double(value))
    }

    /// 恢复单个属性的默认值（经过写入流程）
    pub fn restore_default(&mut self, id: PropertyId) -> Result<(), PropertyError> {
        self.write_with(id, |property| {
            property.restore_default_value();
            Ok(())
        })
    }

    /// 恢复所有属性的默认值
    ///
    /// 被组校验拒绝的属性保持原值并记录警告，其余属性照常恢复。
    pub fn restore_defaults(&mut self) {
        for index in 0..self.properties.len() {
            if let Err(err) = self.restore_default(PropertyId(index)) {
                tracing::warn!(
                    "Failed to restore default of '{}': {}",
                    self.properties[index].name(),
                    err
                );
            }
        }
    }

    /// 启用/禁用属性，状态改变时通知（不受通知阻塞影响）
    pub fn set_enabled(&mut self, id: PropertyId, on: bool) -> Result<(), PropertyError> {
        let property = self.properties.get_mut(id.0).ok_or(PropertyError::NotFound)?;
        if property.is_enabled() == on {
            return Ok(());
        }
        property.base_mut().set_enabled(on);

        self.hooks.on_property_enabled(property.as_ref(), on);
        let event = PropertyEvent::Enabled {
            group: self.id,
            property: id,
            on,
        };
        for listener in self.listeners.iter_mut() {
            listener(&event, property.as_ref());
        }
        Ok(())
    }

    /// 更新范围约束的上下界，不重新校验当前值
    pub fn set_range<P: Constrained>(
        &mut self,
        key: PropertyKey<P>,
        minimum: P::Bound,
        maximum: P::Bound,
    ) -> Result<(), PropertyError> {
        self.get_mut(key)?.constraints_mut().set_range(minimum, maximum)
    }

    pub fn set_single_step<P: Constrained>(
        &mut self,
        key: PropertyKey<P>,
        step: P::Bound,
    ) -> Result<(), PropertyError> {
        self.get_mut(key)?.constraints_mut().set_single_step(step);
        Ok(())
    }

    pub fn set_constraints_enabled<P: Constrained>(
        &mut self,
        key: PropertyKey<P>,
        on: bool,
    ) -> Result<(), PropertyError> {
        self.get_mut(key)?.constraints_mut().set_enabled(on);
        Ok(())
    }

    /// 订阅属性事件
    pub fn subscribe(&mut self, listener: impl FnMut(&PropertyEvent, &dyn Property) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// 阻塞值变化通知，直到返回的守卫被释放
    ///
    /// 可以嵌套，最外层守卫释放后才恢复通知。
    pub fn block_property_changed(&mut self) -> PropertyChangedBlocker<'_> {
        self.block_depth += 1;
        PropertyChangedBlocker { group: self }
    }

    pub fn is_property_changed_blocked(&self) -> bool {
        self.block_depth > 0
    }

    /// 写入流程
    fn write_with<F>(&mut self, id: PropertyId, apply: F) -> Result<(), PropertyError>
    where
        F: FnOnce(&mut dyn Property) -> Result<(), PropertyError>,
    {
        let property = self.properties.get_mut(id.0).ok_or(PropertyError::NotFound)?;
        let previous = property.value_as_variant();
        apply(property.as_mut())?;

        let verdict = property
            .check_constraints()
            .and_then(|_| self.hooks.is_property_valid(property.as_ref()));
        if let Err(err) = verdict {
            if let Err(rollback) = property.assign_variant(&previous) {
                tracing::error!("Failed to roll back '{}': {}", property.name(), rollback);
            }
            tracing::debug!("Rejected write to '{}': {}", property.name(), err);
            return Err(err);
        }

        self.notify_changed(id);
        Ok(())
    }

    fn notify_changed(&mut self, id: PropertyId) {
        if self.block_depth > 0 {
            return;
        }
        let Some(property) = self.properties.get(id.0) else {
            return;
        };
        self.hooks.on_property_changed(property.as_ref());
        let event = PropertyEvent::Changed {
            group: self.id,
            property: id,
        };
        for listener in self.listeners.iter_mut() {
            listener(&event, property.as_ref());
        }
    }
}

impl Default for PropertyGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyGroup")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("properties", &self.properties)
            .field("listeners", &self.listeners.len())
            .field("block_depth", &self.block_depth)
            .finish()
    }
}

/// 类型键不属于本组或类型不符时 panic
impl<P: Property> Index<PropertyKey<P>> for PropertyGroup {
    type Output = P;

    fn index(&self, key: PropertyKey<P>) -> &P {
        match self.get(key) {
            Some(property) => property,
            None => panic!("{:?} does not belong to group {:?}", key, self.id),
        }
    }
}

/// 值变化通知阻塞守卫
///
/// 持有期间可以通过解引用继续操作属性组。
pub struct PropertyChangedBlocker<'a> {
    group: &'a mut PropertyGroup,
}

impl Deref for PropertyChangedBlocker<'_> {
    type Target = PropertyGroup;

    fn deref(&self) -> &PropertyGroup {
        self.group
    }
}

impl DerefMut for PropertyChangedBlocker<'_> {
    fn deref_mut(&mut self) -> &mut PropertyGroup {
        self.group
    }
}

impl Drop for PropertyChangedBlocker<'_> {
    fn drop(&mut self) {
        self.group.block_depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyBool, PropertyDouble, PropertyInt, PropertyLength, PropertyString};
    use crate::units::Length;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn recorder(group: &mut PropertyGroup) -> Arc<Mutex<Vec<PropertyEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        group.subscribe(move |event, _| sink.lock().push(*event));
        events
    }

    #[test]
    fn test_range_rejects_and_rolls_back() {
        let mut group = PropertyGroup::new();
        let key = group
            .add(PropertyInt::new("count", 50).with_constraints(0, 100, 1))
            .unwrap();
        let events = recorder(&mut group);

        let err = group.set_value(key, 150).unwrap_err();
        assert!(matches!(err, PropertyError::OutOfRange { .. }));
        assert_eq!(*group[key].value(), 50);
        assert!(events.lock().is_empty());

        group.set_value(key, 75).unwrap();
        assert_eq!(*group[key].value(), 75);
        assert_eq!(
            *events.lock(),
            vec![PropertyEvent::Changed {
                group: group.id(),
                property: key.id(),
            }]
        );
    }

    #[test]
    fn test_incompatible_variant_leaves_value() {
        let mut group = PropertyGroup::new();
        let key = group.add(PropertyDouble::new("ratio", 0.5)).unwrap();
        let events = recorder(&mut group);

        let err = group
            .set_value_from_variant(key.id(), &Variant::String("x".into()))
            .unwrap_err();
        assert!(matches!(err, PropertyError::IncompatibleType { .. }));
        assert_eq!(*group[key].value(), 0.5);
        assert!(events.lock().is_empty());

        group.set_value_from_variant(key.id(), &Variant::Int(2)).unwrap();
        assert_eq!(*group[key].value(), 2.0);
    }

    struct RejectNegative;

    impl PropertyGroupHooks for RejectNegative {
        fn is_property_valid(&self, property: &dyn Property) -> Result<(), PropertyError> {
            match property.value_as_variant().to_f64() {
                Some(v) if v < 0.0 => Err(PropertyError::Invalid("negative".into())),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_group_validity_hook() {
        let mut group = PropertyGroup::with_hooks(RejectNegative);
        let key = group.add(PropertyDouble::new("offset", 1.0)).unwrap();

        assert_eq!(
            group.set_value(key, -3.0),
            Err(PropertyError::Invalid("negative".into()))
        );
        assert_eq!(*group[key].value(), 1.0);
        assert!(group.set_value(key, 3.0).is_ok());
    }

    #[derive(Default)]
    struct Counting {
        changed: Arc<Mutex<Vec<String>>>,
    }

    impl PropertyGroupHooks for Counting {
        fn on_property_changed(&mut self, property: &dyn Property) {
            self.changed.lock().push(property.name().to_string());
        }
    }

    #[test]
    fn test_changed_hook_runs() {
        let hooks = Counting::default();
        let changed = Arc::clone(&hooks.changed);
        let mut group = PropertyGroup::with_hooks(hooks);
        let flag = group.add(PropertyBool::new("flag", false)).unwrap();

        group.set_value(flag, true).unwrap();
        assert_eq!(*changed.lock(), vec!["flag".to_string()]);
    }

    #[test]
    fn test_nested_blocking() {
        let mut group = PropertyGroup::new();
        let key = group.add(PropertyInt::new("count", 0)).unwrap();
        let events = recorder(&mut group);

        {
            let mut outer = group.block_property_changed();
            {
                let mut inner = outer.block_property_changed();
                inner.set_value(key, 1).unwrap();
            }
            assert!(outer.is_property_changed_blocked());
            outer.set_value(key, 2).unwrap();
        }
        assert!(events.lock().is_empty());
        assert!(!group.is_property_changed_blocked());
        assert_eq!(*group[key].value(), 2);

        group.set_value(key, 3).unwrap();
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_enabled_fires_only_on_change() {
        let mut group = PropertyGroup::new();
        let key = group.add(PropertyString::new("name", String::new())).unwrap();
        let events = recorder(&mut group);

        group.set_enabled(key.id(), true).unwrap();
        assert!(events.lock().is_empty());

        {
            let mut blocked = group.block_property_changed();
            blocked.set_enabled(key.id(), false).unwrap();
        }
        assert!(!group[key].is_enabled());
        assert_eq!(
            *events.lock(),
            vec![PropertyEvent::Enabled {
                group: group.id(),
                property: key.id(),
                on: false,
            }]
        );
    }

    #[test]
    fn test_restore_defaults_idempotent() {
        let mut group = PropertyGroup::new();
        let count = group.add(PropertyInt::new("count", 4)).unwrap();
        let name = group.add(PropertyString::new("name", "a".into())).unwrap();
        group.set_value(count, 9).unwrap();
        group.set_value(name, "b".into()).unwrap();

        group.restore_defaults();
        let once: Vec<Variant> = group.properties().map(|(_, p)| p.value_as_variant()).collect();
        group.restore_defaults();
        let twice: Vec<Variant> = group.properties().map(|(_, p)| p.value_as_variant()).collect();

        assert_eq!(once, vec![Variant::Int(4), Variant::String("a".into())]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut group = PropertyGroup::new();
        group.add(PropertyBool::new("flag", false)).unwrap();
        assert_eq!(
            group.add(PropertyInt::new("flag", 0)).unwrap_err(),
            PropertyError::DuplicateName("flag".into())
        );
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_property_knows_its_group() {
        let mut group = PropertyGroup::new();
        let key = group.add(PropertyBool::new("flag", false)).unwrap();
        assert_eq!(group[key].base().group(), Some(group.id()));
        assert_eq!(group.find("flag"), Some(key.id()));

        let other = PropertyGroup::new();
        assert!(other.get(key).is_none());
    }

    #[test]
    fn test_quantity_value_setter() {
        let mut group = PropertyGroup::new();
        let key = group
            .add(PropertyLength::new("gap", 1.0).with_constraints(0.0, 10.0, 0.5))
            .unwrap();
        let flag = group.add(PropertyBool::new("flag", false)).unwrap();

        group.set_quantity_value(key.id(), 4.0).unwrap();
        assert_eq!(group[key].quantity(), Length::new(4.0));
        assert!(group.set_quantity_value(key.id(), 40.0).is_err());
        assert_eq!(group[key].quantity_value(), 4.0);
        assert!(matches!(
            group.set_quantity_value(flag.id(), 1.0),
            Err(PropertyError::IncompatibleType { .. })
        ));
    }

    #[test]
    fn test_set_range_does_not_revalidate() {
        let mut group = PropertyGroup::new();
        let key = group
            .add(PropertyInt::new("count", 50).with_constraints(0, 100, 1))
            .unwrap();
        group.set_range(key, 0, 10).unwrap();
        assert_eq!(*group[key].value(), 50);
        assert!(group.set_value(key, 20).is_err());

        group.set_constraints_enabled(key, false).unwrap();
        assert!(group.set_value(key, 20).is_ok());
    }

    proptest! {
        #[test]
        fn prop_committed_values_stay_in_range(writes in proptest::collection::vec(-500i32..500, 1..40)) {
            let mut group = PropertyGroup::new();
            let key = group
                .add(PropertyInt::new("count", 50).with_constraints(0, 100, 1))
                .unwrap();

            for value in writes {
                let before = *group[key].value();
                match group.set_value(key, value) {
                    Ok(()) => {
                        prop_assert_eq!(*group[key].value(), value);
                    }
                    Err(_) => {
                        prop_assert_eq!(*group[key].value(), before);
                    }
                }
                let current = *group[key].value();
                prop_assert!((0..=100).contains(&current));
            }
        }
    }
}
