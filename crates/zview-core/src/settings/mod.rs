//! 设置注册表
//!
//! 三级结构：分组（group）→ 小节（section）→ 设置项（setting）。
//! 每个设置项包装一个属性，持久化键为 `分组/小节/设置项`，默认小节不出现在键中。
//!
//! 设置项引用的属性属于被 [`Settings`] 接管的 [`PropertyGroup`]，
//! 注册关系只增不减，进程生命周期内不提供删除。

mod conversion;
mod store;

pub use conversion::*;
pub use store::*;

use crate::property::{
    GroupId, Property, PropertyError, PropertyEvent, PropertyGroup, PropertyKey, PropertyRef,
    ValueProperty, Variant,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// 重置回调，在对应范围内的属性恢复默认值之后调用
pub type ResetFunction = Box<dyn FnMut() + Send>;

/// 设置事件监听器
pub type SettingsListener = Box<dyn FnMut(&PropertyEvent, &dyn Property) + Send>;

/// 分组索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupIndex(usize);

impl GroupIndex {
    pub fn get(&self) -> usize {
        self.0
    }
}

/// 小节索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionIndex {
    group: GroupIndex,
    section: usize,
}

impl SectionIndex {
    pub fn group(&self) -> GroupIndex {
        self.group
    }

    pub fn get(&self) -> usize {
        self.section
    }
}

/// 设置项索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SettingIndex {
    section: SectionIndex,
    setting: usize,
}

impl SettingIndex {
    pub fn group(&self) -> GroupIndex {
        self.section.group
    }

    pub fn section(&self) -> SectionIndex {
        self.section
    }

    pub fn get(&self) -> usize {
        self.setting
    }
}

/// 注册设置项或重置回调的范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsScope {
    /// 分组（设置项进入默认小节）
    Group(GroupIndex),
    Section(SectionIndex),
}

impl From<GroupIndex> for SettingsScope {
    fn from(index: GroupIndex) -> Self {
        SettingsScope::Group(index)
    }
}

impl From<SectionIndex> for SettingsScope {
    fn from(index: SectionIndex) -> Self {
        SettingsScope::Section(index)
    }
}

/// 设置错误
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Duplicate identifier '{0}'")]
    DuplicateIdentifier(String),

    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Invalid settings index")]
    InvalidIndex,

    #[error("Property does not belong to a group owned by these settings")]
    UnknownProperty,

    #[error("Property is already registered as '{0}'")]
    AlreadyRegistered(String),

    #[error("Setting '{key}': {source}")]
    Conversion {
        key: String,
        #[source]
        source: ConversionError,
    },

    #[error("Setting '{key}': {source}")]
    Property {
        key: String,
        #[source]
        source: PropertyError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// 单个设置项的加载结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// 存储中没有该键，属性保持当前值
    Missing,
}

/// 加载失败的设置项
#[derive(Debug)]
pub struct LoadFailure {
    pub key: String,
    pub error: SettingsError,
}

/// 批量加载报告
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub missing: Vec<String>,
    pub excluded: Vec<String>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// 没有任何设置项失败
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct SettingsSection {
    identifier: String,
    title: String,
    is_default: bool,
    settings: Vec<PropertyRef>,
    reset_functions: Vec<ResetFunction>,
}

impl SettingsSection {
    fn new(identifier: String, is_default: bool) -> Self {
        Self {
            title: identifier.clone(),
            identifier,
            is_default,
            settings: Vec::new(),
            reset_functions: Vec::new(),
        }
    }
}

struct SettingsGroup {
    identifier: String,
    title: String,
    sections: Vec<SettingsSection>,
    reset_functions: Vec<ResetFunction>,
}

/// 设置注册表
pub struct Settings {
    id: GroupId,
    groups: Vec<SettingsGroup>,
    property_groups: Vec<PropertyGroup>,
    registered: HashMap<PropertyRef, SettingIndex>,
    listeners: Arc<Mutex<Vec<SettingsListener>>>,
    locale: Locale,
    conversion: PropertyValueConversion,
}

fn check_identifier(identifier: &str) -> Result<(), SettingsError> {
    if identifier.is_empty() || identifier.contains('/') {
        return Err(SettingsError::InvalidIdentifier(identifier.to_string()));
    }
    Ok(())
}

fn find_group_mut(groups: &mut [PropertyGroup], id: GroupId) -> Option<&mut PropertyGroup> {
    groups.iter_mut().find(|g| g.id() == id)
}

/// 恢复一组设置项的默认值，失败只记录警告
fn restore_settings(groups: &mut [PropertyGroup], settings: &[PropertyRef]) {
    for setting in settings {
        let Some(group) = find_group_mut(groups, setting.group) else {
            continue;
        };
        if let Err(err) = group.restore_default(setting.property) {
            tracing::warn!("Failed to reset setting: {}", err);
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self {
            id: GroupId::new(),
            groups: Vec::new(),
            property_groups: Vec::new(),
            registered: HashMap::new(),
            listeners: Arc::new(Mutex::new(Vec::new())),
            locale: Locale::c(),
            conversion: PropertyValueConversion::new(),
        }
    }

    /// 作为被接管属性组上级的ID
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// 接管属性组，其属性事件经由 [`Settings::subscribe`] 转发
    pub fn add_property_group(&mut self, mut group: PropertyGroup) -> GroupId {
        group.set_parent(self.id);
        let listeners = Arc::clone(&self.listeners);
        group.subscribe(move |event, property| {
            for listener in listeners.lock().iter_mut() {
                listener(event, property);
            }
        });
        let id = group.id();
        self.property_groups.push(group);
        id
    }

    pub fn property_group(&self, id: GroupId) -> Option<&PropertyGroup> {
        self.property_groups.iter().find(|g| g.id() == id)
    }

    pub fn property_group_mut(&mut self, id: GroupId) -> Option<&mut PropertyGroup> {
        find_group_mut(&mut self.property_groups, id)
    }

    /// 订阅所有被接管属性的值变化和启用状态变化
    pub fn subscribe(&mut self, listener: impl FnMut(&PropertyEvent, &dyn Property) + Send + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    // ---- 分组 ----

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// 添加分组，同时创建其默认小节
    pub fn add_group(&mut self, identifier: impl Into<String>) -> Result<GroupIndex, SettingsError> {
        let identifier = identifier.into();
        check_identifier(&identifier)?;
        if self.groups.iter().any(|g| g.identifier == identifier) {
            return Err(SettingsError::DuplicateIdentifier(identifier));
        }
        self.groups.push(SettingsGroup {
            title: identifier.clone(),
            identifier,
            sections: vec![SettingsSection::new(String::new(), true)],
            reset_functions: Vec::new(),
        });
        Ok(GroupIndex(self.groups.len() - 1))
    }

    pub fn find_group(&self, identifier: &str) -> Option<GroupIndex> {
        self.groups
            .iter()
            .position(|g| g.identifier == identifier)
            .map(GroupIndex)
    }

    pub fn group_identifier(&self, index: GroupIndex) -> Option<&str> {
        self.group(index).map(|g| g.identifier.as_str())
    }

    pub fn group_title(&self, index: GroupIndex) -> Option<&str> {
        self.group(index).map(|g| g.title.as_str())
    }

    pub fn set_group_title(
        &mut self,
        index: GroupIndex,
        title: impl Into<String>,
    ) -> Result<(), SettingsError> {
        self.group_mut(index)?.title = title.into();
        Ok(())
    }

    fn group(&self, index: GroupIndex) -> Option<&SettingsGroup> {
        self.groups.get(index.0)
    }

    fn group_mut(&mut self, index: GroupIndex) -> Result<&mut SettingsGroup, SettingsError> {
        self.groups.get_mut(index.0).ok_or(SettingsError::InvalidIndex)
    }

    // ---- 小节 ----

    pub fn section_count(&self, index: GroupIndex) -> usize {
        self.group(index).map_or(0, |g| g.sections.len())
    }

    /// 分组的默认小节
    pub fn default_section(&self, index: GroupIndex) -> Option<SectionIndex> {
        self.group(index).map(|_| SectionIndex {
            group: index,
            section: 0,
        })
    }

    pub fn add_section(
        &mut self,
        index: GroupIndex,
        identifier: impl Into<String>,
    ) -> Result<SectionIndex, SettingsError> {
        let identifier = identifier.into();
        check_identifier(&identifier)?;
        let group = self.group_mut(index)?;
        if group.sections.iter().any(|s| s.identifier == identifier) {
            return Err(SettingsError::DuplicateIdentifier(identifier));
        }
        group.sections.push(SettingsSection::new(identifier, false));
        Ok(SectionIndex {
            group: index,
            section: group.sections.len() - 1,
        })
    }

    pub fn section_identifier(&self, index: SectionIndex) -> Option<&str> {
        self.section(index).map(|s| s.identifier.as_str())
    }

    pub fn section_title(&self, index: SectionIndex) -> Option<&str> {
        self.section(index).map(|s| s.title.as_str())
    }

    pub fn set_section_title(
        &mut self,
        index: SectionIndex,
        title: impl Into<String>,
    ) -> Result<(), SettingsError> {
        self.section_mut(index)?.title = title.into();
        Ok(())
    }

    pub fn is_default_group_section(&self, index: SectionIndex) -> bool {
        self.section(index).is_some_and(|s| s.is_default)
    }

    fn section(&self, index: SectionIndex) -> Option<&SettingsSection> {
        self.group(index.group)?.sections.get(index.section)
    }

    fn section_mut(&mut self, index: SectionIndex) -> Result<&mut SettingsSection, SettingsError> {
        self.group_mut(index.group)?
            .sections
            .get_mut(index.section)
            .ok_or(SettingsError::InvalidIndex)
    }

    // ---- 设置项 ----

    pub fn setting_count(&self, index: SectionIndex) -> usize {
        self.section(index).map_or(0, |s| s.settings.len())
    }

    /// 注册设置项，标识符取属性名
    pub fn add_setting(
        &mut self,
        property: impl Into<PropertyRef>,
        scope: impl Into<SettingsScope>,
    ) -> Result<SettingIndex, SettingsError> {
        let property = property.into();
        let section_index = match scope.into() {
            SettingsScope::Group(group) => SectionIndex { group, section: 0 },
            SettingsScope::Section(section) => section,
        };

        let name = self
            .property_group(property.group)
            .and_then(|g| g.property(property.property))
            .map(|p| p.name().to_string())
            .ok_or(SettingsError::UnknownProperty)?;
        check_identifier(&name)?;
        if let Some(existing) = self.registered.get(&property) {
            let key = self.setting_key(*existing).unwrap_or_default();
            return Err(SettingsError::AlreadyRegistered(key));
        }

        let section = self.section(section_index).ok_or(SettingsError::InvalidIndex)?;
        let duplicate = section.settings.iter().any(|other| {
            self.property_ref(*other)
                .is_some_and(|p| p.name() == name)
        });
        if duplicate {
            return Err(SettingsError::DuplicateIdentifier(name));
        }

        let section = self.section_mut(section_index)?;
        section.settings.push(property);
        let index = SettingIndex {
            section: section_index,
            setting: section.settings.len() - 1,
        };
        self.registered.insert(property, index);
        Ok(index)
    }

    fn property_ref(&self, property: PropertyRef) -> Option<&dyn Property> {
        self.property_group(property.group)?.property(property.property)
    }

    fn setting_ref(&self, index: SettingIndex) -> Option<PropertyRef> {
        self.section(index.section)?.settings.get(index.setting).copied()
    }

    /// 设置项对应的属性
    pub fn property(&self, index: SettingIndex) -> Option<&dyn Property> {
        self.property_ref(self.setting_ref(index)?)
    }

    /// 查找属性注册的设置项
    pub fn find_property(&self, property: impl Into<PropertyRef>) -> Option<SettingIndex> {
        self.registered.get(&property.into()).copied()
    }

    /// 所有设置项（按分组、小节、注册顺序）
    pub fn settings(&self) -> impl Iterator<Item = SettingIndex> + '_ {
        self.groups.iter().enumerate().flat_map(|(g, group)| {
            group.sections.iter().enumerate().flat_map(move |(s, section)| {
                (0..section.settings.len()).map(move |setting| SettingIndex {
                    section: SectionIndex {
                        group: GroupIndex(g),
                        section: s,
                    },
                    setting,
                })
            })
        })
    }

    /// 持久化键
    pub fn setting_key(&self, index: SettingIndex) -> Option<String> {
        let group = self.group(index.group())?;
        let section = group.sections.get(index.section.section)?;
        let property = self.property(index)?;
        if section.is_default {
            Some(format!("{}/{}", group.identifier, property.name()))
        } else {
            Some(format!(
                "{}/{}/{}",
                group.identifier,
                section.identifier,
                property.name()
            ))
        }
    }

    /// 类型化读取
    pub fn get<P: Property>(&self, key: PropertyKey<P>) -> Option<&P> {
        self.property_group(key.group())?.get(key)
    }

    /// 写入类型化的值（经过属性组写入流程）
    pub fn set_value<P: ValueProperty>(
        &mut self,
        key: PropertyKey<P>,
        value: P::Value,
    ) -> Result<(), PropertyError> {
        self.property_group_mut(key.group())
            .ok_or(PropertyError::NotFound)?
            .set_value(key, value)
    }

    pub fn set_value_from_variant(
        &mut self,
        property: PropertyRef,
        variant: &Variant,
    ) -> Result<(), PropertyError> {
        self.property_group_mut(property.group)
            .ok_or(PropertyError::NotFound)?
            .set_value_from_variant(property.property, variant)
    }

    pub fn set_enabled(&mut self, property: PropertyRef, on: bool) -> Result<(), PropertyError> {
        self.property_group_mut(property.group)
            .ok_or(PropertyError::NotFound)?
            .set_enabled(property.property, on)
    }

    // ---- 重置 ----

    pub fn add_reset_function(
        &mut self,
        scope: impl Into<SettingsScope>,
        function: impl FnMut() + Send + 'static,
    ) -> Result<(), SettingsError> {
        let function: ResetFunction = Box::new(function);
        match scope.into() {
            SettingsScope::Group(index) => self.group_mut(index)?.reset_functions.push(function),
            SettingsScope::Section(index) => {
                self.section_mut(index)?.reset_functions.push(function)
            }
        }
        Ok(())
    }

    /// 恢复小节内所有设置项的默认值，然后调用小节的重置回调
    pub fn reset_section(&mut self, index: SectionIndex) -> Result<(), SettingsError> {
        let section = self
            .groups
            .get_mut(index.group.0)
            .and_then(|g| g.sections.get_mut(index.section))
            .ok_or(SettingsError::InvalidIndex)?;
        restore_settings(&mut self.property_groups, &section.settings);
        for function in section.reset_functions.iter_mut() {
            function();
        }
        Ok(())
    }

    /// 重置分组的所有小节，然后调用分组的重置回调
    pub fn reset_group(&mut self, index: GroupIndex) -> Result<(), SettingsError> {
        let group = self
            .groups
            .get_mut(index.0)
            .ok_or(SettingsError::InvalidIndex)?;
        for section in group.sections.iter_mut() {
            restore_settings(&mut self.property_groups, &section.settings);
            for function in section.reset_functions.iter_mut() {
                function();
            }
        }
        for function in group.reset_functions.iter_mut() {
            function();
        }
        Ok(())
    }

    pub fn reset_all(&mut self) {
        for index in 0..self.groups.len() {
            // 索引来自 0..len，不会失败
            let _ = self.reset_group(GroupIndex(index));
        }
    }

    // ---- 持久化 ----

    /// 从主存储加载所有设置项
    pub fn load(&mut self, store: &dyn SettingsStore) -> Result<LoadReport, SettingsError> {
        self.load_from(store, |_| false)
    }

    /// 从指定存储加载，跳过 `exclude` 返回 true 的设置项
    ///
    /// 先读取全部键值，读取失败时不修改任何属性；
    /// 之后逐项转换写入，单项失败记入报告，不影响其余设置项。
    pub fn load_from(
        &mut self,
        store: &dyn SettingsStore,
        mut exclude: impl FnMut(&dyn Property) -> bool,
    ) -> Result<LoadReport, SettingsError> {
        let mut report = LoadReport::default();
        let mut pending = Vec::new();

        let indices: Vec<SettingIndex> = self.settings().collect();
        for index in indices {
            let (Some(property), Some(key)) = (self.property(index), self.setting_key(index)) else {
                continue;
            };
            if exclude(property) {
                report.excluded.push(key);
                continue;
            }
            match store.value(&key) {
                Ok(Some(value)) => pending.push((index, key, value)),
                Ok(None) => report.missing.push(key),
                Err(error @ StoreError::Value { .. }) => {
                    tracing::warn!("Failed to read setting: {}", error);
                    report.failures.push(LoadFailure {
                        key,
                        error: error.into(),
                    });
                }
                Err(error) => return Err(error.into()),
            }
        }

        for (index, key, value) in pending {
            match self.apply_stored(index, &key, &value) {
                Ok(()) => report.loaded.push(key),
                Err(error) => {
                    tracing::warn!("Failed to load setting: {}", error);
                    report.failures.push(LoadFailure { key, error });
                }
            }
        }

        tracing::debug!(
            "Loaded {} settings ({} missing, {} excluded, {} failed)",
            report.loaded.len(),
            report.missing.len(),
            report.excluded.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// 加载单个设置项
    pub fn load_property(
        &mut self,
        store: &dyn SettingsStore,
        index: SettingIndex,
    ) -> Result<LoadStatus, SettingsError> {
        let key = self.setting_key(index).ok_or(SettingsError::InvalidIndex)?;
        match store.value(&key)? {
            Some(value) => {
                self.apply_stored(index, &key, &value)?;
                Ok(LoadStatus::Loaded)
            }
            None => Ok(LoadStatus::Missing),
        }
    }

    fn apply_stored(
        &mut self,
        index: SettingIndex,
        key: &str,
        value: &StoredValue,
    ) -> Result<(), SettingsError> {
        let property = self.setting_ref(index).ok_or(SettingsError::InvalidIndex)?;
        let group = find_group_mut(&mut self.property_groups, property.group)
            .ok_or(SettingsError::UnknownProperty)?;
        let kind = group
            .property(property.property)
            .ok_or(SettingsError::UnknownProperty)?
            .kind();

        let variant = self
            .conversion
            .from_stored(kind, value, &self.locale)
            .map_err(|source| SettingsError::Conversion {
                key: key.to_string(),
                source,
            })?;
        group
            .set_value_from_variant(property.property, &variant)
            .map_err(|source| SettingsError::Property {
                key: key.to_string(),
                source,
            })
    }

    /// 保存所有设置项到主存储
    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        self.save_as(store, |_| false)
    }

    /// 保存到指定存储，跳过 `exclude` 返回 true 的设置项
    pub fn save_as(
        &self,
        store: &mut dyn SettingsStore,
        mut exclude: impl FnMut(&dyn Property) -> bool,
    ) -> Result<(), SettingsError> {
        let mut count = 0;
        for index in self.settings() {
            let (Some(property), Some(key)) = (self.property(index), self.setting_key(index)) else {
                continue;
            };
            if exclude(property) {
                continue;
            }
            let value = self.conversion.to_stored(&property.value_as_variant());
            store.set_value(&key, value)?;
            count += 1;
        }
        store.sync()?;
        tracing::debug!("Saved {} settings", count);
        Ok(())
    }

    /// 按原始键读取存储值（诊断和迁移用），读取失败时返回 `None`
    pub fn find_value_from_key(&self, store: &dyn SettingsStore, key: &str) -> Option<StoredValue> {
        match store.value(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Failed to read '{}': {}", key, err);
                None
            }
        }
    }

    // ---- 区域设置与值转换 ----

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    pub fn property_value_conversion(&self) -> &PropertyValueConversion {
        &self.conversion
    }

    pub fn set_property_value_conversion(&mut self, conversion: PropertyValueConversion) {
        self.conversion = conversion;
    }

    /// 按当前区域设置格式化设置项的值
    pub fn format_value(&self, index: SettingIndex) -> Option<String> {
        let property = self.property(index)?;
        Some(
            self.conversion
                .format_value(&property.value_as_variant(), &self.locale),
        )
    }

    /// 环境变量（`LC_ALL`、`LANG`）给出的语言代码，缺省为 `en`
    pub fn default_locale_language_code() -> String {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|value| Locale::from_language_code(&value).language().to_string())
            .find(|code| !code.is_empty() && code != "c" && code != "posix")
            .unwrap_or_else(|| "en".to_string())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("id", &self.id)
            .field("groups", &self.groups.len())
            .field("property_groups", &self.property_groups)
            .field("locale", &self.locale)
            .finish()
    }
}

/// 类型键不属于被接管的属性组时 panic
impl<P: Property> Index<PropertyKey<P>> for Settings {
    type Output = P;

    fn index(&self, key: PropertyKey<P>) -> &P {
        match self.get(key) {
            Some(property) => property,
            None => panic!("{:?} is not owned by these settings", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::math::Point3;
    use crate::property::{
        CheckState, PropertyBool, PropertyByteArray, PropertyCheckState, PropertyColor,
        PropertyDateTime, PropertyDouble, PropertyInt, PropertyLength, PropertyPoint,
        PropertyString, PropertyStringList,
    };
    use crate::units::Length;
    use chrono::{TimeZone, Utc};

    /// 每种类型各一个属性的设置
    struct Fixture {
        settings: Settings,
        flag: PropertyKey<PropertyBool>,
        count: PropertyKey<PropertyInt>,
        ratio: PropertyKey<PropertyDouble>,
        state: PropertyKey<PropertyCheckState>,
        blob: PropertyKey<PropertyByteArray>,
        title: PropertyKey<PropertyString>,
        recent: PropertyKey<PropertyStringList>,
        stamp: PropertyKey<PropertyDateTime>,
        origin: PropertyKey<PropertyPoint>,
        color: PropertyKey<PropertyColor>,
        gap: PropertyKey<PropertyLength>,
    }

    fn fixture() -> Fixture {
        let mut group = PropertyGroup::new();
        let flag = group.add(PropertyBool::new("flag", false)).unwrap();
        let count = group
            .add(PropertyInt::new("count", 50).with_constraints(0, 100, 1))
            .unwrap();
        let ratio = group.add(PropertyDouble::new("ratio", 0.5)).unwrap();
        let state = group
            .add(PropertyCheckState::new("state", CheckState::Unchecked))
            .unwrap();
        let blob = group.add(PropertyByteArray::new("blob", Vec::new())).unwrap();
        let title = group.add(PropertyString::new("title", "untitled".into())).unwrap();
        let recent = group.add(PropertyStringList::new("recent", Vec::new())).unwrap();
        let stamp = group
            .add(PropertyDateTime::new(
                "stamp",
                Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
            ))
            .unwrap();
        let origin = group.add(PropertyPoint::new("origin", Point3::origin())).unwrap();
        let color = group.add(PropertyColor::new("color", Color::WHITE)).unwrap();
        let gap = group.add(PropertyLength::new("gap", 1.0)).unwrap();

        let mut settings = Settings::new();
        settings.add_property_group(group);
        let application = settings.add_group("application").unwrap();
        let display = settings.add_section(application, "display").unwrap();

        settings.add_setting(flag, application).unwrap();
        settings.add_setting(count, application).unwrap();
        settings.add_setting(ratio, application).unwrap();
        settings.add_setting(state, application).unwrap();
        settings.add_setting(blob, application).unwrap();
        settings.add_setting(title, application).unwrap();
        settings.add_setting(recent, display).unwrap();
        settings.add_setting(stamp, display).unwrap();
        settings.add_setting(origin, display).unwrap();
        settings.add_setting(color, display).unwrap();
        settings.add_setting(gap, display).unwrap();

        Fixture {
            settings,
            flag,
            count,
            ratio,
            state,
            blob,
            title,
            recent,
            stamp,
            origin,
            color,
            gap,
        }
    }

    fn snapshot(settings: &Settings) -> Vec<Variant> {
        settings
            .settings()
            .filter_map(|index| settings.property(index))
            .map(|p| p.value_as_variant())
            .collect()
    }

    fn modify(f: &mut Fixture) {
        let s = &mut f.settings;
        s.set_value(f.flag, true).unwrap();
        s.set_value(f.count, 75).unwrap();
        s.set_value(f.ratio, 0.1 + 0.2).unwrap();
        s.set_value(f.state, CheckState::PartiallyChecked).unwrap();
        s.set_value(f.blob, vec![0, 0xAB, 0xFF]).unwrap();
        s.set_value(f.title, "drawing".into()).unwrap();
        s.set_value(f.recent, vec!["a.dxf".into(), "b.dxf".into()]).unwrap();
        s.set_value(f.stamp, Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap())
            .unwrap();
        s.set_value(f.origin, Point3::new(1.5, -2.25, 1.0 / 3.0)).unwrap();
        s.set_value(f.color, Color::with_alpha(10, 20, 30, 40)).unwrap();
        s.set_value(f.gap, Length::new(0.7)).unwrap();
    }

    #[test]
    fn test_default_section() {
        let mut settings = Settings::new();
        let group = settings.add_group("import").unwrap();
        assert_eq!(settings.section_count(group), 1);

        let default = settings.default_section(group).unwrap();
        assert!(settings.is_default_group_section(default));
        assert_eq!(settings.section_identifier(default), Some(""));

        let dxf = settings.add_section(group, "dxf").unwrap();
        assert!(!settings.is_default_group_section(dxf));
        assert_eq!(settings.section_count(group), 2);
        assert_eq!(settings.section_title(dxf), Some("dxf"));

        settings.set_section_title(dxf, "DXF").unwrap();
        settings.set_group_title(group, "Import").unwrap();
        assert_eq!(settings.section_title(dxf), Some("DXF"));
        assert_eq!(settings.group_title(group), Some("Import"));
    }

    #[test]
    fn test_duplicate_sections() {
        let mut settings = Settings::new();
        let import = settings.add_group("import").unwrap();
        let export = settings.add_group("export").unwrap();

        settings.add_section(import, "dxf").unwrap();
        assert!(matches!(
            settings.add_section(import, "dxf"),
            Err(SettingsError::DuplicateIdentifier(id)) if id == "dxf"
        ));
        assert!(settings.add_section(export, "dxf").is_ok());
        assert_eq!(settings.section_count(import), 2);
    }

    #[test]
    fn test_duplicate_and_invalid_groups() {
        let mut settings = Settings::new();
        settings.add_group("import").unwrap();
        assert!(matches!(
            settings.add_group("import"),
            Err(SettingsError::DuplicateIdentifier(_))
        ));
        assert!(matches!(
            settings.add_group("a/b"),
            Err(SettingsError::InvalidIdentifier(_))
        ));
        assert!(matches!(settings.add_group(""), Err(SettingsError::InvalidIdentifier(_))));
        assert_eq!(settings.group_count(), 1);
        assert_eq!(settings.find_group("import"), Some(GroupIndex(0)));
    }

    #[test]
    fn test_add_setting_rules() {
        let mut adopted = PropertyGroup::new();
        let a = adopted.add(PropertyBool::new("a", false)).unwrap();

        let mut foreign = PropertyGroup::new();
        let stray = foreign.add(PropertyBool::new("stray", false)).unwrap();

        let mut other = PropertyGroup::new();
        let twin = other.add(PropertyBool::new("a", true)).unwrap();

        let mut settings = Settings::new();
        settings.add_property_group(adopted);
        settings.add_property_group(other);
        let group = settings.add_group("general").unwrap();

        assert!(matches!(
            settings.add_setting(stray, group),
            Err(SettingsError::UnknownProperty)
        ));

        let index = settings.add_setting(a, group).unwrap();
        assert_eq!(settings.find_property(a), Some(index));
        assert_eq!(settings.setting_count(settings.default_section(group).unwrap()), 1);
        assert!(matches!(
            settings.add_setting(a, group),
            Err(SettingsError::AlreadyRegistered(key)) if key == "general/a"
        ));
        // 同一小节中的同名设置项
        assert!(matches!(
            settings.add_setting(twin, group),
            Err(SettingsError::DuplicateIdentifier(_))
        ));
        let section = settings.add_section(group, "more").unwrap();
        assert!(settings.add_setting(twin, section).is_ok());
    }

    #[test]
    fn test_setting_keys() {
        let f = fixture();
        let count = f.settings.find_property(f.count).unwrap();
        let gap = f.settings.find_property(f.gap).unwrap();
        assert_eq!(f.settings.setting_key(count).as_deref(), Some("application/count"));
        assert_eq!(f.settings.setting_key(gap).as_deref(), Some("application/display/gap"));
        assert_eq!(f.settings.property(gap).map(|p| p.name()), Some("gap"));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut source = fixture();
        modify(&mut source);
        let mut store = MemoryStore::new();
        source.settings.save(&mut store).unwrap();
        assert_eq!(store.len(), 11);

        let mut target = fixture();
        assert_ne!(snapshot(&source.settings), snapshot(&target.settings));
        let report = target.settings.load(&store).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.loaded.len(), 11);
        assert_eq!(snapshot(&source.settings), snapshot(&target.settings));
        assert_eq!(*target.settings[target.ratio].value(), 0.1 + 0.2);
    }

    #[test]
    fn test_save_is_idempotent() {
        let mut f = fixture();
        modify(&mut f);
        let mut first = MemoryStore::new();
        f.settings.save(&mut first).unwrap();
        let mut second = first.clone();
        f.settings.save(&mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_missing_keeps_value() {
        let mut f = fixture();
        let mut store = MemoryStore::new();
        store.insert("application/count", StoredValue::Int(12));
        let report = f.settings.load(&store).unwrap();

        assert_eq!(report.loaded, vec!["application/count".to_string()]);
        assert_eq!(report.missing.len(), 10);
        assert_eq!(*f.settings[f.count].value(), 12);
        assert_eq!(f.settings[f.title].value(), "untitled");
    }

    #[test]
    fn test_load_failures_do_not_abort() {
        let mut f = fixture();
        let mut store = MemoryStore::new();
        store.insert("application/count", StoredValue::String("abc".into()));
        store.insert("application/ratio", StoredValue::Double(0.25));
        store.insert("application/flag", StoredValue::Bool(true));
        let report = f.settings.load(&store).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "application/count");
        assert!(matches!(report.failures[0].error, SettingsError::Conversion { .. }));
        assert_eq!(*f.settings[f.count].value(), 50);
        assert_eq!(*f.settings[f.ratio].value(), 0.25);
        assert!(*f.settings[f.flag].value());
    }

    #[test]
    fn test_load_out_of_range_rejected() {
        let mut f = fixture();
        let mut store = MemoryStore::new();
        store.insert("application/count", StoredValue::Int(150));
        let report = f.settings.load(&store).unwrap();

        assert!(matches!(
            report.failures[0].error,
            SettingsError::Property {
                source: PropertyError::OutOfRange { .. },
                ..
            }
        ));
        assert_eq!(*f.settings[f.count].value(), 50);
    }

    #[test]
    fn test_load_from_with_exclusion() {
        let mut source = fixture();
        modify(&mut source);
        let mut store = MemoryStore::new();
        source.settings.save(&mut store).unwrap();

        let mut target = fixture();
        let report = target
            .settings
            .load_from(&store, |property| property.name() == "title")
            .unwrap();

        assert_eq!(report.excluded, vec!["application/title".to_string()]);
        assert_eq!(target.settings[target.title].value(), "untitled");
        assert_eq!(*target.settings[target.count].value(), 75);
        assert!(*target.settings[target.flag].value());
        assert_eq!(target.settings[target.gap].quantity(), Length::new(0.7));
    }

    #[test]
    fn test_save_as_with_exclusion() {
        let f = fixture();
        let mut store = MemoryStore::new();
        f.settings
            .save_as(&mut store, |property| property.kind() == crate::property::PropertyKind::Bool)
            .unwrap();
        assert_eq!(store.len(), 10);
        assert!(store.get("application/flag").is_none());
    }

    struct BrokenStore;

    impl SettingsStore for BrokenStore {
        fn value(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
            if key.ends_with("gap") {
                Err(StoreError::Backend("disk on fire".into()))
            } else {
                Ok(Some(StoredValue::Int(1)))
            }
        }

        fn set_value(&mut self, _key: &str, _value: StoredValue) -> Result<(), StoreError> {
            Err(StoreError::Backend("read only".into()))
        }

        fn keys(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_store_error_leaves_properties() {
        let mut f = fixture();
        let before = snapshot(&f.settings);
        assert!(matches!(f.settings.load(&BrokenStore), Err(SettingsError::Store(_))));
        assert_eq!(snapshot(&f.settings), before);

        assert!(f.settings.save(&mut BrokenStore).is_err());
        assert_eq!(f.settings.find_value_from_key(&BrokenStore, "x/gap"), None);
    }

    /// 指定键的值已损坏，其余键照常读取
    struct CorruptStore {
        inner: MemoryStore,
        corrupt: &'static str,
    }

    impl SettingsStore for CorruptStore {
        fn value(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
            if key == self.corrupt {
                return Err(StoreError::Value {
                    key: key.to_string(),
                    reason: "expected value at line 1 column 1".into(),
                });
            }
            self.inner.value(key)
        }

        fn set_value(&mut self, key: &str, value: StoredValue) -> Result<(), StoreError> {
            self.inner.set_value(key, value)
        }

        fn keys(&self) -> Result<Vec<String>, StoreError> {
            self.inner.keys()
        }
    }

    #[test]
    fn test_corrupt_value_does_not_abort_load() {
        let mut f = fixture();
        let mut inner = MemoryStore::new();
        inner.insert("application/flag", StoredValue::Bool(true));
        let store = CorruptStore {
            inner,
            corrupt: "application/ratio",
        };

        let report = f.settings.load(&store).unwrap();
        assert!(*f.settings[f.flag].value());
        assert_eq!(*f.settings[f.ratio].value(), 0.5);
        assert_eq!(report.loaded, vec!["application/flag".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "application/ratio");
        assert!(matches!(
            report.failures[0].error,
            SettingsError::Store(StoreError::Value { .. })
        ));
    }

    #[test]
    fn test_load_property() {
        let mut f = fixture();
        let count = f.settings.find_property(f.count).unwrap();
        let mut store = MemoryStore::new();
        assert_eq!(f.settings.load_property(&store, count).unwrap(), LoadStatus::Missing);

        store.insert("application/count", StoredValue::Int(33));
        assert_eq!(f.settings.load_property(&store, count).unwrap(), LoadStatus::Loaded);
        assert_eq!(*f.settings[f.count].value(), 33);
        assert_eq!(
            f.settings.find_value_from_key(&store, "application/count"),
            Some(StoredValue::Int(33))
        );
    }

    #[test]
    fn test_reset_order() {
        let mut f = fixture();
        modify(&mut f);
        let log = Arc::new(Mutex::new(Vec::<String>::new()));

        let sink = Arc::clone(&log);
        f.settings.subscribe(move |event, property| {
            if let PropertyEvent::Changed { .. } = event {
                sink.lock().push(format!("changed {}", property.name()));
            }
        });
        let group = f.settings.find_group("application").unwrap();
        let display = SectionIndex { group, section: 1 };
        let sink = Arc::clone(&log);
        f.settings
            .add_reset_function(display, move || sink.lock().push("section".into()))
            .unwrap();
        let sink = Arc::clone(&log);
        f.settings
            .add_reset_function(group, move || sink.lock().push("group".into()))
            .unwrap();

        f.settings.reset_section(display).unwrap();
        assert_eq!(
            *log.lock(),
            vec![
                "changed recent",
                "changed stamp",
                "changed origin",
                "changed color",
                "changed gap",
                "section",
            ]
        );
        assert_eq!(*f.settings[f.count].value(), 75);

        log.lock().clear();
        f.settings.reset_all();
        let entries = log.lock().clone();
        assert_eq!(entries.len(), 11 + 2);
        assert_eq!(entries[entries.len() - 2], "section");
        assert_eq!(entries[entries.len() - 1], "group");
        assert_eq!(*f.settings[f.count].value(), 50);
        assert_eq!(snapshot(&f.settings), snapshot(&fixture().settings));
    }

    #[test]
    fn test_events_forwarded() {
        let mut f = fixture();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        f.settings.subscribe(move |event, _| sink.lock().push(*event));

        f.settings.set_value(f.count, 10).unwrap();
        f.settings.set_enabled(f.count.into(), false).unwrap();
        assert!(f.settings.set_value(f.count, 1000).is_err());

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PropertyEvent::Changed { .. }));
        assert!(matches!(events[1], PropertyEvent::Enabled { on: false, .. }));
        assert_eq!(events[0].property_ref(), PropertyRef::from(f.count));
    }

    #[test]
    fn test_adopted_group_parent() {
        let mut settings = Settings::new();
        let id = settings.add_property_group(PropertyGroup::new());
        assert_eq!(settings.property_group(id).unwrap().parent(), Some(settings.id()));
    }

    #[test]
    fn test_locale_text_on_load() {
        let mut f = fixture();
        f.settings.set_locale(Locale::from_language_code("fr"));
        let mut store = MemoryStore::new();
        store.insert("application/ratio", StoredValue::String("0,75".into()));
        store.insert("application/display/gap", StoredValue::String("1 cm".into()));
        let report = f.settings.load(&store).unwrap();

        assert!(report.is_complete());
        assert_eq!(*f.settings[f.ratio].value(), 0.75);
        assert_eq!(f.settings[f.gap].quantity_value(), 10.0);
        let ratio = f.settings.find_property(f.ratio).unwrap();
        assert_eq!(f.settings.format_value(ratio).as_deref(), Some("0,75"));
    }
}
