//! DXF导入参数
//!
//! 参数以属性组的形式存在，可以直接注册进 [`Settings`] 持久化。

use zview_core::property::{
    PropertyBool, PropertyDouble, PropertyError, PropertyGroup, PropertyKey,
};
use zview_core::settings::{Settings, SettingsError, SettingsScope};

/// 导入时实际使用的参数快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DxfReaderOptions {
    /// 统一长度缩放系数
    pub scaling: f64,
    /// 导入文字和尺寸标注
    pub import_annotations: bool,
    /// 每个图层合并为一个组合形状
    pub group_layers: bool,
}

impl Default for DxfReaderOptions {
    fn default() -> Self {
        Self {
            scaling: 1.0,
            import_annotations: true,
            group_layers: false,
        }
    }
}

/// 参数属性的类型化键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DxfReaderParameterKeys {
    pub scaling: PropertyKey<PropertyDouble>,
    pub import_annotations: PropertyKey<PropertyBool>,
    pub group_layers: PropertyKey<PropertyBool>,
}

impl DxfReaderParameterKeys {
    /// 从属性组读取快照
    pub fn options(&self, group: &PropertyGroup) -> Option<DxfReaderOptions> {
        Some(DxfReaderOptions {
            scaling: *group.get(self.scaling)?.value(),
            import_annotations: *group.get(self.import_annotations)?.value(),
            group_layers: *group.get(self.group_layers)?.value(),
        })
    }

    /// 从设置读取快照（参数组已被设置接管时）
    pub fn options_from_settings(&self, settings: &Settings) -> Option<DxfReaderOptions> {
        Some(DxfReaderOptions {
            scaling: *settings.get(self.scaling)?.value(),
            import_annotations: *settings.get(self.import_annotations)?.value(),
            group_layers: *settings.get(self.group_layers)?.value(),
        })
    }
}

/// DXF导入参数组
#[derive(Debug)]
pub struct DxfReaderParameters {
    group: PropertyGroup,
    keys: DxfReaderParameterKeys,
}

impl DxfReaderParameters {
    pub const MIN_SCALING: f64 = 1e-6;
    pub const MAX_SCALING: f64 = 1e6;

    pub fn new() -> Result<Self, PropertyError> {
        let defaults = DxfReaderOptions::default();
        let mut group = PropertyGroup::new();

        let scaling = group.add(
            PropertyDouble::new("scaling", defaults.scaling)
                .with_constraints(Self::MIN_SCALING, Self::MAX_SCALING, 0.1)
                .with_label("Scaling")
                .with_description("Uniform scale factor applied to every imported coordinate"),
        )?;
        let import_annotations = group.add(
            PropertyBool::new("import_annotations", defaults.import_annotations)
                .with_label("Import annotations")
                .with_description("Import texts and dimensions"),
        )?;
        let group_layers = group.add(
            PropertyBool::new("group_layers", defaults.group_layers)
                .with_label("Group layers")
                .with_description("Create one compound shape per layer"),
        )?;

        Ok(Self {
            group,
            keys: DxfReaderParameterKeys {
                scaling,
                import_annotations,
                group_layers,
            },
        })
    }

    pub fn group(&self) -> &PropertyGroup {
        &self.group
    }

    pub fn group_mut(&mut self) -> &mut PropertyGroup {
        &mut self.group
    }

    pub fn keys(&self) -> DxfReaderParameterKeys {
        self.keys
    }

    pub fn scaling(&self) -> f64 {
        self.group.get(self.keys.scaling).map_or(1.0, |p| *p.value())
    }

    /// 超出范围时拒绝并保留原值
    pub fn set_scaling(&mut self, scaling: f64) -> Result<(), PropertyError> {
        self.group.set_value(self.keys.scaling, scaling)
    }

    pub fn set_import_annotations(&mut self, on: bool) -> Result<(), PropertyError> {
        self.group.set_value(self.keys.import_annotations, on)
    }

    pub fn set_group_layers(&mut self, on: bool) -> Result<(), PropertyError> {
        self.group.set_value(self.keys.group_layers, on)
    }

    /// 当前值快照
    pub fn options(&self) -> DxfReaderOptions {
        self.keys.options(&self.group).unwrap_or_default()
    }

    /// 交给设置接管，三个属性注册到 `scope` 下
    pub fn register(
        self,
        settings: &mut Settings,
        scope: impl Into<SettingsScope>,
    ) -> Result<DxfReaderParameterKeys, SettingsError> {
        let scope = scope.into();
        let keys = self.keys;
        settings.add_property_group(self.group);
        settings.add_setting(keys.scaling, scope)?;
        settings.add_setting(keys.import_annotations, scope)?;
        settings.add_setting(keys.group_layers, scope)?;
        Ok(keys)
    }
}
