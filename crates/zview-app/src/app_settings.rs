//! 应用程序设置

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use zview_core::property::{
    PropertyGroup, PropertyInt, PropertyKey, PropertyString, PropertyStringList,
};
use zview_core::settings::{Settings, SettingsStore};
use zview_file::dxf_io::{DxfReaderOptions, DxfReaderParameterKeys, DxfReaderParameters};
use zview_file::{JsonFileStore, SqliteStore};

/// 应用设置及其属性键
pub struct AppSettings {
    pub settings: Settings,
    pub language: PropertyKey<PropertyString>,
    pub recent_files: PropertyKey<PropertyStringList>,
    pub max_recent_files: PropertyKey<PropertyInt>,
    pub dxf: DxfReaderParameterKeys,
}

impl AppSettings {
    pub fn new() -> Result<Self> {
        let mut group = PropertyGroup::new();
        let language = group.add(
            PropertyString::new("language", Settings::default_locale_language_code())
                .with_label("Language"),
        )?;
        let recent_files = group.add(
            PropertyStringList::new("recent_files", Vec::new())
                .with_label("Recent files")
                .with_user_visible(false),
        )?;
        let max_recent_files = group.add(
            PropertyInt::new("max_recent_files", 10)
                .with_constraints(0, 50, 1)
                .with_label("Maximum recent files"),
        )?;

        let mut settings = Settings::new();
        settings.add_property_group(group);

        let application = settings.add_group("application")?;
        settings.set_group_title(application, "Application")?;
        settings.add_setting(language, application)?;
        settings.add_setting(recent_files, application)?;
        settings.add_setting(max_recent_files, application)?;

        let import = settings.add_group("import")?;
        settings.set_group_title(import, "Import")?;
        let dxf_section = settings.add_section(import, "dxf")?;
        settings.set_section_title(dxf_section, "DXF")?;
        let dxf = DxfReaderParameters::new()?.register(&mut settings, dxf_section)?;

        settings.add_reset_function(application, || {
            tracing::info!("Application settings restored to defaults");
        })?;

        Ok(Self {
            settings,
            language,
            recent_files,
            max_recent_files,
            dxf,
        })
    }

    pub fn dxf_options(&self) -> DxfReaderOptions {
        self.dxf
            .options_from_settings(&self.settings)
            .unwrap_or_default()
    }

    /// 记录最近打开的文件，列表长度受 `max_recent_files` 限制
    pub fn add_recent_file(&mut self, path: &Path) -> Result<()> {
        let entry = path.display().to_string();
        let limit = usize::try_from(*self.settings[self.max_recent_files].value()).unwrap_or(0);

        let mut files: Vec<String> = self.settings[self.recent_files]
            .value()
            .iter()
            .filter(|f| **f != entry)
            .cloned()
            .collect();
        files.insert(0, entry);
        files.truncate(limit);

        self.settings.set_value(self.recent_files, files)?;
        Ok(())
    }
}

/// 默认设置文件位置
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("zview")
        .join("settings.json")
}

/// 按扩展名打开存储：`.sqlite`/`.db` 为SQLite，其余为JSON
pub fn open_store(path: &Path) -> Result<Box<dyn SettingsStore>> {
    let sqlite = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("sqlite") | Some("db")
    );
    let store: Box<dyn SettingsStore> = if sqlite {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Box::new(SqliteStore::open(path)?)
    } else {
        Box::new(JsonFileStore::open(path)?)
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_files_are_capped() {
        let mut app = AppSettings::new().unwrap();
        app.settings.set_value(app.max_recent_files, 2).unwrap();

        app.add_recent_file(Path::new("a.dxf")).unwrap();
        app.add_recent_file(Path::new("b.dxf")).unwrap();
        app.add_recent_file(Path::new("a.dxf")).unwrap();
        app.add_recent_file(Path::new("c.dxf")).unwrap();

        assert_eq!(
            app.settings[app.recent_files].value(),
            &vec!["c.dxf".to_string(), "a.dxf".to_string()]
        );
    }

    #[test]
    fn test_store_selected_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = AppSettings::new().unwrap();
        app.settings.set_value(app.dxf.scaling, 25.4).unwrap();

        for name in ["settings.json", "settings.sqlite"] {
            let path = dir.path().join(name);
            let mut store = open_store(&path).unwrap();
            app.settings.save(store.as_mut()).unwrap();

            let mut fresh = AppSettings::new().unwrap();
            let store = open_store(&path).unwrap();
            fresh.settings.load(store.as_ref()).unwrap();
            assert_eq!(fresh.dxf_options().scaling, 25.4);
        }
    }
}
