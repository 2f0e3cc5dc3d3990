//! UI string lookup
//!
//! A [`Localizer`] is built once from the `language` setting and handed to
//! whatever builds user-visible text (tray menu, about box). Lookups fall back
//! to English, then to the key itself.

use heartbeat_types::LANGUAGE_AUTO;
use phf::phf_map;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Chinese,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Chinese];

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lang| lang.code() == code)
    }

    /// Map a locale tag such as `zh-CN` or `en_US`.
    pub fn from_locale(locale: &str) -> Self {
        if locale.to_ascii_lowercase().starts_with("zh") {
            Language::Chinese
        } else {
            Language::English
        }
    }

    fn table(self) -> &'static phf::Map<&'static str, &'static str> {
        match self {
            Language::English => &EN,
            Language::Chinese => &ZH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Localizer {
    language: Language,
}

impl Localizer {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    /// Resolve the `language` setting; `"auto"` and unknown codes follow the
    /// system locale.
    pub fn from_setting(setting: &str) -> Self {
        let language = match Language::from_code(setting) {
            Some(language) if setting != LANGUAGE_AUTO => language,
            _ => detect_system_language(),
        };
        tracing::info!(language = language.code(), setting, "language initialized");
        Self::new(language)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Translate `key`: requested language, then English, then `key` itself.
    pub fn t<'a>(&self, key: &'a str) -> &'a str {
        self.language
            .table()
            .get(key)
            .or_else(|| EN.get(key))
            .copied()
            .unwrap_or(key)
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(Language::English)
    }
}

fn detect_system_language() -> Language {
    sys_locale::get_locale()
        .map(|locale| Language::from_locale(&locale))
        .unwrap_or(Language::English)
}

// ─────────────────────────────────────────────────────────────────────────────
// String tables
// ─────────────────────────────────────────────────────────────────────────────

static EN: phf::Map<&'static str, &'static str> = phf_map! {
    "tray.tooltip" => "Heartbeat",
    "tray.show" => "Show",
    "tray.hide" => "Hide",
    "tray.move_enable" => "Enable Move Mode",
    "tray.move_disable" => "Disable Move Mode",
    "tray.settings" => "Settings",
    "tray.about" => "About",
    "tray.exit" => "Exit",
    "about.title" => "About",
    "about.app_name" => "Heartbeat",
    "about.version" => "Version",
    "about.description" => "A visual heartbeat to detect\nsilent remote session freezes and connection drops.",
};

static ZH: phf::Map<&'static str, &'static str> = phf_map! {
    "tray.show" => "显示",
    "tray.hide" => "隐藏",
    "tray.move_enable" => "拖动模式",
    "tray.move_disable" => "锁定位置",
    "tray.settings" => "设置",
    "tray.about" => "关于",
    "tray.exit" => "退出",
    "about.title" => "关于",
    "about.version" => "版本",
    "about.description" => "用于检测远程桌面\n连接中断的可视化心跳工具。",
};
