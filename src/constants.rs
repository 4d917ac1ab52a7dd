pub const RECOMPUTE_DEBOUNCE_MS: u64 = 120;
pub const WEBVIEW_REFRESH_MS: u64 = 30;

pub const NEW_FILTER_PATTERN: &str = "New Filter";
pub const NEW_FILTER_FOREGROUND: &str = "#663232ff";
pub const NEW_FILTER_BACKGROUND: &str = "#d35b5bff";

pub const EXAMPLE_FOREGROUND: &str = "#dcafafff";
pub const EXAMPLE_BACKGROUND: &str = "#433c3cff";

pub const DEFAULT_SETTINGS_FILE: &str = ".highlight-filters.json";
pub const DEFAULT_EXPORT_FILE: &str = "highlight-filters-config.json";

pub const POLL_INTERVAL_MS: u64 = 50;

pub const LINE_NUMBER_WIDTH: usize = 9;
pub const GROUPS_PANEL_HEIGHT: u16 = 6;
pub const INPUT_FIELD_HEIGHT: u16 = 3;
pub const STATUS_BAR_HEIGHT: u16 = 1;

pub const CONFIRM_POPUP_WIDTH: u16 = 50;
pub const CONFIRM_POPUP_HEIGHT: u16 = 5;
