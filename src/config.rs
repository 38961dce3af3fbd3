use std::path::PathBuf;
use std::time::Duration;
use log::{warn, LevelFilter};

pub const DEFAULT_LOGIN_URL: &str =
    "https://sfzt.ycu.edu.cn/auth/#/login?service=https://jwxt.ycu.edu.cn/sso/sxcjlogin";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_WECHAT_API_BASE: &str = "https://api.weixin.qq.com";
pub const DEFAULT_GRADES_FILE: &str = "grades.json";
pub const DEFAULT_TABLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Portal login used by the fetcher.
#[derive(Debug, Clone, Default)]
pub struct PortalConfig {
    pub student_id: Option<String>,
    pub password: Option<String>,
    pub login_url: String,
    pub webdriver_url: String,
    pub headless: bool,
    pub table_timeout: Duration,
}

/// Official account credentials and message routing used by the notifier.
#[derive(Debug, Clone, Default)]
pub struct WechatConfig {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub open_id: Option<String>,
    pub template_id: Option<String>,
    pub template_url: String,
    pub api_base: String,
}

/// Everything a run needs, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub portal: PortalConfig,
    pub wechat: WechatConfig,
    pub grades_file: PathBuf,
    pub log_level: LevelFilter,
    pub strict_exit: bool,
}

impl Config {
    /// Reads the process environment. Call `dotenv()` beforehand to pick up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as missing.
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let headless = match get("HEADLESS") {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warn!("Ignoring HEADLESS={raw:?}, expected true or false");
                true
            }),
            None => true,
        };

        let table_timeout = match get("TABLE_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!("Ignoring TABLE_TIMEOUT_SECS={raw:?}, using {}s", DEFAULT_TABLE_TIMEOUT.as_secs());
                    DEFAULT_TABLE_TIMEOUT
                }
            },
            None => DEFAULT_TABLE_TIMEOUT,
        };

        let log_level = match get("LOG_LEVEL") {
            Some(raw) => raw.parse::<LevelFilter>().unwrap_or_else(|_| {
                warn!("Ignoring LOG_LEVEL={raw:?}, using info");
                LevelFilter::Info
            }),
            None => LevelFilter::Info,
        };

        let strict_exit = get("STRICT_EXIT").and_then(|raw| parse_bool(&raw)).unwrap_or(false);

        Config {
            portal: PortalConfig {
                student_id: get("STU_ID"),
                password: get("STU_PWD"),
                login_url: get("PORTAL_LOGIN_URL").unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string()),
                webdriver_url: get("WEBDRIVER_URL").unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
                headless,
                table_timeout,
            },
            wechat: WechatConfig {
                app_id: get("WX_APPID"),
                app_secret: get("WX_SECRET"),
                open_id: get("WX_OPENID"),
                template_id: get("WX_TEMPLATE_ID"),
                template_url: get("WX_TEMPLATE_URL").unwrap_or_default(),
                api_base: get("WX_API_BASE")
                    .map(|base| base.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_WECHAT_API_BASE.to_string()),
            },
            grades_file: get("GRADES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GRADES_FILE)),
            log_level,
            strict_exit,
        }
    }
}

/// Level for the logger, read before the logger exists. `Config::from_lookup` reads the
/// same key and reports a bad value once logging is up.
pub fn log_level_from_env() -> LevelFilter {
    log_level_from_lookup(|key| std::env::var(key).ok())
}

pub fn log_level_from_lookup<F>(lookup: F) -> LevelFilter
where
    F: Fn(&str) -> Option<String>,
{
    lookup("LOG_LEVEL")
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
