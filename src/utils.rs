//! 控制台日志、panic hook 与时间源。

use web_sys::js_sys::Date;

macro_rules! console_log {
    ($($arg:tt)*) => {
        $crate::utils::log_info(&format!($($arg)*))
    };
}

macro_rules! console_warn {
    ($($arg:tt)*) => {
        $crate::utils::log_warn(&format!($($arg)*))
    };
}

macro_rules! console_error {
    ($($arg:tt)*) => {
        $crate::utils::log_error(&format!($($arg)*))
    };
}

pub(crate) use {console_error, console_log, console_warn};

pub fn log_info(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&message.into());
    #[cfg(not(target_arch = "wasm32"))]
    tracing::info!(target: "tictactoe", "{message}");
}

pub fn log_warn(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&message.into());
    #[cfg(not(target_arch = "wasm32"))]
    tracing::warn!(target: "tictactoe", "{message}");
}

pub fn log_error(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::error_1(&message.into());
    #[cfg(not(target_arch = "wasm32"))]
    tracing::error!(target: "tictactoe", "{message}");
}

#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}

/// ISO-8601 时间戳来源。高分榜按时间字符串排序，所以实现必须输出同一格式。
pub trait Clock {
    fn now_iso(&self) -> String;
}

/// 浏览器时间（`Date.prototype.toISOString`）。
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now_iso(&self) -> String {
        Date::new_0().to_iso_string().into()
    }
}

/// 与页面 `textContent -> innerHTML` 相同的转义。
pub fn sanitize_input(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_escapes_markup() {
        assert_eq!(
            sanitize_input("<b>Ann & Bob</b>"),
            "&lt;b&gt;Ann &amp; Bob&lt;/b&gt;"
        );
        assert_eq!(sanitize_input("Ann"), "Ann");
    }
}
