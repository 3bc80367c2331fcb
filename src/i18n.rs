// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持中文（默认）和英文；告警与权限提示走这里
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 支持的语言
pub const SUPPORTED_LOCALES: [&str; 2] = ["zh-CN", "en"];

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 返回
/// - false: 不支持的语言代码，保持当前语言不变
pub fn set_locale(locale: &str) -> bool {
    match SUPPORTED_LOCALES.iter().find(|l| l.eq_ignore_ascii_case(locale.trim())) {
        Some(supported) => {
            rust_i18n::set_locale(supported);
            true
        }
        None => {
            tracing::warn!(locale = locale, "不支持的语言代码，忽略");
            false
        }
    }
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use print_stock::i18n::t;
/// let msg = t("common.success");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数，替换 `%{name}` 占位符）
///
/// # 示例
/// ```no_run
/// use print_stock::i18n::t_with_args;
/// let msg = t_with_args("alert.filament_low", &[("sku", "PLA-RED"), ("free", "120"), ("reorder", "200")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // rust-i18n 的 locale 为全局状态，且 Rust 测试默认并行执行；
    // 为避免测试互相干扰，这里对 i18n 相关测试串行化。
    static LOCALE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_set_locale() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        assert!(set_locale("en"));
        assert_eq!(current_locale(), "en");

        // 不支持的语言保持不变
        assert!(!set_locale("fr"));
        assert_eq!(current_locale(), "en");

        assert!(set_locale("ZH-cn"));
        assert_eq!(current_locale(), "zh-CN");
    }

    #[test]
    fn test_translate_simple() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("zh-CN");
        assert_eq!(t("common.success"), "操作成功");

        set_locale("en");
        assert_eq!(t("common.success"), "Operation successful");

        set_locale("zh-CN");
    }

    #[test]
    fn test_translate_with_args() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("zh-CN");
        let msg = t_with_args(
            "alert.filament_low",
            &[("sku", "PLA-RED"), ("free", "120"), ("reorder", "200")],
        );
        assert!(msg.contains("PLA-RED"));
        assert!(msg.contains("120g"));
        assert!(!msg.contains("%{"));

        set_locale("en");
        let msg = t_with_args("alert.machine_maintenance", &[("machine", "P1")]);
        assert_eq!(msg, "Machine P1 is under maintenance");

        set_locale("zh-CN");
    }
}
