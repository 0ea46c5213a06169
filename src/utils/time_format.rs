//! 未读计时显示格式化
//!
//! 将经过的秒数格式化为 `MM:SS`，超过一小时为 `HH:MM:SS`。负数按 0 处理。

/// 格式化经过的秒数
///
/// ```
/// use oa_console_core::utils::format_elapsed;
///
/// assert_eq!(format_elapsed(125), "02:05");
/// assert_eq!(format_elapsed(3661), "01:01:01");
/// assert_eq!(format_elapsed(-5), "00:00");
/// ```
pub fn format_elapsed(total_seconds: i64) -> String {
    let total = total_seconds.max(0);

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 浮点秒数版本：NaN 与负数视为 0，小数部分向下取整
pub fn format_elapsed_f64(total_seconds: f64) -> String {
    if total_seconds.is_nan() || total_seconds <= 0.0 {
        return format_elapsed(0);
    }
    // 超出 i64 的值按饱和转换处理
    format_elapsed(total_seconds.floor() as i64)
}
