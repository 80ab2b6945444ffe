use chrono::{DateTime, FixedOffset, Local};

/// 东八区偏移秒数
pub const BJ_OFFSET_SECONDS: i32 = 8 * 3600;

/// 返回东八区 `FixedOffset` 对象
#[inline]
pub fn bj_offset() -> FixedOffset {
    FixedOffset::east_opt(BJ_OFFSET_SECONDS).expect("Valid offset")
}

/// 当前北京时间 `DateTime<FixedOffset>`
#[inline]
pub fn now_bj() -> DateTime<FixedOffset> {
    Local::now().with_timezone(&bj_offset())
}

/// 诊断日志使用的 "HH:mm:ss" 时间戳
///
/// 连接错误/读取错误/写入错误的日志行统一携带本格式的时间前缀
#[inline]
pub fn timestamp_hms() -> String {
    now_bj().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_hms_format() {
        let ts = timestamp_hms();
        // HH:MM:SS 固定8字符，两个冒号
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.matches(':').count(), 2);
    }
}
