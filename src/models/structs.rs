use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::utils::error::AppError;

/// PLC位地址
///
/// 逻辑位地址三元组（DB块号、字节偏移、位偏移），从文本格式
/// "DB<块>.DBX<字节>.<位>" 解析而来。解析后不可变，仅在解析写请求时
/// 临时使用。例：DB1.DBX0.0 表示 DB1 块第0字节的第0位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlcBitAddress {
    /// DB块号
    pub db: u16,
    /// 字节偏移
    pub byte: u16,
    /// 位偏移（0..=7）
    pub bit: u8,
}

impl PlcBitAddress {
    /// 从字节中取出本地址指向的位
    #[inline]
    pub fn extract(&self, byte: u8) -> bool {
        byte & (1u8 << self.bit) != 0
    }

    /// 将值写入缓冲字节中本地址指向的位
    #[inline]
    pub fn apply(&self, buffer: &mut u8, value: bool) {
        if value {
            *buffer |= 1u8 << self.bit;
        } else {
            *buffer &= !(1u8 << self.bit);
        }
    }
}

impl FromStr for PlcBitAddress {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |message: &str| AppError::address_format_error(s, message);

        let mut parts = s.split('.');
        let (db_part, byte_part, bit_part) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(a), Some(b), Some(c), None) => (a, b, c),
                _ => return Err(err("期望 DB<块>.DBX<字节>.<位> 三段格式")),
            };

        let db = db_part
            .strip_prefix("DB")
            .ok_or_else(|| err("缺少 DB 前缀"))?
            .parse::<u16>()
            .map_err(|_| err("DB块号不是有效整数"))?;

        let byte = byte_part
            .strip_prefix("DBX")
            .ok_or_else(|| err("缺少 DBX 前缀"))?
            .parse::<u16>()
            .map_err(|_| err("字节偏移不是有效整数"))?;

        let bit = bit_part
            .parse::<u8>()
            .map_err(|_| err("位偏移不是有效整数"))?;
        if bit > 7 {
            return Err(err("位偏移必须在 0..=7 范围内"));
        }

        Ok(Self { db, byte, bit })
    }
}

impl std::fmt::Display for PlcBitAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DB{}.DBX{}.{}", self.db, self.byte, self.bit)
    }
}

/// 扫描统计信息
///
/// 纯观测字段，仅用于健康诊断，不参与控制流程
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// 成功读取次数
    pub successful_reads: u64,
    /// 失败读取次数
    pub failed_reads: u64,
    /// 成功写入次数
    pub successful_writes: u64,
    /// 失败写入次数
    pub failed_writes: u64,
    /// 最后一次成功扫描时间
    pub last_scan_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 规范格式地址解析
    #[test]
    fn test_parse_valid_addresses() {
        let addr: PlcBitAddress = "DB1.DBX0.0".parse().unwrap();
        assert_eq!(addr, PlcBitAddress { db: 1, byte: 0, bit: 0 });

        let addr: PlcBitAddress = "DB10.DBX3.5".parse().unwrap();
        assert_eq!(addr, PlcBitAddress { db: 10, byte: 3, bit: 5 });

        // Display 与文本语法一致，可往返
        assert_eq!(addr.to_string(), "DB10.DBX3.5");
    }

    /// 非法地址必须返回格式错误而不是崩溃
    #[test]
    fn test_parse_malformed_addresses() {
        let cases = [
            "DBX.0.0",
            "DB1.0.0",
            "",
            "DB1.DBX0",
            "DB1.DBX0.0.0",
            "DB1.DBX0.8",
            "DBa.DBX0.0",
            "DB1.DBXb.0",
        ];
        for case in cases {
            let result = case.parse::<PlcBitAddress>();
            assert!(
                matches!(result, Err(AppError::AddressFormatError { .. })),
                "地址 {:?} 应当解析失败",
                case
            );
        }
    }

    #[test]
    fn test_bit_extract_and_apply() {
        let addr: PlcBitAddress = "DB1.DBX0.3".parse().unwrap();
        assert!(!addr.extract(0b0000_0000));
        assert!(addr.extract(0b0000_1000));

        let mut buffer = 0u8;
        addr.apply(&mut buffer, true);
        assert_eq!(buffer, 0b0000_1000);
        addr.apply(&mut buffer, false);
        assert_eq!(buffer, 0);
    }
}
