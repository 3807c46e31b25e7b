//! 附件文本解码
//!
//! 工单附件来自各种平台，不能假定都是 UTF-8。解码顺序：
//! 1. BOM 嗅探（UTF-8 / UTF-16LE / UTF-16BE）
//! 2. 严格 UTF-8
//! 3. UTF-8 lossy（无效字节替换为 `\u{FFFD}`），无效占比不高时采用
//! 4. 无效占比 >30% 时回退 GBK，再回退 Windows-1252
//!
//! 解码永不失败：日志精简只关心尽可能多地保留可读文本。

use encoding_rs::{Encoding, GBK, UTF_8, WINDOWS_1252};
use std::borrow::Cow;
use tracing::debug;

/// lossy 结果中替换字符占比超过该值时尝试其它编码
const FALLBACK_INVALID_RATIO: f64 = 0.3;

/// 实际采用的解码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Utf8Lossy,
    Gbk,
    Windows1252,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf8Bom => "UTF-8 (BOM)",
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::Utf16Be => "UTF-16BE",
            TextEncoding::Utf8Lossy => "UTF-8-Lossy",
            TextEncoding::Gbk => "GBK",
            TextEncoding::Windows1252 => "Windows-1252",
        }
    }

    /// 是否偏离了严格 UTF-8
    pub fn is_fallback(&self) -> bool {
        matches!(self, TextEncoding::Gbk | TextEncoding::Windows1252)
    }
}

/// 解码结果
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
    /// 原始字节中是否存在无效序列
    pub had_errors: bool,
}

fn from_bom(bytes: &[u8]) -> Option<DecodedText> {
    let (encoding, bom_len) = Encoding::for_bom(bytes)?;
    let kind = if encoding == UTF_8 {
        TextEncoding::Utf8Bom
    } else if encoding == encoding_rs::UTF_16LE {
        TextEncoding::Utf16Le
    } else {
        TextEncoding::Utf16Be
    };

    let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
    Some(DecodedText {
        text: text.into_owned(),
        encoding: kind,
        had_errors,
    })
}

/// 解码日志附件内容
pub fn decode_log_content(bytes: &[u8]) -> DecodedText {
    if let Some(decoded) = from_bom(bytes) {
        return decoded;
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText {
            text: text.to_string(),
            encoding: TextEncoding::Utf8,
            had_errors: false,
        };
    }

    let lossy: Cow<'_, str> = String::from_utf8_lossy(bytes);
    let replacements = lossy.chars().filter(|&c| c == '\u{FFFD}').count();
    let invalid_ratio = replacements as f64 / lossy.chars().count().max(1) as f64;

    if invalid_ratio <= FALLBACK_INVALID_RATIO {
        return DecodedText {
            text: lossy.into_owned(),
            encoding: TextEncoding::Utf8Lossy,
            had_errors: true,
        };
    }

    let (gbk, _, gbk_errors) = GBK.decode(bytes);
    if !gbk_errors {
        debug!(invalid_ratio, "Content decoded as GBK");
        return DecodedText {
            text: gbk.into_owned(),
            encoding: TextEncoding::Gbk,
            had_errors: true,
        };
    }

    debug!(invalid_ratio, "Content decoded as Windows-1252");
    let (win, _, _) = WINDOWS_1252.decode(bytes);
    DecodedText {
        text: win.into_owned(),
        encoding: TextEncoding::Windows1252,
        had_errors: true,
    }
}
