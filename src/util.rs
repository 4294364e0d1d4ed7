use crate::errors::Result;
use log::{debug, warn};
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// 规范化抓取到的代码：取第一个空白分隔的片段，转大写
pub fn clean_symbol(raw: &str) -> String {
    raw.split_whitespace()
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase()
}

/// Parses numbers as rendered by finance pages: `1,234.5`, `+24.91%`,
/// `−3.2` (U+2212) and accounting style `(3.2)`.
pub fn parse_number(text: &str) -> Option<f64> {
    let mut cleaned: String = text
        .trim()
        .replace('\u{2212}', "-")
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | '+') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() > 2 {
        cleaned = format!("-{}", &cleaned[1..cleaned.len() - 1]);
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 从 "price+change(+%)" 之类的文本中提取第一个带符号数字
pub fn first_signed_number(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NUMBER
        .get_or_init(|| Regex::new(r"[+-]?\d[\d,]*\.?\d*").ok())
        .as_ref()?;
    let normalized = text.replace('\u{2212}', "-");
    let found = re.find(&normalized)?;
    parse_number(found.as_str())
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Long-side intraday return in percent, rounded to 2 decimals.
/// `None` when open is zero.
pub fn pct_long(open: f64, close: f64) -> Option<f64> {
    if open == 0.0 {
        return None;
    }
    Some(round_to((close - open) / open * 100.0, 2))
}

pub fn fmt_pct(value: Option<f64>) -> String {
    value.map(|v| format!("{:+.2}%", v)).unwrap_or_default()
}

pub fn fmt_points(value: Option<f64>) -> String {
    value.map(|v| format!("{:+.2}", v)).unwrap_or_default()
}

pub fn fmt_price(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// 原子写入：先写入 `<file>.tmp`，落盘后重命名覆盖目标文件。
/// 失败时删除临时文件，原文件保持不变。
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path_for(path);
    let written = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if let Err(e) = written {
        if tmp.exists() {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!("Failed to remove temp file {}: {}", tmp.display(), cleanup);
            }
        }
        return Err(e);
    }

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
