//! Byte sizes: config strings in, labels out.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};

/// Recognised suffixes, upper-cased. Longer suffixes come first so "KIB"
/// is not read as "KI" + "B".
const SUFFIXES: &[(&str, u64)] = &[
    ("KIB", 1 << 10),
    ("MIB", 1 << 20),
    ("GIB", 1 << 30),
    ("TIB", 1 << 40),
    ("KI", 1 << 10),
    ("MI", 1 << 20),
    ("GI", 1 << 30),
    ("TI", 1 << 40),
    ("KB", 1_000),
    ("MB", 1_000_000),
    ("GB", 1_000_000_000),
    ("TB", 1_000_000_000_000),
    ("K", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
    ("T", 1_000_000_000_000),
    ("B", 1),
];

/// Bytes for "4MiB", "64KiB", "1.5M", "512B" or a bare integer.
/// Suffixes are case-insensitive; `Ki`/`KiB` are powers of two, `K`/`KB`
/// powers of ten.
pub fn parse_size(input: &str) -> Result<u64> {
    let upper = input.trim().to_ascii_uppercase();
    let (amount, scale) = SUFFIXES
        .iter()
        .find_map(|&(suffix, scale)| upper.strip_suffix(suffix).map(|rest| (rest.trim_end(), scale)))
        .unwrap_or((upper.as_str(), 1));

    if amount.is_empty() {
        bail!("size {:?} has no number", input);
    }
    if let Ok(whole) = amount.parse::<u64>() {
        return whole
            .checked_mul(scale)
            .with_context(|| format!("size {:?} overflows u64", input));
    }
    let value: f64 = amount
        .parse()
        .with_context(|| format!("invalid size {:?}", input))?;
    if !value.is_finite() || value < 0.0 {
        bail!("invalid size {:?}", input);
    }
    Ok((value * scale as f64).round() as u64)
}

/// Exact label for object keys: the largest binary unit that divides
/// `bytes`, otherwise plain bytes. Distinct sizes never share a label.
pub fn size_label(bytes: u64) -> String {
    for (unit, scale) in [("TB", 1u64 << 40), ("GB", 1 << 30), ("MB", 1 << 20), ("KB", 1 << 10)] {
        if bytes >= scale && bytes % scale == 0 {
            return format!("{}{}", bytes / scale, unit);
        }
    }
    format!("{}B", bytes)
}

/// Human-readable, 1024-based size for logs and reports:
/// `1024` → `1KB`, `4194304` → `4MB`, `1536` → `1.5KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [(&str, u64); 4] = [
        ("TB", 1 << 40),
        ("GB", 1 << 30),
        ("MB", 1 << 20),
        ("KB", 1 << 10),
    ];

    for (unit, scale) in UNITS {
        if bytes >= scale {
            return if bytes % scale == 0 {
                format!("{}{}", bytes / scale, unit)
            } else {
                format!("{:.1}{}", bytes as f64 / scale as f64, unit)
            };
        }
    }
    format!("{}B", bytes)
}

/// Deserialize a list of sizes where each entry is a number or a string with suffix
pub fn deserialize_sizes<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeValue {
        Number(u64),
        String(String),
    }

    Vec::<SizeValue>::deserialize(deserializer)?
        .into_iter()
        .map(|v| match v {
            SizeValue::Number(n) => Ok(n),
            SizeValue::String(s) => parse_size(&s).map_err(serde::de::Error::custom),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_numbers() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_decimal_and_binary() {
        assert_eq!(parse_size("1KB").unwrap(), 1_000);
        assert_eq!(parse_size("1k").unwrap(), 1_000);
        assert_eq!(parse_size("4MB").unwrap(), 4_000_000);
        assert_eq!(parse_size("1KiB").unwrap(), 1_024);
        assert_eq!(parse_size("4mib").unwrap(), 4_194_304);
        assert_eq!(parse_size("1Gi").unwrap(), 1_073_741_824);
        assert_eq!(parse_size("512B").unwrap(), 512);
    }

    #[test]
    fn test_parse_fractional_and_whitespace() {
        assert_eq!(parse_size("1.5KiB").unwrap(), 1_536);
        assert_eq!(parse_size("  8MB  ").unwrap(), 8_000_000);
    }

    #[test]
    fn test_errors() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("-1MB").is_err());
        assert!(parse_size("1XB").is_err());
        assert!(parse_size("inf").is_err());
        assert!(parse_size("99999999999TiB").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1024), "1KB");
        assert_eq!(format_size(64 * 1024), "64KB");
        assert_eq!(format_size(1536), "1.5KB");
        assert_eq!(format_size(4 * 1024 * 1024), "4MB");
        assert_eq!(format_size(1 << 30), "1GB");
    }

    #[test]
    fn test_size_label_is_exact() {
        assert_eq!(size_label(1024), "1KB");
        assert_eq!(size_label(4 * 1024 * 1024), "4MB");
        assert_eq!(size_label(1536), "1536B");
        assert_eq!(size_label(1536 * 1024), "1536KB");
        assert_eq!(size_label(512), "512B");

        // both round to "1.0KB" for display
        assert_eq!(format_size(1025), format_size(1030));
        assert_ne!(size_label(1025), size_label(1030));
    }

    #[test]
    fn test_deserialize_mixed_list() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "deserialize_sizes")]
            sizes: Vec<u64>,
        }
        let h: Holder = serde_yaml::from_str("sizes: [1024, \"64KiB\", \"4MiB\"]").unwrap();
        assert_eq!(h.sizes, vec![1024, 65_536, 4_194_304]);

        let bad: Result<Holder, _> = serde_yaml::from_str("sizes: [\"4XB\"]");
        assert!(bad.is_err());
    }
}
