// SPDX-License-Identifier: MIT

pub fn pretty_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut val = n as f64;
    let mut idx = 0usize;
    while val >= 1024.0 && idx + 1 < UNITS.len() {
        val /= 1024.0;
        idx += 1;
    }
    if idx == 0 {
        format!("{} {}", sep_u64(n), UNITS[idx])
    } else {
        format!("{:.1} {}", val, UNITS[idx])
    }
}

pub fn sep_u64(mut n: u64) -> String {
    // thousands separator: 12 345 678
    if n < 1_000 {
        return n.to_string();
    }
    let mut parts: Vec<String> = Vec::new();
    while n >= 1_000 {
        parts.push(format!("{:03}", (n % 1_000)));
        n /= 1_000;
    }
    parts.push(n.to_string());
    parts.reverse();
    parts.join(" ")
}

/// Parses `8192`, `64K` or `16M` into bytes.
pub fn parse_size(size: &str) -> anyhow::Result<u32> {
    let lower = size.trim().to_lowercase();

    let bytes = if let Some(num) = lower.strip_suffix('k') {
        num.trim().parse::<u64>()? * 1024
    } else if let Some(num) = lower.strip_suffix('m') {
        num.trim().parse::<u64>()? * 1024 * 1024
    } else {
        lower.parse::<u64>()?
    };
    u32::try_from(bytes).map_err(|_| anyhow::anyhow!("Size '{size}' exceeds 4 GiB"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("8192").unwrap(), 8192);
        assert_eq!(parse_size("64K").unwrap(), 65536);
        assert_eq!(parse_size(" 2m ").unwrap(), 2 * 1024 * 1024);
        assert!(parse_size("8G").is_err());
        assert!(parse_size("abc").is_err());
    }

    #[test]
    fn test_pretty_bytes() {
        assert_eq!(pretty_bytes(512), "512 B");
        assert_eq!(pretty_bytes(12_345), "12.1 KiB");
        assert_eq!(sep_u64(1_234_567), "1 234 567");
    }
}
