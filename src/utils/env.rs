/// Splits a size such as `64m`, `512K` or `1.5gb` into its number and the
/// multiplier implied by the suffix.
fn read_float_and_factor(value: &str) -> Option<(f64, usize)> {
    let mut value = value.trim();
    if value.is_empty() {
        return None;
    }

    if value.len() > 1 && (value.ends_with('b') || value.ends_with('B')) {
        value = &value[..value.len() - 1];
    }

    let (number, factor) = match value.as_bytes()[value.len() - 1] {
        b'g' | b'G' => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        b'm' | b'M' => (&value[..value.len() - 1], 1024 * 1024),
        b'k' | b'K' => (&value[..value.len() - 1], 1024),
        _ => (value, 1),
    };

    number.parse::<f64>().ok().map(|x| (x, factor))
}

fn read_float_and_factor_from_env(var: &str) -> Option<(f64, usize)> {
    std::env::var(var)
        .ok()
        .and_then(|value| read_float_and_factor(&value))
}

pub fn read_uint_from_str(value: &str) -> Option<usize> {
    let (value, factor) = read_float_and_factor(value)?;
    if value < 0.0 {
        return None;
    }
    Some((value * factor as f64) as usize)
}

pub fn read_uint_from_env(var: &str) -> Option<usize> {
    let (value, factor) = read_float_and_factor_from_env(var)?;
    if value < 0.0 {
        return None;
    }
    Some((value * factor as f64) as usize)
}

pub fn read_float_from_env(var: &str) -> Option<f64> {
    read_float_and_factor_from_env(var).map(|x| x.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_with_suffixes() {
        assert_eq!(read_uint_from_str("4096"), Some(4096));
        assert_eq!(read_uint_from_str("64k"), Some(64 * 1024));
        assert_eq!(read_uint_from_str("2M"), Some(2 * 1024 * 1024));
        assert_eq!(read_uint_from_str("1gb"), Some(1024 * 1024 * 1024));
        assert_eq!(read_uint_from_str("1.5m"), Some(1024 * 1024 * 3 / 2));
        assert_eq!(read_uint_from_str(""), None);
        assert_eq!(read_uint_from_str("lots"), None);
        assert_eq!(read_uint_from_str("-3k"), None);
    }
}
