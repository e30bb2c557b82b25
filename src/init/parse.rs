// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use tower::BoxError;

/// Parse a single key-value pair
pub(crate) fn parse_key_val<T, U>(s: &str) -> Result<(T, U), BoxError>
where
    T: std::str::FromStr,
    T::Err: Error + Send + Sync + 'static,
    U: std::str::FromStr,
    U::Err: Error + Send + Sync + 'static,
{
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{s}`"))?;
    Ok((s[..pos].parse()?, s[pos + 1..].parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_equals() {
        let (k, v) = parse_key_val::<String, String>("file=/var/log/a=b.log").unwrap();
        assert_eq!(k, "file");
        assert_eq!(v, "/var/log/a=b.log");
    }

    #[test]
    fn empty_value_is_kept() {
        let (k, v) = parse_key_val::<String, String>("topic=").unwrap();
        assert_eq!(k, "topic");
        assert_eq!(v, "");
    }

    #[test]
    fn missing_equals_is_rejected() {
        let err = parse_key_val::<String, String>("topic").unwrap_err();
        assert!(err.to_string().contains("no `=` found"));
    }
}
