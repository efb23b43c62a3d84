//! Port specification parsing.
//!
//! Accepted forms: `8080`, `8080,8081,9000`, `8000-8010`, and mixtures of
//! ports and ranges separated by commas. Ranges are inclusive.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rejected port specification. Raised before any probing starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortSpecError {
    #[error("port specification is empty")]
    Empty,

    #[error("empty entry in port list '{0}'")]
    EmptyEntry(String),

    #[error("'{0}' is not a port number")]
    NotANumber(String),

    #[error("port {0} is out of range (1-65535)")]
    OutOfRange(u64),

    #[error("range {low}-{high} is inverted (low must be <= high)")]
    InvertedRange { low: u16, high: u16 },
}

/// One comma-separated item of a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortItem {
    Single(u16),
    Range { low: u16, high: u16 },
}

/// A validated port specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    items: Vec<PortItem>,
}

impl PortSpec {
    pub fn parse(spec: &str) -> Result<Self, PortSpecError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(PortSpecError::Empty);
        }

        let items = spec
            .split(',')
            .map(|item| parse_item(item.trim(), spec))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { items })
    }

    /// The implied ports, ascending and deduplicated.
    pub fn ports(&self) -> Vec<u16> {
        let mut set = BTreeSet::new();
        for item in &self.items {
            match *item {
                PortItem::Single(p) => {
                    set.insert(p);
                }
                PortItem::Range { low, high } => set.extend(low..=high),
            }
        }
        set.into_iter().collect()
    }
}

impl FromStr for PortSpec {
    type Err = PortSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PortSpec::parse(s)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match item {
                PortItem::Single(p) => write!(f, "{}", p)?,
                PortItem::Range { low, high } => write!(f, "{}-{}", low, high)?,
            }
        }
        Ok(())
    }
}

fn parse_item(item: &str, spec: &str) -> Result<PortItem, PortSpecError> {
    if item.is_empty() {
        return Err(PortSpecError::EmptyEntry(spec.to_string()));
    }

    match item.split_once('-') {
        Some((low, high)) => {
            let low = parse_port(low.trim())?;
            let high = parse_port(high.trim())?;
            if low > high {
                return Err(PortSpecError::InvertedRange { low, high });
            }
            Ok(PortItem::Range { low, high })
        }
        None => parse_port(item).map(PortItem::Single),
    }
}

fn parse_port(text: &str) -> Result<u16, PortSpecError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PortSpecError::NotANumber(text.to_string()));
    }
    let value: u64 = text
        .parse()
        .map_err(|_| PortSpecError::NotANumber(text.to_string()))?;
    match u16::try_from(value) {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(PortSpecError::OutOfRange(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(spec: &str) -> Vec<u16> {
        PortSpec::parse(spec).unwrap().ports()
    }

    #[test]
    fn test_single_port() {
        assert_eq!(ports("8080"), vec![8080]);
        assert_eq!(ports(" 8080 "), vec![8080]);
    }

    #[test]
    fn test_list_is_sorted_and_deduplicated() {
        assert_eq!(ports("9000,8080,9000, 8081"), vec![8080, 8081, 9000]);
    }

    #[test]
    fn test_inclusive_range() {
        assert_eq!(ports("8000-8003"), vec![8000, 8001, 8002, 8003]);
        assert_eq!(ports("8000-8000"), vec![8000]);
        assert_eq!(ports("65534-65535"), vec![65534, 65535]);
    }

    #[test]
    fn test_mixed_overlapping_items() {
        assert_eq!(ports("8001,8000-8002,8002-8003"), vec![8000, 8001, 8002, 8003]);
    }

    #[test]
    fn test_full_range_stays_in_bounds() {
        let all = ports("1-65535");
        assert_eq!(all.len(), 65535);
        assert_eq!(all.first(), Some(&1));
        assert_eq!(all.last(), Some(&65535));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(PortSpec::parse(""), Err(PortSpecError::Empty));
        assert_eq!(PortSpec::parse("  "), Err(PortSpecError::Empty));
        assert_eq!(
            PortSpec::parse("8080,,8081"),
            Err(PortSpecError::EmptyEntry("8080,,8081".into()))
        );
        assert_eq!(PortSpec::parse("http"), Err(PortSpecError::NotANumber("http".into())));
        assert_eq!(PortSpec::parse("-5"), Err(PortSpecError::NotANumber("".into())));
        assert_eq!(PortSpec::parse("+80"), Err(PortSpecError::NotANumber("+80".into())));
        assert_eq!(PortSpec::parse("0"), Err(PortSpecError::OutOfRange(0)));
        assert_eq!(PortSpec::parse("70000"), Err(PortSpecError::OutOfRange(70000)));
        assert_eq!(
            PortSpec::parse("9000-8000"),
            Err(PortSpecError::InvertedRange { low: 9000, high: 8000 })
        );
        assert!(PortSpec::parse("1-2-3").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let spec: PortSpec = "8080, 9000-9002".parse().unwrap();
        assert_eq!(spec.to_string(), "8080,9000-9002");
    }
}
