//! Local address range parsing.
//!
//! Ranges are immutable once parsed and iterate in their defined order:
//! - Span: `127.1.27.1-254` or `127.1.27.1-127.1.27.254` (last octet varies)
//! - Single address: `10.0.0.5`
//! - CIDR: `127.1.27.0/24` (host addresses only)

use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::{Error, Result};

/// A parsed allocation range of local IPv4 addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrRange {
    spec: String,
    kind: RangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RangeKind {
    Single(Ipv4Addr),
    Span { start: Ipv4Addr, end: u8 },
    Cidr(Ipv4Net),
}

impl AddrRange {
    /// Parse a range specification.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(Error::InvalidRange {
                message: "empty specification".into(),
            });
        }

        let kind = if spec.contains('/') {
            let net: Ipv4Net = spec.parse().map_err(|_| Error::InvalidRange {
                message: format!("invalid CIDR: {spec}"),
            })?;
            RangeKind::Cidr(net)
        } else if let Some((start, end)) = spec.split_once('-') {
            parse_span(start, end)?
        } else {
            let addr: Ipv4Addr = spec.parse().map_err(|_| Error::InvalidRange {
                message: format!("invalid address: {spec}"),
            })?;
            RangeKind::Single(addr)
        };

        Ok(Self {
            spec: spec.to_string(),
            kind,
        })
    }

    /// Iterate candidate addresses in the range's defined order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = Ipv4Addr> + Send + '_> {
        match &self.kind {
            RangeKind::Single(addr) => Box::new(std::iter::once(*addr)),
            RangeKind::Span { start, end } => {
                let [a, b, c, first] = start.octets();
                Box::new((first..=*end).map(move |last| Ipv4Addr::new(a, b, c, last)))
            }
            RangeKind::Cidr(net) => Box::new(net.hosts()),
        }
    }

    /// Number of candidate addresses in the range.
    pub fn len(&self) -> usize {
        match &self.kind {
            RangeKind::Single(_) => 1,
            RangeKind::Span { start, end } => (*end - start.octets()[3]) as usize + 1,
            RangeKind::Cidr(net) => net.hosts().count(),
        }
    }

    /// Returns true if the range contains no candidates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

fn parse_span(start: &str, end: &str) -> Result<RangeKind> {
    let start: Ipv4Addr = start.parse().map_err(|_| Error::InvalidRange {
        message: format!("invalid span start: {start}"),
    })?;

    // The end is either a bare last octet or a full address in the same /24.
    let end: u8 = match end.parse::<u8>() {
        Ok(octet) => octet,
        Err(_) => {
            let end_addr: Ipv4Addr = end.parse().map_err(|_| Error::InvalidRange {
                message: format!("invalid span end: {end}"),
            })?;
            if end_addr.octets()[..3] != start.octets()[..3] {
                return Err(Error::InvalidRange {
                    message: format!("span endpoints differ outside the last octet: {start}-{end_addr}"),
                });
            }
            end_addr.octets()[3]
        }
    };

    if end < start.octets()[3] {
        return Err(Error::InvalidRange {
            message: format!("span end {end} is below span start {start}"),
        });
    }

    Ok(RangeKind::Span { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_span_last_octet() {
        let range = AddrRange::parse("127.1.27.1-254").unwrap();
        assert_eq!(range.len(), 254);

        let first: Vec<Ipv4Addr> = range.iter().take(2).collect();
        assert_eq!(first[0], Ipv4Addr::new(127, 1, 27, 1));
        assert_eq!(first[1], Ipv4Addr::new(127, 1, 27, 2));
        assert_eq!(range.iter().last(), Some(Ipv4Addr::new(127, 1, 27, 254)));
    }

    #[test]
    fn parse_span_full_end_address() {
        let range = AddrRange::parse("10.0.0.1-10.0.0.3").unwrap();
        let all: Vec<Ipv4Addr> = range.iter().collect();
        assert_eq!(
            all,
            vec![
                Ipv4Addr::new(10, 0, 0, 1),
                Ipv4Addr::new(10, 0, 0, 2),
                Ipv4Addr::new(10, 0, 0, 3),
            ]
        );
    }

    #[test]
    fn parse_single_address() {
        let range = AddrRange::parse("10.0.0.5").unwrap();
        let all: Vec<Ipv4Addr> = range.iter().collect();
        assert_eq!(all, vec![Ipv4Addr::new(10, 0, 0, 5)]);
        assert!(!range.is_empty());
    }

    #[test]
    fn parse_cidr() {
        let range = AddrRange::parse("127.1.27.0/30").unwrap();
        let all: Vec<Ipv4Addr> = range.iter().collect();
        // Hosts only: network and broadcast addresses are excluded.
        assert_eq!(
            all,
            vec![Ipv4Addr::new(127, 1, 27, 1), Ipv4Addr::new(127, 1, 27, 2)]
        );
    }

    #[test]
    fn iteration_order_is_stable() {
        let range = AddrRange::parse("10.0.0.1-4").unwrap();
        let first: Vec<Ipv4Addr> = range.iter().collect();
        let second: Vec<Ipv4Addr> = range.iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_specs_fail() {
        for spec in [
            "",
            "not-an-ip",
            "10.0.0.1-",
            "10.0.0.5-1",
            "10.0.0.1-10.0.1.5",
            "10.0.0.0/33",
            "10.0.0.999",
        ] {
            let err = AddrRange::parse(spec).unwrap_err();
            assert!(matches!(err, Error::InvalidRange { .. }), "spec: {spec:?}");
        }
    }

    #[test]
    fn display_round_trips_spec() {
        let range = AddrRange::parse("127.1.27.1-254").unwrap();
        assert_eq!(range.to_string(), "127.1.27.1-254");
    }
}
