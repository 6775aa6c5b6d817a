//! IPv4 CIDR blocks and sequential subnet allocation inside a VPC range.

use crate::utils::error::{BastionError, Result};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub const MAX_LENGTH: u8 = 32;

/// Convert a prefix length to a subnet mask, e.g. 24 -> 0xFFFFFF00.
pub fn prefix_mask(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (MAX_LENGTH - len.min(MAX_LENGTH))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    pub addr: Ipv4Addr,
    pub mask: u8,
}

impl Ipv4Cidr {
    pub fn new(addr: Ipv4Addr, mask: u8) -> Result<Self> {
        if mask > MAX_LENGTH {
            return Err(cidr_error(&format!("{}/{}", addr, mask), "Network length is too long"));
        }
        let network = u32::from(addr) & prefix_mask(mask);
        if network != u32::from(addr) {
            return Err(cidr_error(
                &format!("{}/{}", addr, mask),
                "Address has host bits set",
            ));
        }
        Ok(Self { addr, mask })
    }

    pub fn network(&self) -> u32 {
        u32::from(self.addr)
    }

    pub fn broadcast(&self) -> u32 {
        self.network() | !prefix_mask(self.mask)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = BastionError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr, mask) = s
            .split_once('/')
            .ok_or_else(|| cidr_error(s, "Expected <address>/<prefix length>"))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| cidr_error(s, &format!("Invalid address {}", addr)))?;
        let mask: u8 = mask
            .parse()
            .map_err(|_| cidr_error(s, &format!("Invalid prefix length {}", mask)))?;
        Ipv4Cidr::new(addr, mask)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}

fn cidr_error(value: &str, reason: &str) -> BastionError {
    BastionError::InvalidConfigValueError {
        field: "cidr".to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Hands out consecutive, non-overlapping blocks from a parent range.
/// Each block starts at the first address aligned to its own size.
#[derive(Debug, Clone)]
pub struct CidrAllocator {
    parent: Ipv4Cidr,
    next: u64,
}

impl CidrAllocator {
    pub fn new(parent: Ipv4Cidr) -> Self {
        Self {
            parent,
            next: parent.network() as u64,
        }
    }

    pub fn allocate(&mut self, mask: u8) -> Result<Ipv4Cidr> {
        if mask < self.parent.mask || mask > MAX_LENGTH {
            return Err(cidr_error(
                &format!("/{}", mask),
                &format!("Subnet mask must be between /{} and /32", self.parent.mask),
            ));
        }
        let size = 1u64 << (MAX_LENGTH - mask);
        let start = self.next.div_ceil(size) * size;
        let end = start + size - 1;
        if end > self.parent.broadcast() as u64 {
            return Err(cidr_error(
                &self.parent.to_string(),
                &format!("No room left for another /{} subnet", mask),
            ));
        }
        self.next = end + 1;
        Ipv4Cidr::new(Ipv4Addr::from(start as u32), mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_mask() {
        assert_eq!(prefix_mask(0), 0x00000000);
        assert_eq!(prefix_mask(16), 0xFFFF0000);
        assert_eq!(prefix_mask(24), 0xFFFFFF00);
        assert_eq!(prefix_mask(32), 0xFFFFFFFF);
    }

    #[test]
    fn test_parse_and_display() {
        let cidr: Ipv4Cidr = "10.0.0.0/16".parse().unwrap();
        assert_eq!(cidr.mask, 16);
        assert_eq!(cidr.to_string(), "10.0.0.0/16");
        assert!("10.0.0.1/16".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0".parse::<Ipv4Cidr>().is_err());
        assert!("10.0.0.0/33".parse::<Ipv4Cidr>().is_err());
    }

    #[test]
    fn test_sequential_allocation() {
        let mut allocator = CidrAllocator::new("10.0.0.0/16".parse().unwrap());
        let blocks: Vec<String> = (0..6)
            .map(|_| allocator.allocate(24).unwrap().to_string())
            .collect();
        assert_eq!(
            blocks,
            vec![
                "10.0.0.0/24",
                "10.0.1.0/24",
                "10.0.2.0/24",
                "10.0.3.0/24",
                "10.0.4.0/24",
                "10.0.5.0/24"
            ]
        );
    }

    #[test]
    fn test_mixed_sizes_are_aligned() {
        let mut allocator = CidrAllocator::new("10.0.0.0/16".parse().unwrap());
        assert_eq!(allocator.allocate(26).unwrap().to_string(), "10.0.0.0/26");
        assert_eq!(allocator.allocate(24).unwrap().to_string(), "10.0.1.0/24");
    }

    #[test]
    fn test_allocation_exhausted() {
        let mut allocator = CidrAllocator::new("10.0.0.0/23".parse().unwrap());
        assert!(allocator.allocate(24).is_ok());
        assert!(allocator.allocate(24).is_ok());
        assert!(allocator.allocate(24).is_err());
    }
}
