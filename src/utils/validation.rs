use crate::utils::error::{BastionError, Result};
use std::collections::HashSet;
use std::net::Ipv6Addr;
use url::Host;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Accepts DNS names and IPv4/IPv6 literals, the forms an RDS endpoint or
/// any other forwarding destination can take. IPv6 may be bare or bracketed.
pub fn validate_host(field_name: &str, host: &str) -> Result<()> {
    if host.trim().is_empty() {
        return Err(BastionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: host.to_string(),
            reason: "Host cannot be empty".to_string(),
        });
    }

    if host.parse::<Ipv6Addr>().is_ok() {
        return Ok(());
    }

    match Host::parse(host) {
        Ok(_) => Ok(()),
        Err(e) => Err(BastionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: host.to_string(),
            reason: format!("Invalid host: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(BastionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(BastionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(BastionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BastionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BastionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_one_of<T: PartialEq + std::fmt::Display>(
    field_name: &str,
    value: T,
    allowed: &[T],
) -> Result<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(BastionError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: format!(
            "Allowed values: {}",
            allowed
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })
}

pub fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(BastionError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}

/// CloudFormation logical IDs must be alphanumeric and unique.
pub fn validate_logical_ids<'a, I>(field_name: &str, ids: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    for id in ids {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BastionError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: id.to_string(),
                reason: "Logical IDs may only contain A-Z, a-z and 0-9".to_string(),
            });
        }
        if !seen.insert(id) {
            return Err(BastionError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: id.to_string(),
                reason: "Duplicate logical ID".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_host() {
        assert!(validate_host("remote_host", "mydb.cluster-xxx.rds.amazonaws.com").is_ok());
        assert!(validate_host("remote_host", "10.0.4.12").is_ok());
        assert!(validate_host("remote_host", "[::1]").is_ok());
        assert!(validate_host("remote_host", "::1").is_ok());
        assert!(validate_host("remote_host", "fd00:ec2::23").is_ok());
        assert!(validate_host("remote_host", "").is_err());
        assert!(validate_host("remote_host", "bad host").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("max_azs", 2, 1).is_ok());
        assert!(validate_positive_number("max_azs", 0, 1).is_err());
    }

    #[test]
    fn test_validate_aws_region() {
        assert!(validate_aws_region("region", "ap-northeast-1").is_ok());
        assert!(validate_aws_region("region", "AP_NORTHEAST_1").is_err());
        assert!(validate_aws_region("region", " ").is_err());
    }

    #[test]
    fn test_validate_logical_ids() {
        assert!(validate_logical_ids("resources", ["BastionVpc", "BastionCluster"]).is_ok());
        assert!(validate_logical_ids("resources", ["Bastion-Vpc"]).is_err());
        assert!(validate_logical_ids("resources", ["BastionVpc", "BastionVpc"]).is_err());
    }

    #[test]
    fn test_validate_one_of() {
        assert!(validate_one_of("retention", 7, &[1, 3, 5, 7]).is_ok());
        assert!(validate_one_of("retention", 2, &[1, 3, 5, 7]).is_err());
    }
}
