//! VPC, subnets, gateways and routing.

use crate::config::toml_config::{StackConfig, SubnetKind};
use crate::stack::cidr::CidrAllocator;
use crate::stack::template::{get_azs, reference, select, tags, Resource, Template};
use crate::utils::error::{BastionError, Result};
use serde_json::json;

pub const VPC_ID: &str = "BastionVpc";
const IGW_ID: &str = "BastionVpcIGW";
const IGW_ATTACHMENT_ID: &str = "BastionVpcVPCGW";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetRef {
    pub logical_id: String,
    pub kind: SubnetKind,
    pub cidr: String,
    pub az_index: usize,
}

/// Logical IDs other resources need from the network.
#[derive(Debug, Clone, Default)]
pub struct NetworkRefs {
    pub vpc: String,
    pub subnets: Vec<SubnetRef>,
    /// Default routes of the egress subnets; tasks must not start before them.
    pub egress_routes: Vec<String>,
}

impl NetworkRefs {
    pub fn subnet_ids(&self, kind: SubnetKind) -> Vec<String> {
        self.subnets
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.logical_id.clone())
            .collect()
    }
}

pub fn declare(template: &mut Template, config: &StackConfig) -> Result<NetworkRefs> {
    let network = &config.network;
    let vpc_cidr = config.vpc_cidr()?;
    let stack_name = &config.stack.name;

    template.add_resource(
        VPC_ID,
        Resource::new(
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": vpc_cidr.to_string(),
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": tags(&[("Name", format!("{}/{}", stack_name, VPC_ID).as_str())]),
            }),
        ),
    )?;

    let mut refs = NetworkRefs {
        vpc: VPC_ID.to_string(),
        ..NetworkRefs::default()
    };

    let mut allocator = CidrAllocator::new(vpc_cidr);
    for group in &network.subnets {
        for az_index in 0..network.max_azs {
            let cidr = allocator.allocate(group.cidr_mask).map_err(|e| {
                BastionError::ConfigValidationError {
                    field: "network.subnets".to_string(),
                    message: format!(
                        "Subnet group '{}' does not fit in {}: {}",
                        group.name, vpc_cidr, e
                    ),
                }
            })?;
            refs.subnets.push(SubnetRef {
                logical_id: format!("{}{}Subnet{}", VPC_ID, group.name, az_index + 1),
                kind: group.kind,
                cidr: cidr.to_string(),
                az_index,
            });
        }
    }

    for subnet in &refs.subnets {
        declare_subnet(template, stack_name, subnet)?;
    }

    if network.has_kind(SubnetKind::Public) {
        template.add_resource(
            IGW_ID,
            Resource::new(
                "AWS::EC2::InternetGateway",
                json!({ "Tags": tags(&[("Name", format!("{}/{}", stack_name, VPC_ID).as_str())]) }),
            ),
        )?;
        template.add_resource(
            IGW_ATTACHMENT_ID,
            Resource::new(
                "AWS::EC2::VPCGatewayAttachment",
                json!({ "VpcId": reference(VPC_ID), "InternetGatewayId": reference(IGW_ID) }),
            ),
        )?;
    }

    let public: Vec<&SubnetRef> = refs
        .subnets
        .iter()
        .filter(|s| s.kind == SubnetKind::Public)
        .collect();

    for subnet in &public {
        template.add_resource(
            &format!("{}DefaultRoute", subnet.logical_id),
            Resource::new(
                "AWS::EC2::Route",
                json!({
                    "RouteTableId": reference(&route_table_id(subnet)),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "GatewayId": reference(IGW_ID),
                }),
            )
            .depends_on(IGW_ATTACHMENT_ID),
        )?;
    }

    let nat_gateways: Vec<String> = public
        .iter()
        .take(network.nat_gateways)
        .map(|subnet| declare_nat_gateway(template, stack_name, subnet))
        .collect::<Result<_>>()?;

    if !nat_gateways.is_empty() {
        let private = refs
            .subnets
            .iter()
            .filter(|s| s.kind == SubnetKind::PrivateWithEgress);
        for (i, subnet) in private.enumerate() {
            let route_id = format!("{}DefaultRoute", subnet.logical_id);
            template.add_resource(
                &route_id,
                Resource::new(
                    "AWS::EC2::Route",
                    json!({
                        "RouteTableId": reference(&route_table_id(subnet)),
                        "DestinationCidrBlock": "0.0.0.0/0",
                        "NatGatewayId": reference(&nat_gateways[i % nat_gateways.len()]),
                    }),
                ),
            )?;
            refs.egress_routes.push(route_id);
        }
    }

    tracing::debug!(
        "Declared VPC {} with {} subnets and {} NAT gateway(s)",
        vpc_cidr,
        refs.subnets.len(),
        nat_gateways.len()
    );

    Ok(refs)
}

fn route_table_id(subnet: &SubnetRef) -> String {
    format!("{}RouteTable", subnet.logical_id)
}

fn declare_subnet(template: &mut Template, stack_name: &str, subnet: &SubnetRef) -> Result<()> {
    let (type_tag, public) = match subnet.kind {
        SubnetKind::Public => ("Public", true),
        SubnetKind::PrivateWithEgress => ("Private", false),
        SubnetKind::PrivateIsolated => ("Isolated", false),
    };
    let name_tag = format!("{}/{}/{}", stack_name, VPC_ID, &subnet.logical_id[VPC_ID.len()..]);
    let group_name = subnet_group_name(subnet);

    template.add_resource(
        &subnet.logical_id,
        Resource::new(
            "AWS::EC2::Subnet",
            json!({
                "VpcId": reference(VPC_ID),
                "AvailabilityZone": select(subnet.az_index, get_azs()),
                "CidrBlock": subnet.cidr,
                "MapPublicIpOnLaunch": public,
                "Tags": tags(&[
                    ("aws-cdk:subnet-name", group_name),
                    ("aws-cdk:subnet-type", type_tag),
                    ("Name", name_tag.as_str()),
                ]),
            }),
        ),
    )?;

    let route_table = route_table_id(subnet);
    template.add_resource(
        &route_table,
        Resource::new(
            "AWS::EC2::RouteTable",
            json!({
                "VpcId": reference(VPC_ID),
                "Tags": tags(&[("Name", name_tag.as_str())]),
            }),
        ),
    )?;
    template.add_resource(
        &format!("{}RouteTableAssociation", subnet.logical_id),
        Resource::new(
            "AWS::EC2::SubnetRouteTableAssociation",
            json!({
                "RouteTableId": reference(&route_table),
                "SubnetId": reference(&subnet.logical_id),
            }),
        ),
    )
}

fn subnet_group_name(subnet: &SubnetRef) -> &str {
    let without_vpc = &subnet.logical_id[VPC_ID.len()..];
    without_vpc
        .rfind("Subnet")
        .map(|end| &without_vpc[..end])
        .unwrap_or(without_vpc)
}

fn declare_nat_gateway(template: &mut Template, stack_name: &str, subnet: &SubnetRef) -> Result<String> {
    let eip_id = format!("{}EIP", subnet.logical_id);
    let nat_id = format!("{}NATGateway", subnet.logical_id);
    let name_tag = format!("{}/{}/{}", stack_name, VPC_ID, &subnet.logical_id[VPC_ID.len()..]);

    template.add_resource(
        &eip_id,
        Resource::new(
            "AWS::EC2::EIP",
            json!({ "Domain": "vpc", "Tags": tags(&[("Name", name_tag.as_str())]) }),
        ),
    )?;
    template.add_resource(
        &nat_id,
        Resource::new(
            "AWS::EC2::NatGateway",
            json!({
                "SubnetId": reference(&subnet.logical_id),
                "AllocationId": crate::stack::template::get_att(&eip_id, "AllocationId"),
                "Tags": tags(&[("Name", name_tag.as_str())]),
            }),
        )
        .depends_on(&format!("{}DefaultRoute", subnet.logical_id))
        .depends_on(&format!("{}RouteTableAssociation", subnet.logical_id)),
    )?;

    Ok(nat_id)
}
