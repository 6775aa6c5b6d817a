//! CloudFormation template model and the intrinsic functions used to wire
//! resources together.

use crate::utils::error::{BastionError, Result};
use crate::utils::validation::validate_logical_ids;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const FORMAT_VERSION: &str = "2010-09-09";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemovalPolicy {
    Delete,
    Retain,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RemovalPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RemovalPolicy>,
}

impl Resource {
    /// `properties` must be a JSON object; anything else yields no properties.
    pub fn new(resource_type: &str, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            resource_type: resource_type.to_string(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    pub fn depends_on(mut self, logical_id: &str) -> Self {
        if !self.depends_on.iter().any(|d| d == logical_id) {
            self.depends_on.push(logical_id.to_string());
        }
        self
    }

    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self.update_replace_policy = Some(policy);
        self
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Value,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Resource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn new(description: &str) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description: description.to_string(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn add_resource(&mut self, logical_id: &str, resource: Resource) -> Result<()> {
        if self.resources.contains_key(logical_id) {
            return Err(BastionError::TemplateError {
                logical_id: logical_id.to_string(),
                message: "Resource declared twice".to_string(),
            });
        }
        self.resources.insert(logical_id.to_string(), resource);
        Ok(())
    }

    pub fn add_output(&mut self, logical_id: &str, value: Value, description: &str) -> Result<()> {
        if self.outputs.contains_key(logical_id) {
            return Err(BastionError::TemplateError {
                logical_id: logical_id.to_string(),
                message: "Output declared twice".to_string(),
            });
        }
        self.outputs.insert(
            logical_id.to_string(),
            Output {
                value,
                description: description.to_string(),
            },
        );
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    /// Checks logical IDs and that every `Ref`, `Fn::GetAtt` and `DependsOn`
    /// points at a declared resource or a pseudo parameter.
    pub fn validate(&self) -> Result<()> {
        validate_logical_ids(
            "Resources",
            self.resources.keys().map(String::as_str),
        )?;
        validate_logical_ids("Outputs", self.outputs.keys().map(String::as_str))?;

        for (logical_id, resource) in &self.resources {
            for dependency in &resource.depends_on {
                if !self.resources.contains_key(dependency) {
                    return Err(dangling(logical_id, dependency));
                }
            }
            let properties = Value::Object(resource.properties.clone());
            for target in references(&properties) {
                if !self.resources.contains_key(&target) {
                    return Err(dangling(logical_id, &target));
                }
            }
        }

        for (logical_id, output) in &self.outputs {
            for target in references(&output.value) {
                if !self.resources.contains_key(&target) {
                    return Err(dangling(logical_id, &target));
                }
            }
        }

        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn dangling(logical_id: &str, target: &str) -> BastionError {
    BastionError::TemplateError {
        logical_id: logical_id.to_string(),
        message: format!("Reference to undeclared resource '{}'", target),
    }
}

/// Logical IDs referenced through `Ref` or `Fn::GetAtt`, pseudo parameters excluded.
pub fn references(value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect_references(value, &mut found);
    found
}

fn collect_references(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("Ref") {
                if !target.starts_with("AWS::") {
                    found.insert(target.clone());
                }
            }
            if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(target)) = parts.first() {
                    found.insert(target.clone());
                }
            }
            for nested in map.values() {
                collect_references(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, found);
            }
        }
        _ => {}
    }
}

// Intrinsic functions

pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

pub fn select(index: usize, list: Value) -> Value {
    json!({ "Fn::Select": [index, list] })
}

pub fn get_azs() -> Value {
    json!({ "Fn::GetAZs": "" })
}

pub fn pseudo(name: &str) -> Value {
    json!({ "Ref": format!("AWS::{}", name) })
}

/// ARN of an AWS managed IAM policy in the stack's partition.
pub fn managed_policy_arn(policy_name: &str) -> Value {
    join(
        "",
        vec![
            json!("arn:"),
            pseudo("Partition"),
            json!(format!(":iam::aws:policy/{}", policy_name)),
        ],
    )
}

pub fn tags(pairs: &[(&str, &str)]) -> Value {
    Value::Array(
        pairs
            .iter()
            .map(|(key, value)| json!({ "Key": key, "Value": value }))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_skip_pseudo_parameters() {
        let value = json!({
            "A": reference("BastionVpc"),
            "B": [get_att("BastionTaskRole", "Arn"), pseudo("Region")],
            "C": join("", vec![reference("BastionCluster"), json!("x")]),
        });
        let found: Vec<String> = references(&value).into_iter().collect();
        assert_eq!(found, vec!["BastionCluster", "BastionTaskRole", "BastionVpc"]);
    }

    #[test]
    fn test_validate_rejects_dangling_reference() {
        let mut template = Template::new("test");
        template
            .add_resource(
                "Subnet",
                Resource::new("AWS::EC2::Subnet", json!({ "VpcId": reference("Missing") })),
            )
            .unwrap();
        let err = template.validate().unwrap_err();
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn test_validate_rejects_unknown_dependency() {
        let mut template = Template::new("test");
        template
            .add_resource(
                "Route",
                Resource::new("AWS::EC2::Route", json!({})).depends_on("Gateway"),
            )
            .unwrap();
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_duplicate_resource_is_rejected() {
        let mut template = Template::new("test");
        template
            .add_resource("Vpc", Resource::new("AWS::EC2::VPC", json!({})))
            .unwrap();
        assert!(template
            .add_resource("Vpc", Resource::new("AWS::EC2::VPC", json!({})))
            .is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let mut template = Template::new("test");
        template
            .add_resource(
                "Logs",
                Resource::new("AWS::Logs::LogGroup", json!({ "RetentionInDays": 7 }))
                    .removal_policy(RemovalPolicy::Delete),
            )
            .unwrap();
        let value: Value = serde_json::from_str(&template.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(value["Resources"]["Logs"]["Type"], "AWS::Logs::LogGroup");
        assert_eq!(value["Resources"]["Logs"]["DeletionPolicy"], "Delete");
        assert_eq!(value["Resources"]["Logs"]["UpdateReplacePolicy"], "Delete");
        assert!(value["Resources"]["Logs"].get("DependsOn").is_none());
        assert!(value.get("Outputs").is_none());
    }
}
