//! AWS resource kinds and property helpers.

use forge_core::{Properties, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// CloudFormation resource types declared by the environment stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    SnsTopic,
    Vpc,
    Subnet,
    InternetGateway,
    VpcGatewayAttachment,
    RouteTable,
    Route,
    SubnetRouteTableAssociation,
    SecurityGroup,
    SecurityGroupIngress,
    DbSubnetGroup,
    DbParameterGroup,
    DbCluster,
    DbInstance,
    Alarm,
    EcsCluster,
    EcsTaskDefinition,
    EcsService,
    LoadBalancer,
    TargetGroup,
    Listener,
    LogGroup,
    IamRole,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::SnsTopic => "AWS::SNS::Topic",
            ResourceKind::Vpc => "AWS::EC2::VPC",
            ResourceKind::Subnet => "AWS::EC2::Subnet",
            ResourceKind::InternetGateway => "AWS::EC2::InternetGateway",
            ResourceKind::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            ResourceKind::RouteTable => "AWS::EC2::RouteTable",
            ResourceKind::Route => "AWS::EC2::Route",
            ResourceKind::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::SecurityGroupIngress => "AWS::EC2::SecurityGroupIngress",
            ResourceKind::DbSubnetGroup => "AWS::RDS::DBSubnetGroup",
            ResourceKind::DbParameterGroup => "AWS::RDS::DBParameterGroup",
            ResourceKind::DbCluster => "AWS::RDS::DBCluster",
            ResourceKind::DbInstance => "AWS::RDS::DBInstance",
            ResourceKind::Alarm => "AWS::CloudWatch::Alarm",
            ResourceKind::EcsCluster => "AWS::ECS::Cluster",
            ResourceKind::EcsTaskDefinition => "AWS::ECS::TaskDefinition",
            ResourceKind::EcsService => "AWS::ECS::Service",
            ResourceKind::LoadBalancer => "AWS::ElasticLoadBalancingV2::LoadBalancer",
            ResourceKind::TargetGroup => "AWS::ElasticLoadBalancingV2::TargetGroup",
            ResourceKind::Listener => "AWS::ElasticLoadBalancingV2::Listener",
            ResourceKind::LogGroup => "AWS::Logs::LogGroup",
            ResourceKind::IamRole => "AWS::IAM::Role",
        }
    }

    /// Service namespace, e.g. `EC2` for `AWS::EC2::VPC`.
    pub fn service(&self) -> &'static str {
        self.as_str().split("::").nth(1).unwrap_or_default()
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Attribute names read through `Fn::GetAtt`.
pub mod attributes {
    pub const ENDPOINT_ADDRESS: &str = "Endpoint.Address";
    pub const ENDPOINT_PORT: &str = "Endpoint.Port";
    pub const DNS_NAME: &str = "DNSName";
}

/// A `{Key, Value}` tag entry.
pub fn tag(key: &str, value: impl Into<Value>) -> Value {
    Properties::new().with("Key", key).with("Value", value).into()
}

/// A tag list holding only a `Name` tag.
pub fn name_tags(name: impl Into<Value>) -> Value {
    Value::list([tag("Name", name)])
}

/// The stack's region, or the `AWS::Region` pseudo parameter when unset.
pub fn region(region: Option<&str>) -> Value {
    match region {
        Some(region) => Value::from(region),
        None => Value::Literal(json!({ "Ref": "AWS::Region" })),
    }
}

/// Trust policy letting `service` assume a role.
pub fn assume_role_policy(service: &str) -> Value {
    Value::Literal(json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": [service] },
            "Action": ["sts:AssumeRole"],
        }],
    }))
}

/// Inline role policy allowing `actions` on every resource.
pub fn allow_policy(name: &str, actions: &[&str]) -> Value {
    Value::Literal(json!({
        "PolicyName": name,
        "PolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Action": actions,
                "Resource": "*",
            }],
        },
    }))
}
