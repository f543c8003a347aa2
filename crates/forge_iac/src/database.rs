//! Database tier: an Aurora MySQL cluster in its own public VPC.

use forge_core::{Properties, Resource, Stack, SynthResult, Value};
use tracing::info;

use crate::config::EnvironmentConfig;
use crate::provider::{attributes, name_tags, ResourceKind};

/// Output carrying the cluster endpoint address.
pub const ENDPOINT_OUTPUT: &str = "DatabaseEndpoint";
/// Output carrying the cluster endpoint port.
pub const PORT_OUTPUT: &str = "DatabasePort";

/// Handles to the resources other code may want to reference.
#[derive(Debug, Clone)]
pub struct DatabaseResources {
    pub vpc: Resource,
    pub cluster: Resource,
    pub instance: Resource,
    pub alarm_topic: Resource,
}

/// Declares the database tier into a stack.
pub struct DatabaseStack<'a> {
    config: &'a EnvironmentConfig,
}

impl<'a> DatabaseStack<'a> {
    pub fn new(config: &'a EnvironmentConfig) -> Self {
        Self { config }
    }

    pub fn declare(&self, stack: &mut Stack) -> SynthResult<DatabaseResources> {
        let db = &self.config.database;
        let network = &db.network;
        let secrets = &self.config.secrets;

        let alarm_topic = stack.declare(
            "StackAlarmTopic",
            ResourceKind::SnsTopic,
            Properties::new().with("DisplayName", "Stack Alarm Topic"),
        )?;

        let vpc = stack.declare(
            "VPC",
            ResourceKind::Vpc,
            Properties::new()
                .with("CidrBlock", network.vpc_cidr.as_str())
                .with("EnableDnsHostnames", true)
                .with("EnableDnsSupport", true),
        )?;

        let mut subnets = Vec::new();
        for (i, (cidr, zone)) in network.subnet_cidrs.iter().zip(&network.availability_zones).enumerate() {
            let subnet = stack.declare(
                &format!("PublicSubnet{}", i + 1),
                ResourceKind::Subnet,
                Properties::new()
                    .with("VpcId", vpc.reference())
                    .with("AvailabilityZone", zone)
                    .with("CidrBlock", cidr)
                    .with("MapPublicIpOnLaunch", true)
                    .with("Tags", name_tags(format!("{} Public Subnet (AZ{})", db.name, i + 1))),
            )?;
            subnets.push(subnet);
        }
        let subnet_group = stack.declare(
            "DatabaseSubnetGroup",
            ResourceKind::DbSubnetGroup,
            Properties::new()
                .with("DBSubnetGroupDescription", "CloudFormation managed DB subnet group")
                .with("SubnetIds", Value::list(subnets.iter().map(Resource::reference))),
        )?;

        let parameter_group = stack.declare(
            "ParameterGroup",
            ResourceKind::DbParameterGroup,
            Properties::new()
                .with("Description", "Prisma DB parameter group")
                .with("Family", db.parameter_group_family.as_str())
                .with(
                    "Parameters",
                    Properties::new().with("max_connections", db.max_connections.to_string()),
                ),
        )?;

        let security_group = stack.declare(
            "DatabaseSecurityGroup",
            ResourceKind::SecurityGroup,
            Properties::new()
                .with("VpcId", vpc.reference())
                .with("GroupDescription", "Access to database")
                .with(
                    "SecurityGroupIngress",
                    Value::list([Properties::new()
                        .with("CidrIp", "0.0.0.0/0")
                        .with("FromPort", db.port)
                        .with("ToPort", db.port)
                        .with("IpProtocol", "tcp")]),
                )
                .with("Tags", name_tags(format!("{}-security-group", db.name))),
        )?;

        let mut cluster_props = Properties::new()
            .with("Engine", db.engine.as_str())
            .with("BackupRetentionPeriod", db.backup_retention_days)
            .with("PreferredBackupWindow", db.backup_window.as_str())
            .with("PreferredMaintenanceWindow", db.maintenance_window.as_str())
            .with("DBSubnetGroupName", subnet_group.reference())
            .with("VpcSecurityGroupIds", Value::list([security_group.reference()]))
            .with("DBClusterParameterGroupName", db.cluster_parameter_group.as_str());
        if let Some(username) = &secrets.database_username {
            cluster_props.insert("MasterUsername", username);
        }
        if let Some(password) = &secrets.database_password {
            cluster_props.insert("MasterUserPassword", password);
        }
        let cluster = stack.declare("DatabaseCluster", ResourceKind::DbCluster, cluster_props)?;

        let instance = stack.declare(
            "DatabaseInstance",
            ResourceKind::DbInstance,
            Properties::new()
                .with("Engine", db.engine.as_str())
                .with("DBClusterIdentifier", cluster.reference())
                .with("DBInstanceClass", db.instance_class.as_str())
                .with("DBSubnetGroupName", subnet_group.reference())
                .with("DBParameterGroupName", parameter_group.reference())
                .with("PubliclyAccessible", true)
                .with("DBInstanceIdentifier", db.name.as_str()),
        )?;

        let alarms = &db.alarms;
        let topic = || Value::list([alarm_topic.reference()]);
        let instance_dimension = || {
            Value::list([Properties::new()
                .with("Name", "DBInstanceIdentifier")
                .with("Value", instance.reference())])
        };
        let alarm = |description: String, metric: &str, unit: &str, threshold: Value, operator: &str| {
            Properties::new()
                .with("AlarmDescription", description)
                .with("Namespace", "AWS/RDS")
                .with("MetricName", metric)
                .with("Unit", unit)
                .with("Statistic", "Average")
                .with("Period", alarms.period_seconds)
                .with("EvaluationPeriods", alarms.evaluation_periods)
                .with("Threshold", threshold)
                .with("ComparisonOperator", operator)
                .with("Dimensions", instance_dimension())
                .with("AlarmActions", topic())
                .with("InsufficientDataActions", topic())
        };

        stack.declare(
            "DatabaseCPUAlarm",
            ResourceKind::Alarm,
            alarm(
                format!("Primary database CPU utilization is over {}%", alarms.cpu_threshold),
                "CPUUtilization",
                "Percent",
                alarms.cpu_threshold.into(),
                "GreaterThanOrEqualToThreshold",
            ),
        )?;
        stack.declare(
            "DatabaseMemoryAlarm",
            ResourceKind::Alarm,
            alarm(
                format!(
                    "Primary database freeable memory is under {}MB",
                    alarms.freeable_memory_threshold / 1_000_000
                ),
                "FreeableMemory",
                "Bytes",
                alarms.freeable_memory_threshold.into(),
                "LessThanOrEqualToThreshold",
            )
            .with("OKActions", topic()),
        )?;

        let gateway = stack.declare(
            "InternetGateway",
            ResourceKind::InternetGateway,
            Properties::new().with("Tags", name_tags(db.name.as_str())),
        )?;
        let attachment = stack.declare(
            "InternetGatewayAttachment",
            ResourceKind::VpcGatewayAttachment,
            Properties::new()
                .with("InternetGatewayId", gateway.reference())
                .with("VpcId", vpc.reference()),
        )?;
        let route_table = stack.declare(
            "PublicRouteTable",
            ResourceKind::RouteTable,
            Properties::new()
                .with("VpcId", vpc.reference())
                .with("Tags", name_tags(format!("{} Public Routes", db.name))),
        )?;
        let route = stack.declare(
            "DefaultPublicRoute",
            ResourceKind::Route,
            Properties::new()
                .with("RouteTableId", route_table.reference())
                .with("DestinationCidrBlock", "0.0.0.0/0")
                .with("GatewayId", gateway.reference()),
        )?;
        stack.depends_on(&route, &attachment)?;

        for (i, subnet) in subnets.iter().enumerate() {
            stack.declare(
                &format!("PublicSubnet{}RouteTableAssociation", i + 1),
                ResourceKind::SubnetRouteTableAssociation,
                Properties::new()
                    .with("RouteTableId", route_table.reference())
                    .with("SubnetId", subnet.reference()),
            )?;
        }

        stack.output_with_description(
            ENDPOINT_OUTPUT,
            cluster.attr(attributes::ENDPOINT_ADDRESS),
            "The database endpoint",
        )?;
        stack.output_with_description(PORT_OUTPUT, cluster.attr(attributes::ENDPOINT_PORT), "The database port")?;

        info!("Declared {} resources in {}", stack.len(), stack.name());
        Ok(DatabaseResources {
            vpc,
            cluster,
            instance,
            alarm_topic,
        })
    }
}
