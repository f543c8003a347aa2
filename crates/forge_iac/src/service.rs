//! Service tier: Prisma on Fargate behind a public load balancer.
//!
//! The service stack never touches the database stack directly. The cluster
//! endpoint reaches it as two bridged exports, resolved through a
//! [`DatabaseLink`].
//!
//! ## Differences from the hand-written Prisma templates
//!
//! - The target group's logical id is `PrismaTargetGroup`. Templates that
//!   were deployed as `PrismsTargetGroup` will see the applier replace the
//!   target group (and briefly deregister tasks) on the next update.
//! - `EcsSecurityGroupFromPublicALB` admits traffic whose source is the
//!   load balancer's security group (`PublicLoadBalancerSG`), not the
//!   container group itself.

use forge_core::{Bridge, Properties, Resource, Stack, SynthResult, Value};
use tracing::{debug, info};

use crate::config::EnvironmentConfig;
use crate::database::{ENDPOINT_OUTPUT, PORT_OUTPUT};
use crate::provider::{allow_policy, assume_role_policy, attributes, name_tags, region, ResourceKind};

/// Output carrying the ECS cluster name.
pub const CLUSTER_NAME_OUTPUT: &str = "ClusterName";
/// Output carrying the public URL of the load balancer.
pub const EXTERNAL_URL_OUTPUT: &str = "ExternalUrl";

const CONTAINER_NAME: &str = "prisma-container";

const ECS_SERVICE_ACTIONS: &[&str] = &[
    "ec2:AttachNetworkInterface",
    "ec2:CreateNetworkInterface",
    "ec2:CreateNetworkInterfacePermission",
    "ec2:DeleteNetworkInterface",
    "ec2:DeleteNetworkInterfacePermission",
    "ec2:Describe*",
    "ec2:DetachNetworkInterface",
    "elasticloadbalancing:DeregisterInstancesFromLoadBalancer",
    "elasticloadbalancing:DeregisterTargets",
    "elasticloadbalancing:Describe*",
    "elasticloadbalancing:RegisterInstancesWithLoadBalancer",
    "elasticloadbalancing:RegisterTargets",
];

const TASK_EXECUTION_ACTIONS: &[&str] = &[
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

/// The database endpoint as imported from the database stack.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseLink {
    pub address: Value,
    pub port: Value,
}

impl DatabaseLink {
    /// Import the endpoint exports of `database_stack`.
    pub fn import(stack: &mut Stack, bridge: &Bridge, database_stack: &str) -> SynthResult<Self> {
        let address = stack.import(bridge, database_stack, ENDPOINT_OUTPUT)?;
        let port = stack.import(bridge, database_stack, PORT_OUTPUT)?;
        debug!("Linked {} to the {} endpoint", stack.name(), database_stack);
        Ok(Self { address, port })
    }
}

/// Handles to the resources other code may want to reference.
#[derive(Debug, Clone)]
pub struct ServiceResources {
    pub vpc: Resource,
    pub cluster: Resource,
    pub load_balancer: Resource,
    pub task_definition: Resource,
    pub service: Resource,
}

/// Declares the service tier into a stack.
pub struct ServiceStack<'a> {
    config: &'a EnvironmentConfig,
    link: &'a DatabaseLink,
}

impl<'a> ServiceStack<'a> {
    pub fn new(config: &'a EnvironmentConfig, link: &'a DatabaseLink) -> Self {
        Self { config, link }
    }

    /// The `PRISMA_CONFIG` document handed to the container.
    ///
    /// Folds to a plain string when the endpoint is already materialized,
    /// and renders as `Fn::Join` otherwise.
    pub fn prisma_config(&self) -> Value {
        let secrets = &self.config.secrets;
        let secret = |s: &Option<String>| Value::from(s.clone().unwrap_or_default());

        Value::join(
            "",
            [
                Value::from(format!(
                    "\nport: {}\nmanagementApiSecret: ",
                    self.config.service.container_port
                )),
                secret(&secrets.management_secret),
                Value::from("\ndatabases:\n  default:\n    connector: mysql\n    host: "),
                self.link.address.clone(),
                Value::from("\n    port: "),
                self.link.port.clone(),
                Value::from("\n    user: "),
                secret(&secrets.database_username),
                Value::from("\n    password: "),
                secret(&secrets.database_password),
                Value::from("\n    migrations: true\n"),
            ],
        )
    }

    pub fn declare(&self, stack: &mut Stack) -> SynthResult<ServiceResources> {
        let svc = &self.config.service;
        let network = &svc.network;
        let stack_name = stack.name().to_string();

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
            subnets.push(stack.declare(
                &format!("PublicSubnet{}", i + 1),
                ResourceKind::Subnet,
                Properties::new()
                    .with("VpcId", vpc.reference())
                    .with("AvailabilityZone", zone)
                    .with("CidrBlock", cidr)
                    .with("MapPublicIpOnLaunch", true)
                    .with("Tags", name_tags(format!("{} Public Subnet (AZ{})", svc.name, i + 1))),
            )?);
        }
        let subnet_refs = || Value::list(subnets.iter().map(Resource::reference));

        let gateway = stack.declare("InternetGateway", ResourceKind::InternetGateway, Properties::new())?;
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
            Properties::new().with("VpcId", vpc.reference()),
        )?;
        let route = stack.declare(
            "PublicRoute",
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

        let cluster = stack.declare("ECSCluster", ResourceKind::EcsCluster, Properties::new())?;

        let container_sg = stack.declare(
            "FargateContainerSecurityGroup",
            ResourceKind::SecurityGroup,
            Properties::new()
                .with("GroupDescription", "Access to the Fargate containers")
                .with("VpcId", vpc.reference()),
        )?;

        let load_balancer_sg = stack.declare(
            "PublicLoadBalancerSG",
            ResourceKind::SecurityGroup,
            Properties::new()
                .with("GroupDescription", "Access to the public facing load balancer")
                .with("VpcId", vpc.reference())
                .with(
                    "SecurityGroupIngress",
                    Value::list([Properties::new().with("CidrIp", "0.0.0.0/0").with("IpProtocol", "-1")]),
                ),
        )?;

        stack.declare(
            "EcsSecurityGroupFromPublicALB",
            ResourceKind::SecurityGroupIngress,
            Properties::new()
                .with("Description", "Ingress from the public ALB")
                .with("GroupId", container_sg.reference())
                .with("IpProtocol", "-1")
                .with("SourceSecurityGroupId", load_balancer_sg.reference()),
        )?;
        stack.declare(
            "EcsSecurityGroupIngressFromSelf",
            ResourceKind::SecurityGroupIngress,
            Properties::new()
                .with("Description", "Ingress from other containers in the same security group")
                .with("GroupId", container_sg.reference())
                .with("IpProtocol", "-1")
                .with("SourceSecurityGroupId", container_sg.reference()),
        )?;

        let load_balancer = stack.declare(
            "PublicLoadBalancer",
            ResourceKind::LoadBalancer,
            Properties::new()
                .with("Scheme", "internet-facing")
                .with(
                    "LoadBalancerAttributes",
                    Value::list([Properties::new()
                        .with("Key", "idle_timeout.timeout_seconds")
                        .with("Value", svc.idle_timeout_seconds.to_string())]),
                )
                .with("Subnets", subnet_refs())
                .with("SecurityGroups", Value::list([load_balancer_sg.reference()])),
        )?;

        let target_group = stack.declare(
            "PrismaTargetGroup",
            ResourceKind::TargetGroup,
            Properties::new()
                .with("HealthCheckIntervalSeconds", 6)
                .with("HealthCheckPath", svc.health_check_path.as_str())
                .with("HealthCheckProtocol", "HTTP")
                .with("HealthCheckTimeoutSeconds", 5)
                .with("HealthyThresholdCount", 2)
                .with("Name", format!("{}-prisma", stack_name))
                .with("Port", svc.listener_port)
                .with("Protocol", "HTTP")
                .with("UnhealthyThresholdCount", 2)
                .with("VpcId", vpc.reference())
                .with("TargetType", "ip"),
        )?;

        let listener = stack.declare(
            "PublicLoadBalancerListener",
            ResourceKind::Listener,
            Properties::new()
                .with(
                    "DefaultActions",
                    Value::list([Properties::new()
                        .with("TargetGroupArn", target_group.reference())
                        .with("Type", "forward")]),
                )
                .with("LoadBalancerArn", load_balancer.reference())
                .with("Port", svc.listener_port)
                .with("Protocol", "HTTP"),
        )?;
        stack.depends_on(&listener, &load_balancer)?;

        stack.declare(
            "PrismaLogs",
            ResourceKind::LogGroup,
            Properties::new()
                .with("LogGroupName", stack_name.as_str())
                .with("RetentionInDays", svc.log_retention_days),
        )?;

        stack.declare(
            "ECSRole",
            ResourceKind::IamRole,
            Properties::new()
                .with("AssumeRolePolicyDocument", assume_role_policy("ecs.amazonaws.com"))
                .with("Path", "/")
                .with("Policies", Value::list([allow_policy("ecs-service", ECS_SERVICE_ACTIONS)])),
        )?;
        let execution_role = stack.declare(
            "ECSTaskExecutionRole",
            ResourceKind::IamRole,
            Properties::new()
                .with("AssumeRolePolicyDocument", assume_role_policy("ecs-tasks.amazonaws.com"))
                .with("Path", "/")
                .with(
                    "Policies",
                    Value::list([allow_policy("AmazonECSTaskExecutionRolePolicy", TASK_EXECUTION_ACTIONS)]),
                ),
        )?;

        let container = Properties::new()
            .with("Name", CONTAINER_NAME)
            .with("Essential", true)
            .with("Image", svc.image_ref())
            .with(
                "PortMappings",
                Value::list([Properties::new().with("ContainerPort", svc.container_port)]),
            )
            .with(
                "Environment",
                Value::list([
                    Properties::new().with("Name", "PRISMA_CONFIG").with("Value", self.prisma_config()),
                    Properties::new().with("Name", "JAVA_OPTS").with("Value", svc.jvm_opts.as_str()),
                ]),
            )
            .with(
                "Ulimits",
                Value::list([Properties::new()
                    .with("Name", "nofile")
                    .with("HardLimit", 1_000_000)
                    .with("SoftLimit", 1_000_000)]),
            )
            .with(
                "LogConfiguration",
                Properties::new().with("LogDriver", "awslogs").with(
                    "Options",
                    Properties::new()
                        .with("awslogs-group", stack_name.as_str())
                        .with("awslogs-region", region(self.config.region.as_deref()))
                        .with("awslogs-stream-prefix", "prisma"),
                ),
            );

        let task_definition = stack.declare(
            "TaskDefinition",
            ResourceKind::EcsTaskDefinition,
            Properties::new()
                .with("Cpu", svc.cpu.as_str())
                .with("Memory", svc.memory.as_str())
                .with("RequiresCompatibilities", Value::list(["FARGATE"]))
                .with("Family", "prisma")
                .with("NetworkMode", "awsvpc")
                .with("ExecutionRoleArn", execution_role.reference())
                .with("TaskRoleArn", execution_role.reference())
                .with("ContainerDefinitions", Value::list([container])),
        )?;

        let service = stack.declare(
            "PrismaService",
            ResourceKind::EcsService,
            Properties::new()
                .with("Cluster", cluster.reference())
                .with("ServiceName", "Prisma")
                .with("LaunchType", "FARGATE")
                .with("DesiredCount", svc.desired_count)
                .with(
                    "DeploymentConfiguration",
                    Properties::new().with("MaximumPercent", 200).with("MinimumHealthyPercent", 50),
                )
                .with("TaskDefinition", task_definition.reference())
                .with(
                    "LoadBalancers",
                    Value::list([Properties::new()
                        .with("ContainerName", CONTAINER_NAME)
                        .with("ContainerPort", svc.container_port)
                        .with("TargetGroupArn", target_group.reference())]),
                )
                .with(
                    "NetworkConfiguration",
                    Properties::new().with(
                        "AwsvpcConfiguration",
                        Properties::new()
                            .with("AssignPublicIp", "ENABLED")
                            .with("SecurityGroups", Value::list([load_balancer_sg.reference()]))
                            .with("Subnets", subnet_refs()),
                    ),
                ),
        )?;
        stack.depends_on(&service, &listener)?;

        stack.output_with_description(CLUSTER_NAME_OUTPUT, cluster.reference(), "The name of the ECS cluster")?;
        stack.output_with_description(
            EXTERNAL_URL_OUTPUT,
            Value::join("", [Value::from("http://"), load_balancer.attr(attributes::DNS_NAME)]),
            "The url of the external load balancer",
        )?;

        info!("Declared {} resources in {}", stack.len(), stack_name);
        Ok(ServiceResources {
            vpc,
            cluster,
            load_balancer,
            task_definition,
            service,
        })
    }
}
