//! Integration tests for stack synthesis and cross-stack references.

use std::collections::HashMap;

use forge_core::{
    App, Attribute, AttributeTable, LateBinding, LogicalId, Properties, Reference, Stack, StackState,
    SynthError, SynthResult, Value,
};
use proptest::prelude::*;

fn reference(target: &str, attribute: Attribute) -> Value {
    Value::Reference(Reference::new(LogicalId::new(target).unwrap(), attribute))
}

/// Declare nodes in order; each entry lists the ids it references.
fn declare_all(stack: &mut Stack, nodes: &[(&str, Vec<&str>)]) {
    for (name, refs) in nodes {
        let mut props = Properties::new();
        for target in refs.iter() {
            props.insert(format!("{}Id", target), reference(target, Attribute::Ref));
        }
        stack.declare(name, "Test::Resource", props).unwrap();
    }
}

#[test]
fn test_data_service_scenario() {
    let mut app = App::new();

    app.stack("Data", |stack, _| -> SynthResult<()> {
        let cluster = stack.declare("cluster", "AWS::RDS::DBCluster", Properties::new())?;
        stack.output("endpoint", cluster.attr("address"))
    })
    .unwrap();

    let data = app.manifest("Data").unwrap();
    assert_eq!(data.order(), vec!["cluster"]);
    assert_eq!(app.get("Data").unwrap().state(), StackState::Exported);

    app.stack("Service", |stack, bridge| -> SynthResult<()> {
        let endpoint = stack.import(bridge, "Data", "endpoint")?;
        stack.declare("task", "AWS::ECS::TaskDefinition", Properties::new().with("Host", endpoint))?;
        Ok(())
    })
    .unwrap();

    let service = app.manifest("Service").unwrap();
    let task = service.resource("task").unwrap();
    assert_eq!(
        task.properties.get("Host"),
        Some(&Value::LateBound(LateBinding::Import {
            export_name: "Data:endpoint".to_string(),
        }))
    );
}

#[test]
fn test_data_service_scenario_with_materialized_address() {
    let mut attributes = AttributeTable::new();
    attributes.insert("Data", "cluster", "address", serde_json::json!("cluster.abc.rds.amazonaws.com"));
    let mut app = App::new().with_attributes(attributes);

    app.stack("Data", |stack, _| -> SynthResult<()> {
        let cluster = stack.declare("cluster", "AWS::RDS::DBCluster", Properties::new())?;
        stack.output("endpoint", cluster.attr("address"))
    })
    .unwrap();

    app.stack("Service", |stack, bridge| -> SynthResult<()> {
        let endpoint = stack.import(bridge, "Data", "endpoint")?;
        let config = Value::join("", vec![Value::from("host: "), endpoint]);
        stack.declare("task", "AWS::ECS::TaskDefinition", Properties::new().with("Config", config))?;
        Ok(())
    })
    .unwrap();

    let task = app.manifest("Service").unwrap().resource("task").unwrap();
    assert_eq!(
        task.properties.get("Config").and_then(Value::as_str),
        Some("host: cluster.abc.rds.amazonaws.com")
    );
}

#[test]
fn test_three_node_cycle_any_declaration_order() {
    let orders = vec![
        vec![("A", vec!["B"]), ("B", vec!["C"]), ("C", vec!["A"])],
        vec![("C", vec!["A"]), ("A", vec!["B"]), ("B", vec!["C"])],
        vec![("B", vec!["C"]), ("C", vec!["A"]), ("A", vec!["B"])],
    ];

    for nodes in orders {
        let mut stack = Stack::new("Cyclic").unwrap();
        declare_all(&mut stack, &nodes);

        match stack.synthesize(&AttributeTable::new()) {
            Err(SynthError::CyclicDependency { cycle, .. }) => {
                assert_eq!(cycle.len(), 3);
                for name in ["A", "B", "C"] {
                    assert!(cycle.iter().any(|id| id.as_str() == name));
                }
            }
            other => panic!("expected a cycle, got {:?}", other.map(|m| m.order())),
        }
        assert!(stack.manifest().is_none());
    }
}

#[test]
fn test_explicit_two_node_cycle_emits_nothing() {
    let mut stack = Stack::new("Cyclic").unwrap();
    let a = stack.declare("A", "Test::Resource", Properties::new()).unwrap();
    let b = stack.declare("B", "Test::Resource", Properties::new()).unwrap();
    stack.depends_on(&a, &b).unwrap();
    stack.depends_on(&b, &a).unwrap();

    let err = stack.synthesize(&AttributeTable::new()).unwrap_err();
    assert!(matches!(err, SynthError::CyclicDependency { .. }));
    assert!(stack.manifest().is_none());
    assert_eq!(stack.state(), StackState::Failed);
}

#[test]
fn test_unknown_reference_fails_at_build() {
    let mut stack = Stack::new("Data").unwrap();
    stack
        .declare("Subnet", "AWS::EC2::Subnet", Properties::new().with("VpcId", reference("Vpc", Attribute::Ref)))
        .unwrap();

    let err = stack.synthesize(&AttributeTable::new()).unwrap_err();
    assert_eq!(
        err,
        SynthError::UnknownReference {
            stack: "Data".to_string(),
            from: "Subnet".to_string(),
            target: LogicalId::new("Vpc").unwrap(),
        }
    );
}

#[test]
fn test_reference_into_another_stack_is_unknown() {
    let mut producer = Stack::new("Data").unwrap();
    let cluster = producer.declare("Cluster", "AWS::RDS::DBCluster", Properties::new()).unwrap();

    let mut consumer = Stack::new("Service").unwrap();
    consumer
        .declare("Task", "AWS::ECS::TaskDefinition", Properties::new().with("Host", cluster.attr("Endpoint.Address")))
        .unwrap();

    assert!(matches!(
        consumer.synthesize(&AttributeTable::new()),
        Err(SynthError::UnknownReference { .. })
    ));
}

#[test]
fn test_identical_declarations_render_identically() {
    let render = || {
        let mut stack = Stack::new("Data").unwrap();
        declare_all(
            &mut stack,
            &[
                ("Route", vec!["Table", "Gateway"]),
                ("Gateway", vec![]),
                ("Table", vec!["Vpc"]),
                ("Vpc", vec![]),
                ("Attachment", vec!["Gateway", "Vpc"]),
            ],
        );
        stack.output("VpcId", reference("Vpc", Attribute::Ref)).unwrap();
        stack.synthesize(&AttributeTable::new()).unwrap().to_json_string()
    };

    let first = render();
    assert_eq!(first, render());
    assert!(first.find("\"Gateway\"").unwrap() < first.find("\"Route\": {").unwrap());
}

#[test]
fn test_join_of_markers_renders_fn_join() {
    let mut stack = Stack::new("Service").unwrap();
    let lb = stack.declare("LoadBalancer", "AWS::ElasticLoadBalancingV2::LoadBalancer", Properties::new()).unwrap();
    stack
        .output("ExternalUrl", Value::join("", vec![Value::from("http://"), lb.attr("DNSName")]))
        .unwrap();

    let template = stack.synthesize(&AttributeTable::new()).unwrap().to_template();
    assert_eq!(
        template["Outputs"]["ExternalUrl"]["Value"],
        serde_json::json!({ "Fn::Join": ["", ["http://", { "Fn::GetAtt": ["LoadBalancer", "DNSName"] }]] })
    );
    assert_eq!(template["Outputs"]["ExternalUrl"]["Export"]["Name"], "Service:ExternalUrl");
}

/// Edge kinds for generated graphs: 0 none, 1 property reference, 2 explicit.
fn acyclic_graph() -> impl Strategy<Value = (usize, Vec<Vec<u8>>, Vec<usize>)> {
    (1usize..12).prop_flat_map(|n| {
        (
            Just(n),
            proptest::collection::vec(proptest::collection::vec(0u8..3, n), n),
            Just((0..n).collect::<Vec<usize>>()).prop_shuffle(),
        )
    })
}

/// Node `i` may only depend on nodes `j < i`, so the graph is acyclic
/// whatever order the nodes are declared in.
fn build_generated(n: usize, edges: &[Vec<u8>], order: &[usize]) -> Stack {
    let mut stack = Stack::new("Generated").unwrap();
    let mut handles = HashMap::new();

    for &i in order {
        let mut props = Properties::new().with("Index", i as u64);
        for j in 0..i {
            if edges[i][j] == 1 {
                props.insert(format!("Dep{}", j), reference(&format!("N{}", j), Attribute::Ref));
            }
        }
        let handle = stack.declare(&format!("N{}", i), "Test::Node", props).unwrap();
        handles.insert(i, handle);
    }

    for i in 0..n {
        for j in 0..i {
            if edges[i][j] == 2 {
                stack.depends_on(&handles[&i], &handles[&j]).unwrap();
            }
        }
    }

    stack
}

proptest! {
    #[test]
    fn prop_every_node_emitted_once_after_its_dependencies((n, edges, order) in acyclic_graph()) {
        let mut stack = build_generated(n, &edges, &order);
        let manifest = stack.synthesize(&AttributeTable::new()).unwrap();

        prop_assert_eq!(manifest.resources.len(), n);
        for i in 0..n {
            let pos = manifest.position(&format!("N{}", i));
            prop_assert!(pos.is_some());
            for j in 0..i {
                if edges[i][j] != 0 {
                    let dep = manifest.position(&format!("N{}", j));
                    prop_assert!(dep < pos, "N{} emitted after its dependent N{}", j, i);
                }
            }
        }
    }

    #[test]
    fn prop_synthesis_is_deterministic((n, edges, order) in acyclic_graph()) {
        let mut first = build_generated(n, &edges, &order);
        let mut second = build_generated(n, &edges, &order);

        let a = first.synthesize(&AttributeTable::new()).unwrap().to_json_string();
        let b = second.synthesize(&AttributeTable::new()).unwrap().to_json_string();
        prop_assert_eq!(a, b);
    }
}
