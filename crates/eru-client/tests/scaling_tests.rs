//! Scale planner integration tests against a mock server

use eru_client::{EruClient, EruError, ScaleInOptions, ScaleOutOptions, ScaleOutcome};
use mockito::Matcher;
use serde_json::{json, Value};

fn client(server: &mockito::Server) -> EruClient {
    EruClient::new(&server.url()).unwrap()
}

fn container_json(id: &str, entrypoint: &str, pod: &str, created: &str, in_removal: bool) -> Value {
    json!({
        "container_id": id,
        "appname": "myapp",
        "version": "3def4a6",
        "entrypoint": entrypoint,
        "env": "prod",
        "podname": pod,
        "created": created,
        "in_removal": in_removal,
        "networks": [{"name": "vlan", "vlan_address": "10.100.1.5/24"}],
        "cores": {"full": ["0", "1"], "part": []}
    })
}

async fn mock_inventory(server: &mut mockito::Server, containers: &[Value]) -> mockito::Mock {
    server
        .mock("GET", "/api/app/myapp/containers/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("start".into(), "0".into()),
            Matcher::UrlEncoded("limit".into(), "100".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(Value::Array(containers.to_vec()).to_string())
        .create_async()
        .await
}

#[tokio::test]
async fn test_scale_out_doubles_cohort_and_requests_network_base() {
    let mut server = mockito::Server::new_async().await;
    let inventory = mock_inventory(
        &mut server,
        &[
            container_json("c1", "web", "intra", "2020-01-01 00:00:00", false),
            container_json("c2", "web", "intra", "2020-01-02 00:00:00", false),
        ],
    )
    .await;

    let deploy = server
        .mock("POST", "/api/deploy/private/")
        .match_query(Matcher::Any)
        .match_body(Matcher::Json(json!({
            "podname": "intra",
            "appname": "myapp",
            "ncore": 2,
            "ncontainer": 2,
            "version": "3def4a6",
            "entrypoint": "web",
            "env": "prod",
            "networks": ["10.100.1.0"],
            "ports": [],
            "args": [],
            "callback_url": "",
        })))
        .with_header("content-type", "application/json")
        .with_body(r#"{"r": 0, "msg": "ok", "tasks": [1]}"#)
        .create_async()
        .await;

    let report = client(&server)
        .scale_out("myapp", ScaleOutOptions::default())
        .await
        .unwrap();

    assert_eq!(report.len(), 1);
    assert!(matches!(
        report[0].outcome,
        ScaleOutcome::Deployed { added: 2, .. }
    ));
    inventory.assert_async().await;
    deploy.assert_async().await;
}

#[tokio::test]
async fn test_scale_out_clamps_delta_to_ceiling() {
    let mut server = mockito::Server::new_async().await;
    let containers: Vec<Value> = (0..45)
        .map(|i| {
            container_json(
                &format!("c{}", i),
                "web",
                "intra",
                "2020-01-01 00:00:00",
                false,
            )
        })
        .collect();
    mock_inventory(&mut server, &containers).await;

    let deploy = server
        .mock("POST", "/api/deploy/private/")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({ "ncontainer": 5 })))
        .with_header("content-type", "application/json")
        .with_body(r#"{"r": 0, "msg": "ok"}"#)
        .create_async()
        .await;

    let opts = ScaleOutOptions {
        ncontainer: Some(10),
        ..ScaleOutOptions::default()
    };
    let report = client(&server).scale_out("myapp", opts).await.unwrap();

    assert_eq!(report.len(), 1);
    assert!(matches!(
        report[0].outcome,
        ScaleOutcome::Deployed { added: 5, .. }
    ));
    deploy.assert_async().await;
}

#[tokio::test]
async fn test_scale_out_fails_at_ceiling_without_deploying() {
    let mut server = mockito::Server::new_async().await;
    let containers: Vec<Value> = (0..50)
        .map(|i| {
            container_json(
                &format!("c{}", i),
                "web",
                "intra",
                "2020-01-01 00:00:00",
                false,
            )
        })
        .collect();
    mock_inventory(&mut server, &containers).await;

    let deploy = server
        .mock("POST", "/api/deploy/private/")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = client(&server)
        .scale_out("myapp", ScaleOutOptions::default())
        .await
        .unwrap_err();

    match err {
        EruError::ScaleLimit {
            current,
            ceiling,
            report,
            ..
        } => {
            assert_eq!(current, 50);
            assert_eq!(ceiling, 50);
            assert_eq!(report.len(), 1);
            assert!(matches!(
                report[0].outcome,
                ScaleOutcome::AtCeiling {
                    current: 50,
                    ceiling: 50
                }
            ));
        }
        other => panic!("expected ScaleLimit, got {:?}", other),
    }
    deploy.assert_async().await;
}

#[tokio::test]
async fn test_scale_out_attempts_every_cohort_then_aggregates_failures() {
    let mut server = mockito::Server::new_async().await;
    mock_inventory(
        &mut server,
        &[
            container_json("w1", "web", "intra", "2020-01-01 00:00:00", false),
            container_json("k1", "worker", "intra", "2020-01-01 00:00:00", false),
        ],
    )
    .await;

    let web_deploy = server
        .mock("POST", "/api/deploy/private/")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({ "entrypoint": "web" })))
        .with_header("content-type", "application/json")
        .with_body(r#"{"r": 0, "msg": "ok"}"#)
        .create_async()
        .await;
    let worker_deploy = server
        .mock("POST", "/api/deploy/private/")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({ "entrypoint": "worker" })))
        .with_header("content-type", "application/json")
        .with_body(r#"{"r": 1, "msg": "no capacity"}"#)
        .create_async()
        .await;

    let err = client(&server)
        .scale_out("myapp", ScaleOutOptions::default())
        .await
        .unwrap_err();

    match err {
        EruError::ScaleAggregate {
            failed,
            total,
            report,
        } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 2);
            let worker = report
                .iter()
                .find(|r| r.cohort.entrypoint == "worker")
                .unwrap();
            assert!(matches!(worker.outcome, ScaleOutcome::Failed { .. }));
            let web = report.iter().find(|r| r.cohort.entrypoint == "web").unwrap();
            assert!(web.is_ok());
        }
        other => panic!("expected ScaleAggregate, got {:?}", other),
    }
    // the failing sibling never stopped the healthy cohort
    web_deploy.assert_async().await;
    worker_deploy.assert_async().await;
}

#[tokio::test]
async fn test_scale_out_ignores_containers_in_removal() {
    let mut server = mockito::Server::new_async().await;
    mock_inventory(
        &mut server,
        &[
            container_json("c1", "web", "intra", "2020-01-01 00:00:00", false),
            container_json("c2", "web", "intra", "2020-01-02 00:00:00", false),
            container_json("dying", "web", "intra", "2020-01-03 00:00:00", true),
        ],
    )
    .await;

    // doubling counts the two live containers only
    let deploy = server
        .mock("POST", "/api/deploy/private/")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({ "ncontainer": 2 })))
        .with_header("content-type", "application/json")
        .with_body(r#"{"r": 0, "msg": "ok"}"#)
        .create_async()
        .await;

    client(&server)
        .scale_out("myapp", ScaleOutOptions::default())
        .await
        .unwrap();
    deploy.assert_async().await;
}

#[tokio::test]
async fn test_scale_out_with_no_containers_is_a_noop() {
    let mut server = mockito::Server::new_async().await;
    mock_inventory(&mut server, &[]).await;

    let report = client(&server)
        .scale_out("myapp", ScaleOutOptions::default())
        .await
        .unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_scale_out_respects_entrypoint_filter() {
    let mut server = mockito::Server::new_async().await;
    mock_inventory(
        &mut server,
        &[
            container_json("w1", "web", "intra", "2020-01-01 00:00:00", false),
            container_json("k1", "worker", "intra", "2020-01-01 00:00:00", false),
        ],
    )
    .await;

    let deploy = server
        .mock("POST", "/api/deploy/private/")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({ "entrypoint": "web" })))
        .with_header("content-type", "application/json")
        .with_body(r#"{"r": 0, "msg": "ok"}"#)
        .create_async()
        .await;

    let opts = ScaleOutOptions {
        entrypoints: vec!["web".to_string()],
        ..ScaleOutOptions::default()
    };
    let report = client(&server).scale_out("myapp", opts).await.unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(report[0].cohort.entrypoint, "web");
    deploy.assert_async().await;
}

#[tokio::test]
async fn test_scale_in_removes_oldest_in_one_batch() {
    let mut server = mockito::Server::new_async().await;
    mock_inventory(
        &mut server,
        &[
            container_json("newest", "web", "intra", "2020-05-01 00:00:00", false),
            container_json("oldest", "web", "intra", "2020-01-01 00:00:00", false),
            container_json("mid", "web", "intra", "2020-02-01 00:00:00", false),
            container_json("newer", "web", "intra", "2020-04-01 00:00:00", false),
            container_json("new", "web", "intra", "2020-03-01 00:00:00", false),
        ],
    )
    .await;

    let removal = server
        .mock("POST", "/api/deploy/rmcontainers/")
        .match_query(Matcher::Any)
        .match_body(Matcher::Json(json!({ "cids": ["oldest", "mid"] })))
        .with_header("content-type", "application/json")
        .with_body(r#"{"r": 0, "msg": "ok"}"#)
        .create_async()
        .await;

    let result = client(&server)
        .scale_in("myapp", 2, ScaleInOptions::default())
        .await
        .unwrap();

    assert!(result.is_ok());
    removal.assert_async().await;
}

#[tokio::test]
async fn test_scale_in_at_floor_still_issues_empty_removal() {
    let mut server = mockito::Server::new_async().await;
    mock_inventory(
        &mut server,
        &[
            container_json("c1", "web", "intra", "2020-01-01 00:00:00", false),
            container_json("c2", "web", "intra", "2020-02-01 00:00:00", false),
        ],
    )
    .await;

    let removal = server
        .mock("POST", "/api/deploy/rmcontainers/")
        .match_query(Matcher::Any)
        .match_body(Matcher::Json(json!({ "cids": [] })))
        .with_header("content-type", "application/json")
        .with_body(r#"{"r": 0, "msg": "ok"}"#)
        .create_async()
        .await;

    let result = client(&server)
        .scale_in("myapp", 1, ScaleInOptions::default())
        .await
        .unwrap();

    assert!(result.is_ok());
    removal.assert_async().await;
}

#[tokio::test]
async fn test_scale_in_filters_pods_before_grouping() {
    let mut server = mockito::Server::new_async().await;
    mock_inventory(
        &mut server,
        &[
            container_json("i1", "web", "intra", "2020-01-01 00:00:00", false),
            container_json("p1", "web", "public", "2019-01-01 00:00:00", false),
            container_json("i2", "web", "intra", "2020-02-01 00:00:00", false),
            container_json("p2", "web", "public", "2019-02-01 00:00:00", false),
            container_json("i3", "web", "intra", "2020-03-01 00:00:00", false),
        ],
    )
    .await;

    // p1 is globally oldest but lives on an excluded pod
    let removal = server
        .mock("POST", "/api/deploy/rmcontainers/")
        .match_query(Matcher::Any)
        .match_body(Matcher::Json(json!({ "cids": ["i1"] })))
        .with_header("content-type", "application/json")
        .with_body(r#"{"r": 0, "msg": "ok"}"#)
        .create_async()
        .await;

    let opts = ScaleInOptions {
        pod_names: vec!["intra".to_string()],
        ..ScaleInOptions::default()
    };
    client(&server).scale_in("myapp", 1, opts).await.unwrap();
    removal.assert_async().await;
}
