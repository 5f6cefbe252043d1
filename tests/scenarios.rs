//! Replays the literal end-to-end scenarios from spec.md §8 against a
//! single-process server (`Coordinator` + `LocalConsensus` + `Server` +
//! `LocalEndpoint`) driven by real `ClientSession`s.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use zoolite::testing::Cluster;
use zoolite::{
    ClientConfig, ClientSession, Consensus, CreateFlags, Endpoint, Error, LocalConsensus,
    LocalEndpoint, Path, Server, ServerConfig,
};

fn test_server_config() -> ServerConfig {
    ServerConfig { session_timeout: Duration::from_millis(80) }
}

fn test_client_config() -> ClientConfig {
    ClientConfig { keep_alive_interval: Duration::from_millis(15), retry_backoff: Duration::from_millis(5) }
}

/// A single-replica server wired up entirely in-process, for tests that
/// don't need to exercise leader failover.
fn single_node_endpoint(config: ServerConfig) -> Endpoint {
    let coordinator = Arc::new(zoolite::Coordinator::new(config));
    let applier = {
        let coordinator = Arc::clone(&coordinator);
        move |req| coordinator.apply(req)
    };
    let server = Arc::new(Server::new(coordinator, LocalConsensus::new(applier)));
    Arc::new(LocalEndpoint::new(server))
}

fn session(endpoint: Endpoint) -> Arc<ClientSession> {
    ClientSession::make_session(vec![endpoint], test_client_config())
}

#[test]
fn scenario_1_basic() {
    let endpoint = single_node_endpoint(test_server_config());
    let client = session(endpoint);

    client.create(&Path::parse("/a"), "", CreateFlags::NONE).unwrap();
    client.create(&Path::parse("/a/b"), "hello", CreateFlags::NONE).unwrap();

    let (exists_b, _) = client.exists(&Path::parse("/a/b"), false).unwrap();
    assert!(exists_b);
    let (exists_c, _) = client.exists(&Path::parse("/a/b/c"), false).unwrap();
    assert!(!exists_c);

    let (data, version, _) = client.get_data(&Path::parse("/a/b"), false).unwrap();
    assert_eq!((data.as_str(), version), ("hello", 1));

    client.set_data(&Path::parse("/a/b"), "bye", 1).unwrap();
    let (data, version, _) = client.get_data(&Path::parse("/a/b"), false).unwrap();
    assert_eq!((data.as_str(), version), ("bye", 2));

    client.create(&Path::parse("/a/c"), "", CreateFlags::NONE).unwrap();
    client.create(&Path::parse("/a/d"), "", CreateFlags::NONE).unwrap();

    let (children, _) = client.get_children(&Path::parse("/a"), false).unwrap();
    assert_eq!(children, vec!["b", "c", "d"]);

    client.delete(&Path::parse("/a/b"), 2).unwrap();
    let (exists_b, _) = client.exists(&Path::parse("/a/b"), false).unwrap();
    assert!(!exists_b);
}

#[test]
fn scenario_2_sequential_with_three_clients() {
    let endpoint = single_node_endpoint(test_server_config());
    let first = session(Arc::clone(&endpoint));

    let reply = first.create(&Path::parse("/a/seq-"), "", CreateFlags::SEQUENTIAL).unwrap();
    assert_eq!(reply, Path::parse("/a/seq-0"));

    let mut total: usize = 1;
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let endpoint = Arc::clone(&endpoint);
            thread::spawn(move || {
                let client = session(endpoint);
                let deadline = std::time::Instant::now() + Duration::from_millis(5);
                let mut count = 0;
                while std::time::Instant::now() < deadline {
                    client.create(&Path::parse("/a/seq-"), "", CreateFlags::SEQUENTIAL).unwrap();
                    count += 1;
                }
                count
            })
        })
        .collect();

    for h in handles {
        total += h.join().unwrap();
    }

    let last = first.create(&Path::parse("/a/seq-"), "", CreateFlags::SEQUENTIAL).unwrap();
    assert_eq!(last, Path::parse(&format!("/a/seq-{}", total)));
}

#[test]
fn scenario_3_ephemeral_znode_dies_with_its_session() {
    let config = test_server_config();
    let endpoint = single_node_endpoint(config);

    let owner = session(Arc::clone(&endpoint));
    let watcher = session(Arc::clone(&endpoint));

    owner.create(&Path::parse("/a"), "", CreateFlags::NONE).unwrap();
    owner.create(&Path::parse("/a/x"), "", CreateFlags::EPHEMERAL).unwrap();

    let (exists, _) = watcher.exists(&Path::parse("/a/x"), false).unwrap();
    assert!(exists);

    let (exists, watch) = watcher.exists(&Path::parse("/a/x"), true).unwrap();
    assert!(exists);
    let watch = watch.expect("Exists on a present node registers a NodeDeleted watch");

    // Abandon the owner's keep-alive (drop all references the test holds;
    // the background thread keeps running but its session will expire).
    drop(owner);

    thread::sleep(config.session_timeout + Duration::from_millis(60));

    // Any further apply (here, the watcher's own Exists) reaps the owner.
    let (exists, _) = watcher.exists(&Path::parse("/a/x"), false).unwrap();
    assert!(!exists);

    let event = watch.wait().expect("the watch fires once the ephemeral node is reaped");
    assert_eq!(event.kind, zoolite::EventKind::NodeDeleted);
    assert_eq!(event.path, Path::parse("/a/x"));
}

#[test]
fn scenario_4_watch_on_data_change() {
    let endpoint = single_node_endpoint(test_server_config());
    let client = session(endpoint);

    client.create(&Path::parse("/a"), "", CreateFlags::NONE).unwrap();
    client.create(&Path::parse("/a/b"), "init", CreateFlags::NONE).unwrap();

    let (_, _, watch) = client.get_data(&Path::parse("/a/b"), true).unwrap();
    let watch = watch.expect("GetData with watch=true registers a NodeDataChanged watch");

    client.set_data(&Path::parse("/a/b"), "r", 1).unwrap();

    let event = watch.wait().unwrap();
    assert_eq!(event.kind, zoolite::EventKind::NodeDataChanged);
    assert_eq!(event.path, Path::parse("/a/b"));

    let (data, version, _) = client.get_data(&Path::parse("/a/b"), false).unwrap();
    assert_eq!((data.as_str(), version), ("r", 2));
}

#[test]
fn scenario_5_watch_on_children_change() {
    let endpoint = single_node_endpoint(test_server_config());
    let client = session(endpoint);

    client.create(&Path::parse("/a"), "", CreateFlags::NONE).unwrap();
    client.create(&Path::parse("/a/b"), "", CreateFlags::NONE).unwrap();
    client.create(&Path::parse("/a/b/delete"), "", CreateFlags::NONE).unwrap();

    let (_, watch) = client.get_children(&Path::parse("/a/b"), true).unwrap();
    let watch = watch.expect("GetChildren with watch=true registers a NodeChildrenChanged watch");

    client.create(&Path::parse("/a/b/create"), "", CreateFlags::NONE).unwrap();

    let event = watch.wait().unwrap();
    assert_eq!(event.kind, zoolite::EventKind::NodeChildrenChanged);
    assert_eq!(event.path, Path::parse("/a/b"));

    let (children, _) = client.get_children(&Path::parse("/a/b"), false).unwrap();
    assert_eq!(children, vec!["create", "delete"]);

    let (_, watch) = client.get_children(&Path::parse("/a/b"), true).unwrap();
    let watch = watch.unwrap();

    client.delete(&Path::parse("/a/b/delete"), 1).unwrap();

    let event = watch.wait().unwrap();
    assert_eq!(event.kind, zoolite::EventKind::NodeChildrenChanged);

    let (children, _) = client.get_children(&Path::parse("/a/b"), false).unwrap();
    assert_eq!(children, vec!["create"]);
}

#[test]
fn scenario_6_leader_crash_resilience() {
    use zoolite::op::{CreateArgs, Op, StartSessionArgs, TimestampedRequest};
    use zoolite::{SessionId, Timestamp};

    let mut cluster = Cluster::new(3, ServerConfig::default());

    let sessions: Vec<SessionId> = (0..3)
        .map(|i| match cluster.apply(TimestampedRequest { timestamp: Timestamp(i), op: Op::StartSession(StartSessionArgs) }) {
            zoolite::op::Reply::StartSession(r) => r.session_id.unwrap(),
            _ => unreachable!(),
        })
        .collect();

    let mut ts = 10i64;
    let mut total = 0usize;
    for round in 0..5 {
        for &sid in &sessions {
            cluster.apply(TimestampedRequest {
                timestamp: Timestamp(ts),
                op: Op::Create(CreateArgs {
                    session_id: sid,
                    path: Path::parse("/seq-"),
                    data: "".into(),
                    flags: CreateFlags::SEQUENTIAL,
                }),
            });
            ts += 1;
            total += 1;
        }
        if round == 2 {
            // Crash and restart every replica once, mid-stream.
            for i in 0..3 {
                cluster.restart_replica(i);
            }
            assert!(cluster.last_replies_agree());
        }
    }

    let reply = cluster.apply(TimestampedRequest {
        timestamp: Timestamp(ts),
        op: Op::Create(CreateArgs {
            session_id: sessions[0],
            path: Path::parse("/seq-"),
            data: "".into(),
            flags: CreateFlags::SEQUENTIAL,
        }),
    });
    assert!(cluster.last_replies_agree());

    match reply {
        zoolite::op::Reply::Create(r) => {
            assert_eq!(r.znode_name, Some(Path::parse(&format!("/seq-{}", total))));
        }
        _ => panic!("expected a Create reply"),
    }
}
