//! End-to-end batches against the in-process cluster.

use std::f64::consts::PI;

use qmesh_adapter_sim::LocalCluster;
use qmesh_hal::{ExecType, HalError, Job, RunConfig, gather, submit_batch};
use qmesh_ir::{Circuit, QubitId, RelayKind};

#[tokio::test]
async fn relayed_coin_flip_splits_the_receiver() {
    let cluster = LocalCluster::new(2);

    let mut a = Circuit::with_id("a", 1);
    a.h(QubitId(0))
        .unwrap()
        .measure_and_send(QubitId(0), "b")
        .unwrap();
    let mut b = Circuit::with_id("b", 1);
    b.remote_c_if("x", [QubitId(0)], vec![], &a)
        .unwrap()
        .measure_all()
        .unwrap();

    let mut batch = submit_batch(
        &[a.snapshot(), b.snapshot()],
        cluster.endpoints(),
        &RunConfig::new(1000).with_seed(42),
    )
    .unwrap();
    assert!(batch.jobs.iter().all(|j| j.exec_type() == ExecType::Dynamic));

    let results = gather(&mut batch.jobs).await.unwrap();
    assert_eq!(results[0].circuit_id, "a");
    assert_eq!(results[1].circuit_id, "b");

    let counts = &results[1].counts;
    assert_eq!(counts.total_shots(), 1000);
    assert_eq!(counts.get("0") + counts.get("1"), 1000);
    assert!(
        (400..=600).contains(&counts.get("1")),
        "skewed outcome: {counts:?}"
    );
}

#[tokio::test]
async fn independent_circuits_run_offloaded() {
    let cluster = LocalCluster::new(2);
    let mut first = Circuit::with_id("bell-1", 2);
    first
        .h(QubitId(0))
        .unwrap()
        .cx(QubitId(0), QubitId(1))
        .unwrap()
        .measure_all()
        .unwrap();
    let mut second = first.snapshot();
    second.id = "bell-2".into();

    let mut batch = submit_batch(
        &[first.snapshot(), second],
        cluster.endpoints(),
        &RunConfig::new(200).with_seed(5),
    )
    .unwrap();
    assert!(batch.resolution.edges().is_empty());
    assert!(batch.jobs.iter().all(|j| j.exec_type() == ExecType::Offloading));

    for result in gather(&mut batch.jobs).await.unwrap() {
        assert_eq!(result.counts.get("00") + result.counts.get("11"), 200);
        assert!(result.time_taken >= 0.0);
    }
}

#[tokio::test]
async fn teleportation_across_units() {
    let cluster = LocalCluster::new(2);

    // alice teleports |1> to bob over a shared pair.
    let mut alice = Circuit::with_id("alice", 3);
    alice
        .x(QubitId(0))
        .unwrap()
        .h(QubitId(1))
        .unwrap()
        .cx(QubitId(1), QubitId(2))
        .unwrap()
        .qsend(QubitId(2), "bob")
        .unwrap()
        .cx(QubitId(0), QubitId(1))
        .unwrap()
        .h(QubitId(0))
        .unwrap()
        .measure_and_send(QubitId(1), "bob")
        .unwrap()
        .measure_and_send(QubitId(0), "bob")
        .unwrap();

    let mut bob = Circuit::with_id("bob", 1);
    bob.qrecv(QubitId(0), &alice)
        .unwrap()
        .remote_c_if("x", [QubitId(0)], vec![], &alice)
        .unwrap()
        .remote_c_if("z", [QubitId(0)], vec![], &alice)
        .unwrap()
        .measure_all()
        .unwrap();

    let mut batch = submit_batch(
        &[alice.snapshot(), bob.snapshot()],
        cluster.endpoints(),
        &RunConfig::new(100).with_seed(9),
    )
    .unwrap();
    let kinds: Vec<_> = batch.resolution.edges().iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&RelayKind::Classical));
    assert!(kinds.contains(&RelayKind::Quantum));

    let results = gather(&mut batch.jobs).await.unwrap();
    assert_eq!(results[1].counts.get("1"), 100);
}

#[tokio::test]
async fn mutual_receives_report_a_deadlock() {
    let cluster = LocalCluster::new(2);
    let mut a = Circuit::with_size("a", 1, 1);
    a.recv(qmesh_ir::ClbitId(0), "b")
        .unwrap()
        .measure_and_send(QubitId(0), "b")
        .unwrap();
    let mut b = Circuit::with_size("b", 1, 1);
    b.recv(qmesh_ir::ClbitId(0), "a")
        .unwrap()
        .measure_and_send(QubitId(0), "a")
        .unwrap();

    let mut batch = submit_batch(
        &[a.snapshot(), b.snapshot()],
        cluster.endpoints(),
        &RunConfig::new(1),
    )
    .unwrap();

    match gather(&mut batch.jobs).await {
        Err(HalError::RemoteComputation { endpoint, message }) => {
            assert_eq!(endpoint, "qpu-0");
            assert!(message.contains("deadlock"), "{message}");
        }
        other => panic!("expected a deadlock, got {other:?}"),
    }
}

#[tokio::test]
async fn parameter_update_reruns_on_the_same_unit() {
    let cluster = LocalCluster::new(1);
    let mut circuit = Circuit::with_id("vqe", 1);
    circuit.ry(0.0, QubitId(0)).unwrap().measure_all().unwrap();

    let mut job = Job::new(
        cluster.endpoint(0).unwrap(),
        &circuit,
        RunConfig::new(50).with_seed(3),
    )
    .unwrap();
    job.submit().unwrap();
    assert_eq!(job.result().await.unwrap().unwrap().counts.get("0"), 50);

    job.upgrade_parameters(vec![PI]).await.unwrap();
    let result = job.result().await.unwrap().unwrap();
    assert_eq!(result.counts.get("1"), 50);
    assert_eq!(result.parameters, vec![PI]);
    assert_eq!(job.submissions(), 2);
}
