mod common;

use std::sync::Arc;

use common::{base_config, one_function_trace};
use serverless_sim::simulation::SimulationCore;
use serverless_sim::sink::MemorySink;

#[test]
fn cold_start_then_warm_routes() {
    // one machine sized for exactly one instance, one invocation per cycle
    let trace = Arc::new(one_function_trace(&[(1, 500), (1, 500), (1, 500)]));
    let config = base_config(150.0, 150.0, "no-termination");
    let mut sim = SimulationCore::new(trace, &config, 1, Box::new(MemorySink::new())).unwrap();
    let report = sim.run().unwrap();
    assert_eq!(report.invocations, 3);
    assert_eq!(report.cold_starts, 1);
    assert_eq!(report.timely_invocations, 3);
    assert_eq!(report.delayed_invocations, 0);
    assert_eq!(report.terminations, 0);
}

#[test]
fn busy_instance_is_not_routable_until_it_finishes() {
    // the only instance still executes when the second burst arrives, so
    // that burst has to wait for it instead of being served in its own cycle
    let trace = Arc::new(one_function_trace(&[(1, 1500), (1, 1500)]));
    let config = base_config(150.0, 150.0, "no-termination");
    let mut sim = SimulationCore::new(trace, &config, 1, Box::new(MemorySink::new())).unwrap();
    let report = sim.run().unwrap();
    assert_eq!(report.invocations, 2);
    assert_eq!(report.cold_starts, 1);
    assert_eq!(report.timely_invocations, 1);
    assert_eq!(report.delayed_invocations, 1);
    assert_eq!(report.failed_deploys, 1);
}

#[test]
fn cold_start_delay_comes_only_from_the_cold_start_distribution() {
    let trace = Arc::new(one_function_trace(&[(1, 500)]));
    let mut config = base_config(150.0, 150.0, "no-termination");
    config.failure_model = "CUSTOM(0.0, 0.0, 500.0, 0.0)".to_string();
    let sink = MemorySink::new();
    let records = sink.records();
    let mut sim = SimulationCore::new(trace, &config, 1, Box::new(sink)).unwrap();
    let report = sim.run().unwrap();
    assert_eq!(report.cold_starts, 1);
    let records = records.lock().unwrap();
    assert!(records.iter().all(|r| r.median_cold_start_delay == 0));
}

#[test]
fn zero_timeout_terminates_every_idle_instance() {
    let trace = Arc::new(one_function_trace(&[(1, 500), (1, 500), (1, 500)]));
    let mut config = base_config(150.0, 150.0, "fixed-keep-alive");
    config.instance_idle_timeout = Some(0);
    let mut sim = SimulationCore::new(trace, &config, 1, Box::new(MemorySink::new())).unwrap();
    let report = sim.run().unwrap();
    // no instance survives to be reused, so every invocation cold-starts and
    // terminated instances match completed invocations
    assert_eq!(report.invocations, 3);
    assert_eq!(report.cold_starts, 3);
    assert_eq!(report.terminations, report.invocations);
}

#[test]
fn drain_completes_after_trace_end() {
    // execution runs two cycles past the last trace entry
    let trace = Arc::new(one_function_trace(&[(1, 2500), (0, 0)]));
    let config = base_config(1000.0, 2048.0, "no-termination");
    let mut sim = SimulationCore::new(trace, &config, 1, Box::new(MemorySink::new())).unwrap();
    let report = sim.run().unwrap();
    assert_eq!(report.invocations, 1);
    assert_eq!(report.execution_time, 2500);
    // the run keeps draining until the instance has gone idle
    assert!(report.duration >= 2000);
}

#[test]
fn per_cycle_records_track_the_lifecycle() {
    let trace = Arc::new(one_function_trace(&[(1, 500), (1, 500)]));
    let config = base_config(150.0, 150.0, "no-termination");
    let sink = MemorySink::new();
    let records = sink.records();
    let mut sim = SimulationCore::new(trace, &config, 1, Box::new(sink)).unwrap();
    sim.run().unwrap();
    let records = records.lock().unwrap();
    assert!(!records.is_empty());
    let first = &records[0];
    assert_eq!(first.function, "f0");
    assert_eq!(first.invocations, 1);
    assert_eq!(first.cold_starts, 1);
    assert_eq!(first.execution_time, 500);
    let total_invocations: u64 = records.iter().map(|r| r.invocations).sum();
    let total_cold: u64 = records.iter().map(|r| r.cold_starts).sum();
    assert_eq!(total_invocations, 2);
    assert_eq!(total_cold, 1);
}
