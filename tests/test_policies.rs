mod common;

use std::sync::Arc;

use common::{base_config, one_function_trace, FixedForecast};
use serverless_sim::cost::{CostMonitor, PricingModel};
use serverless_sim::management::{HybridHistogram, NoTermination, ResourceManagementPolicy};
use serverless_sim::monitor::{TimeWindows, UsageMonitor};
use serverless_sim::simulation::SimulationCore;
use serverless_sim::sink::MemorySink;

fn monitor_with_one_function() -> UsageMonitor {
    UsageMonitor::new(
        vec![(0usize, "f0")].into_iter(),
        CostMonitor::new(PricingModel::Lambda),
        Box::new(MemorySink::new()),
    )
}

#[test]
fn hybrid_histogram_predicts_from_percentile_bins() {
    let mut monitor = monitor_with_one_function();
    let fake = FixedForecast::new(800.0);
    let mut policy = HybridHistogram::new(500, 100, 0.5, 0.1, 0.15, Box::new(fake));
    policy.init(&mut monitor);
    assert_eq!(monitor.profile(0).windows, TimeWindows::new(0, None));

    policy.update(0, 0, 100, &mut monitor).unwrap();
    // single observation: head and tail are both the 100-bin
    assert_eq!(monitor.profile(0).windows, TimeWindows::new(90, Some(110)));
    assert!(!policy.uses_forecast(0));
}

#[test]
fn hybrid_histogram_switch_to_forecast_is_permanent() {
    let mut monitor = monitor_with_one_function();
    let fake = FixedForecast::new(800.0);
    let fit_calls = fake.fit_calls.clone();
    let mut policy = HybridHistogram::new(500, 100, 0.5, 0.1, 0.15, Box::new(fake));
    policy.init(&mut monitor);

    // one in-range, one out-of-bounds: fraction is exactly 0.5, no switch yet
    policy.update(0, 0, 100, &mut monitor).unwrap();
    policy.update(0, 1000, 1000, &mut monitor).unwrap();
    assert!(!policy.uses_forecast(0));
    assert_eq!(*fit_calls.lock().unwrap(), 0);

    // second out-of-bounds observation pushes the fraction over the threshold
    policy.update(0, 2000, 1000, &mut monitor).unwrap();
    assert!(policy.uses_forecast(0));
    assert_eq!(*fit_calls.lock().unwrap(), 1);
    // keepAlive = 800 * 0.15 * 2, preWarm = 800 * 0.85
    assert_eq!(monitor.profile(0).windows, TimeWindows::new(680, Some(240)));

    // in-range observations drop the fraction back below the threshold, but
    // the switch never reverts
    policy.update(0, 3000, 100, &mut monitor).unwrap();
    policy.update(0, 4000, 100, &mut monitor).unwrap();
    assert!(policy.uses_forecast(0));
    assert_eq!(*fit_calls.lock().unwrap(), 3);
    assert_eq!(monitor.profile(0).windows, TimeWindows::new(680, Some(240)));
}

#[test]
fn unrepresentative_distribution_still_tracks_the_percentile_head() {
    let mut monitor = monitor_with_one_function();
    let fake = FixedForecast::new(800.0);
    let mut policy = HybridHistogram::new(1_000_000, 100, 0.9, 0.1, 0.15, Box::new(fake));
    policy.init(&mut monitor);

    for time in 0..5 {
        policy.update(0, time * 1000, 200, &mut monitor).unwrap();
    }
    assert_eq!(monitor.profile(0).windows, TimeWindows::new(180, Some(220)));

    // the far outlier pushes the coefficient of variation over the
    // representativeness threshold: keep-alive widens to the full range
    policy.update(0, 5000, 999_900, &mut monitor).unwrap();
    assert_eq!(monitor.profile(0).windows, TimeWindows::new(180, Some(1_000_000)));

    // a new smallest class moves the 5th-percentile head; the pre-warm
    // window must follow it even while the wide keep-alive is in effect
    policy.update(0, 6000, 100, &mut monitor).unwrap();
    assert_eq!(monitor.profile(0).windows, TimeWindows::new(90, Some(1_000_000)));
    assert!(!policy.uses_forecast(0));
}

#[test]
fn no_termination_never_defines_a_keep_alive_window() {
    let mut monitor = monitor_with_one_function();
    let mut policy = NoTermination;
    policy.init(&mut monitor);
    policy.update(0, 0, 123456, &mut monitor).unwrap();
    assert_eq!(monitor.profile(0).windows, TimeWindows::new(0, None));
}

#[test]
fn hybrid_histogram_prewarms_ahead_of_demand() {
    // invocations every third cycle; the first burst yields windows
    // (preWarm 900, keepAlive 1100), the observed three-cycle gap then
    // yields (preWarm 900, keepAlive 3100), so a pre-warmed instance waits
    // for each following burst
    let trace = Arc::new(one_function_trace(&[
        (1, 500),
        (0, 0),
        (0, 0),
        (1, 500),
        (0, 0),
        (0, 0),
        (1, 500),
    ]));
    let mut config = base_config(1000.0, 2048.0, "hybrid-histogram");
    config.histogram_limit = Some(5000);
    config.histogram_class_width = Some(1000);
    let sink = MemorySink::new();
    let records = sink.records();
    let mut sim = SimulationCore::new(trace, &config, 1, Box::new(sink)).unwrap();
    let report = sim.run().unwrap();
    assert_eq!(report.invocations, 3);
    // demand is never concurrent, so a second live instance in any cycle can
    // only come from pre-warming
    let records = records.lock().unwrap();
    assert!(records
        .iter()
        .any(|r| r.running_instances + r.idle_instances >= 2));
}

#[test]
fn prewarmed_instances_do_not_spawn_successors() {
    // same serial demand as above; one warm spare per gap is all the policy
    // can justify, so the population must never exceed two and the warm
    // spares must absorb every cold start after the first
    let trace = Arc::new(one_function_trace(&[
        (1, 500),
        (0, 0),
        (0, 0),
        (1, 500),
        (0, 0),
        (0, 0),
        (1, 500),
    ]));
    let mut config = base_config(1000.0, 2048.0, "hybrid-histogram");
    config.histogram_limit = Some(5000);
    config.histogram_class_width = Some(1000);
    let sink = MemorySink::new();
    let records = sink.records();
    let mut sim = SimulationCore::new(trace, &config, 1, Box::new(sink)).unwrap();
    let report = sim.run().unwrap();
    assert_eq!(report.invocations, 3);
    assert_eq!(report.cold_starts, 1);
    let records = records.lock().unwrap();
    assert!(records
        .iter()
        .all(|r| r.running_instances + r.idle_instances <= 2));
}

#[test]
fn management_policy_sees_the_gap_of_every_burst() {
    // bursts at cycles 0, 3 and 6: the first burst reports a zero gap, each
    // later one reports the full three intervals since the previous burst
    let trace = Arc::new(one_function_trace(&[
        (1, 500),
        (0, 0),
        (0, 0),
        (1, 500),
        (0, 0),
        (0, 0),
        (1, 500),
    ]));
    let mut config = base_config(1000.0, 2048.0, "hybrid-histogram");
    config.histogram_limit = Some(100);
    config.histogram_class_width = Some(100);
    config.histogram_oob_threshold = 0.1;
    let fake = FixedForecast::new(800.0);
    let fit_calls = fake.fit_calls.clone();
    let last_series = fake.last_series.clone();
    let mut sim = SimulationCore::with_forecast(
        trace,
        &config,
        1,
        Box::new(MemorySink::new()),
        Box::new(fake),
    )
    .unwrap();
    let report = sim.run().unwrap();
    assert_eq!(report.invocations, 3);
    // the second out-of-bounds gap flips the policy to the forecast path,
    // which then receives the complete gap series
    assert_eq!(*fit_calls.lock().unwrap(), 2);
    assert_eq!(*last_series.lock().unwrap(), vec![0.0, 3000.0, 3000.0]);
}
