//! Resource management (keep-alive / pre-warm) policies.
use log::debug;

use crate::error::SimulationError;
use crate::forecast::ForecastProvider;
use crate::histogram::RangeLimitedHistogram;
use crate::monitor::{TimeWindows, UsageMonitor};
use crate::util::FxIndexSet;

/// Distributions with a coefficient of variation above this are considered
/// unrepresentative and fall back to a conservative window.
const REPRESENTATIVENESS_THRESHOLD: f64 = 2.0;

/// Predicts the (preWarm, keepAlive) windows of each function. `update` is
/// called once per invocation burst with the idle time since the function's
/// previous invocation; the computed windows are stored in the function's
/// profile, where keep-alive decisions read them.
pub trait ResourceManagementPolicy: Send {
    /// Seeds the windows of every profile before the first cycle.
    fn init(&mut self, monitor: &mut UsageMonitor);

    fn update(
        &mut self,
        func_id: usize,
        time: u64,
        idle_time: u64,
        monitor: &mut UsageMonitor,
    ) -> Result<(), SimulationError>;
}

/// Constant keep-alive timeout, no pre-warming.
pub struct FixedKeepAlive {
    timeout: u64,
}

impl FixedKeepAlive {
    pub fn new(timeout: u64) -> Self {
        Self { timeout }
    }
}

impl ResourceManagementPolicy for FixedKeepAlive {
    fn init(&mut self, monitor: &mut UsageMonitor) {
        for func_id in monitor.function_ids() {
            monitor.profile_mut(func_id).windows = TimeWindows::new(0, Some(self.timeout));
        }
    }

    fn update(
        &mut self,
        _func_id: usize,
        _time: u64,
        _idle_time: u64,
        _monitor: &mut UsageMonitor,
    ) -> Result<(), SimulationError> {
        Ok(())
    }
}

/// Idle instances are never terminated.
pub struct NoTermination;

impl ResourceManagementPolicy for NoTermination {
    fn init(&mut self, monitor: &mut UsageMonitor) {
        for func_id in monitor.function_ids() {
            monitor.profile_mut(func_id).windows = TimeWindows::new(0, None);
        }
    }

    fn update(
        &mut self,
        _func_id: usize,
        _time: u64,
        _idle_time: u64,
        _monitor: &mut UsageMonitor,
    ) -> Result<(), SimulationError> {
        Ok(())
    }
}

/// Histogram-based window prediction with a forecast fallback.
///
/// While most idle times fit under the histogram limit, windows come from the
/// 5th/99th percentile classes widened by the error margin. Once the fraction
/// of out-of-bounds observations crosses `oob_threshold`, the function
/// switches permanently to one-step-ahead forecasting over its idle-time
/// series.
pub struct HybridHistogram {
    limit: u64,
    class_width: u64,
    oob_threshold: f64,
    error_margin: f64,
    forecast_margin: f64,
    forecast: Box<dyn ForecastProvider>,
    switched: FxIndexSet<usize>,
}

impl HybridHistogram {
    pub fn new(
        limit: u64,
        class_width: u64,
        oob_threshold: f64,
        error_margin: f64,
        forecast_margin: f64,
        forecast: Box<dyn ForecastProvider>,
    ) -> Self {
        Self {
            limit,
            class_width,
            oob_threshold,
            error_margin,
            forecast_margin,
            forecast,
            switched: FxIndexSet::default(),
        }
    }

    /// True once the function has permanently moved to forecast-based
    /// windows.
    pub fn uses_forecast(&self, func_id: usize) -> bool {
        self.switched.contains(&func_id)
    }

    fn histogram_windows(&self, histogram: &RangeLimitedHistogram) -> TimeWindows {
        let head = histogram.head() as f64;
        let prewarm = (head - head * self.error_margin).max(0.0) as u64;
        if histogram.coefficient_of_variation() >= REPRESENTATIVENESS_THRESHOLD {
            // not representative yet, retain everything up to the limit
            return TimeWindows::new(prewarm, Some(self.limit));
        }
        let tail = histogram.tail() as f64;
        let keep_alive = tail + head * self.error_margin;
        TimeWindows::new(prewarm, Some(keep_alive as u64))
    }

    fn forecast_windows(&mut self, series: &[f64]) -> Result<TimeWindows, SimulationError> {
        self.forecast.fit(series);
        let next = self.forecast.predict_next()?;
        let keep_alive = next * self.forecast_margin * 2.0;
        let prewarm = next * (1.0 - self.forecast_margin);
        Ok(TimeWindows::new(prewarm.max(0.0) as u64, Some(keep_alive as u64)))
    }
}

impl ResourceManagementPolicy for HybridHistogram {
    fn init(&mut self, monitor: &mut UsageMonitor) {
        for func_id in monitor.function_ids() {
            monitor.profile_mut(func_id).windows = TimeWindows::new(0, None);
        }
    }

    fn update(
        &mut self,
        func_id: usize,
        _time: u64,
        idle_time: u64,
        monitor: &mut UsageMonitor,
    ) -> Result<(), SimulationError> {
        let limit = self.limit;
        let class_width = self.class_width;
        let profile = monitor.profile_mut(func_id);
        let histogram = profile
            .histogram
            .get_or_insert_with(|| RangeLimitedHistogram::new(limit, class_width));
        histogram.add(idle_time);
        profile.forecast_series.push(idle_time as f64);

        let total = histogram.nr_observations() + histogram.out_of_bounds();
        if !self.switched.contains(&func_id)
            && total > 1
            && histogram.out_of_bounds_fraction() > self.oob_threshold
        {
            debug!("function {} switches to forecast-based windows", profile.name);
            self.switched.insert(func_id);
        }

        let histogram_prediction = self.histogram_windows(histogram);
        let windows = if self.switched.contains(&func_id) {
            let series = std::mem::take(&mut profile.forecast_series);
            let forecast = self.forecast_windows(&series);
            monitor.profile_mut(func_id).forecast_series = series;
            forecast?
        } else {
            histogram_prediction
        };
        monitor.profile_mut(func_id).windows = windows;
        Ok(())
    }
}

pub struct ManagementPolicyConfig<'a> {
    pub name: &'a str,
    pub instance_idle_timeout: Option<u64>,
    pub histogram_limit: Option<u64>,
    pub histogram_class_width: Option<u64>,
    pub histogram_oob_threshold: f64,
    pub prediction_error_margin: f64,
    pub forecast_error_margin: f64,
}

pub fn resolve_management_policy(
    config: &ManagementPolicyConfig,
    forecast: Box<dyn ForecastProvider>,
) -> Result<Box<dyn ResourceManagementPolicy>, SimulationError> {
    match config.name {
        "fixed-keep-alive" => {
            let timeout = config.instance_idle_timeout.ok_or_else(|| {
                SimulationError::InvalidConfiguration(
                    "fixed-keep-alive requires instance_idle_timeout".to_string(),
                )
            })?;
            Ok(Box::new(FixedKeepAlive::new(timeout)))
        }
        "no-termination" => Ok(Box::new(NoTermination)),
        "hybrid-histogram" => {
            let limit = config.histogram_limit.ok_or_else(|| {
                SimulationError::InvalidConfiguration("hybrid-histogram requires histogram_limit".to_string())
            })?;
            let class_width = config.histogram_class_width.ok_or_else(|| {
                SimulationError::InvalidConfiguration(
                    "hybrid-histogram requires histogram_class_width".to_string(),
                )
            })?;
            Ok(Box::new(HybridHistogram::new(
                limit,
                class_width,
                config.histogram_oob_threshold,
                config.prediction_error_margin,
                config.forecast_error_margin,
                forecast,
            )))
        }
        other => Err(SimulationError::InvalidConfiguration(format!(
            "unknown management policy: {}",
            other
        ))),
    }
}
