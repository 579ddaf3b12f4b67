//! One-step-ahead idle-time forecasting.
use arima::acf;
use arima::estimate;

use crate::error::SimulationError;

/// One-step-ahead time series predictor. The hybrid-histogram policy hands it
/// the full idle-time series of a function and asks for the next value;
/// implementations may be backed by anything from simple smoothing to a full
/// statistical model.
pub trait ForecastProvider: Send {
    /// Fits the provider to the observed series.
    fn fit(&mut self, series: &[f64]);

    /// Predicts the next value of the fitted series.
    fn predict_next(&mut self) -> Result<f64, SimulationError>;
}

const MAX_LAGS: usize = 12;
/// Two-sided 95% normal quantile, `norm.ppf(0.975)`.
const PPF_95: f64 = 1.959963984540054;

/// ARIMA(p, 1, q) forecasting over the raw idle-time series. The AR and MA
/// orders are the leading runs of significant autocorrelation and partial
/// autocorrelation lags; the one-step-ahead prediction propagates the fitted
/// coefficients with zero future noise.
#[derive(Default)]
pub struct ArimaForecast {
    series: Vec<f64>,
}

impl ArimaForecast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks the (AR, MA) orders from the sample ACF/PACF of the series.
    fn select_orders(x: &[f64]) -> Result<(usize, usize), SimulationError> {
        let n = x.len() as f64;
        let lags = MAX_LAGS.min(x.len() - 1);
        let sample_acf = acf::acf(x, Some(lags), false)
            .map_err(|_| SimulationError::ForecastUnavailable("autocorrelation failed".to_string()))?;

        // Bartlett variance of the sample autocorrelations
        let mut varacf = vec![0.0, 1.0 / n];
        let mut acc = 0.0;
        for value in &sample_acf[1..sample_acf.len() - 1] {
            acc += value * value;
            varacf.push((1.0 + 2.0 * acc) / n);
        }
        let ma_order = sample_acf
            .iter()
            .zip(&varacf)
            .take_while(|(a, v)| a.abs() > PPF_95 * v.sqrt())
            .count()
            .saturating_sub(1);

        let sample_pacf = acf::pacf(x, Some(lags)).map_err(|_| {
            SimulationError::ForecastUnavailable("partial autocorrelation failed".to_string())
        })?;
        let bound = PPF_95 * (1.0 / n).sqrt();
        let ar_order = sample_pacf.iter().take_while(|p| p.abs() > bound).count();
        Ok((ar_order, ma_order))
    }
}

impl ForecastProvider for ArimaForecast {
    fn fit(&mut self, series: &[f64]) {
        self.series = series.to_vec();
    }

    fn predict_next(&mut self) -> Result<f64, SimulationError> {
        let x = &self.series;
        if x.is_empty() {
            return Err(SimulationError::ForecastUnavailable(
                "predict_next called before fit".to_string(),
            ));
        }
        if x.len() == 1 {
            return Ok(x[0]);
        }
        let (ar_order, ma_order) = Self::select_orders(x)?;
        let coeff = estimate::fit(x, ar_order, 1, ma_order)
            .map_err(|_| SimulationError::ForecastUnavailable("arima estimation failed".to_string()))?;
        // coeff holds [intercept, ar.., ma..]; with zero future noise both
        // parts read the trailing observed values
        let n = x.len();
        let mut next = 0.0;
        for (lag, c) in coeff[1..=ar_order].iter().enumerate() {
            next += c * x[n - 1 - lag];
        }
        for (lag, c) in coeff[ar_order + 1..].iter().enumerate() {
            next += c * x[n - 1 - lag];
        }
        Ok(next)
    }
}
