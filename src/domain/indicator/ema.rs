//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1). During the first n samples the output is the running SMA; the
//! n-th sample seeds the EMA with the SMA, after which
//! EMA[i] = V[i]*k + EMA[i-1]*(1-k). Ready once n samples have been seen.

use crate::domain::error::TraderError;
use crate::domain::indicator::{
    check_period, Indicator, IndicatorPoint, IndicatorType, SimpleMovingAverage,
};
use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    period: usize,
    k: f64,
    seed: SimpleMovingAverage,
    samples: usize,
    current: Option<IndicatorPoint>,
}

impl ExponentialMovingAverage {
    pub fn new(period: usize) -> Result<Self, TraderError> {
        check_period("EMA", period)?;
        Ok(ExponentialMovingAverage {
            period,
            k: smoothing_factor(period),
            seed: SimpleMovingAverage::new(period)?,
            samples: 0,
            current: None,
        })
    }
}

pub fn smoothing_factor(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

impl Indicator for ExponentialMovingAverage {
    fn indicator_type(&self) -> IndicatorType {
        IndicatorType::Ema(self.period)
    }

    fn update(&mut self, time: NaiveDateTime, value: f64) -> bool {
        self.samples += 1;
        let next = match self.current {
            Some(prev) if self.samples > self.period => value * self.k + prev.value * (1.0 - self.k),
            _ => {
                self.seed.update(time, value);
                self.seed.value()
            }
        };
        self.current = Some(IndicatorPoint { time, value: next });
        self.is_ready()
    }

    fn samples(&self) -> usize {
        self.samples
    }

    fn warm_up_period(&self) -> usize {
        self.period
    }

    fn current(&self) -> Option<IndicatorPoint> {
        self.current
    }

    fn reset(&mut self) {
        self.seed.reset();
        self.samples = 0;
        self.current = None;
    }
}
