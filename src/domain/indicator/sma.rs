//! Simple Moving Average over a rolling window.

use crate::domain::error::TraderError;
use crate::domain::indicator::{check_period, Indicator, IndicatorPoint, IndicatorType};
use chrono::NaiveDateTime;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
    samples: usize,
    current: Option<IndicatorPoint>,
}

impl SimpleMovingAverage {
    pub fn new(period: usize) -> Result<Self, TraderError> {
        check_period("SMA", period)?;
        Ok(SimpleMovingAverage {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            samples: 0,
            current: None,
        })
    }
}

impl Indicator for SimpleMovingAverage {
    fn indicator_type(&self) -> IndicatorType {
        IndicatorType::Sma(self.period)
    }

    fn update(&mut self, time: NaiveDateTime, value: f64) -> bool {
        self.samples += 1;
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(dropped) = self.window.pop_front() {
                self.sum -= dropped;
            }
        }
        self.current = Some(IndicatorPoint {
            time,
            value: self.sum / self.window.len() as f64,
        });
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
        self.window.clear();
        self.sum = 0.0;
        self.samples = 0;
        self.current = None;
    }
}
