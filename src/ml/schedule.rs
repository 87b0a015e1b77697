// ============================================================
// Layer 5 — Learning-Rate Schedules
// ============================================================
// Each model component owns one schedule built on Burn's
// lr_scheduler module. The trainer calls step() once at the
// start of every epoch and uses the returned rate for all of
// that epoch's optimiser steps:
//
//   Step          lr = base * gamma^((epoch-1) / step_size)
//   Exponential   lr = base * gamma^(epoch-1)
//   Constant      lr = base
//
// Reference: Burn Book §5 (Learning Rate Scheduler)

use burn::{
    lr_scheduler::{
        exponential::{ExponentialLrScheduler, ExponentialLrSchedulerConfig},
        step::{StepLrScheduler, StepLrSchedulerConfig},
        LrScheduler,
    },
    LearningRate,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, PipelineResult};

/// One of Burn's schedulers, stepped once per epoch.
#[derive(Debug, Clone)]
pub enum Schedule {
    Constant(LearningRate),
    Step(StepLrScheduler),
    Exponential(ExponentialLrScheduler),
}

impl Schedule {
    pub fn constant(lr: LearningRate) -> Self {
        Schedule::Constant(lr)
    }

    /// Learning rate for the next epoch.
    pub fn step(&mut self) -> LearningRate {
        match self {
            Schedule::Constant(lr)   => lr.step(),
            Schedule::Step(s)        => s.step(),
            Schedule::Exponential(s) => s.step(),
        }
    }
}

/// Serialisable description of a schedule, for configs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScheduleKind {
    Constant,
    Step { step_size: usize, gamma: f64 },
    Exponential { gamma: f64 },
}

impl ScheduleKind {
    pub fn build(&self, base_lr: LearningRate) -> PipelineResult<Schedule> {
        let schedule = match *self {
            ScheduleKind::Constant => Schedule::Constant(base_lr),
            ScheduleKind::Step { step_size, gamma } => Schedule::Step(
                StepLrSchedulerConfig::new(base_lr, step_size)
                    .with_gamma(gamma)
                    .init()
                    .map_err(PipelineError::InvalidConfig)?,
            ),
            ScheduleKind::Exponential { gamma } => Schedule::Exponential(
                ExponentialLrSchedulerConfig::new(base_lr, gamma)
                    .init()
                    .map_err(PipelineError::InvalidConfig)?,
            ),
        };
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn epochs(mut s: Schedule, n: usize) -> Vec<f64> {
        (0..n).map(|_| s.step()).collect()
    }

    #[test]
    fn test_step_decays_at_multiples_of_step_size() {
        let s = ScheduleKind::Step { step_size: 3, gamma: 0.1 }.build(0.01).unwrap();
        let lrs = epochs(s, 7);
        assert!(close(lrs[0], 0.01) && close(lrs[2], 0.01));
        assert!(close(lrs[3], 0.001) && close(lrs[5], 0.001));
        assert!(close(lrs[6], 0.0001));
    }

    #[test]
    fn test_exponential_and_constant() {
        let e = ScheduleKind::Exponential { gamma: 0.5 }.build(1.0).unwrap();
        let lrs = epochs(e, 3);
        assert!(close(lrs[0], 1.0) && close(lrs[2], 0.25));

        let c = ScheduleKind::Constant.build(0.3).unwrap();
        assert!(epochs(c, 4).iter().all(|&lr| close(lr, 0.3)));
    }

    #[test]
    fn test_invalid_schedule_is_a_config_error() {
        let zero_step = ScheduleKind::Step { step_size: 0, gamma: 0.1 }.build(0.01);
        assert!(matches!(zero_step, Err(PipelineError::InvalidConfig(_))));

        let bad_gamma = ScheduleKind::Exponential { gamma: 1.5 }.build(0.01);
        assert!(matches!(bad_gamma, Err(PipelineError::InvalidConfig(_))));
    }
}
