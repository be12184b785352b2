//! Synthetic telemetry source
//!
//! Stands in for a real telemetry feed: every numeric field is drawn
//! independently and uniformly from its documented range, every categorical
//! field uniformly from its variants. No correlation between fields is
//! modeled. Generation cannot fail.

use crate::models::{RawSample, SampleFeatures, TaskPriority, TaskStatus, TaskType};
use rand::Rng;

/// Generator bounds, inclusive. The CPU and memory domains are [0, 100];
/// the source deliberately draws from a narrower band.
const CPU_USAGE_RANGE: (f64, f64) = (5.0, 95.0);
const MEMORY_USAGE_RANGE: (f64, f64) = (10.0, 97.0);
const NETWORK_TRAFFIC_RANGE: (f64, f64) = (100.0, 6000.0);
const POWER_CONSUMPTION_RANGE: (f64, f64) = (20.0, 250.0);
const NUM_INSTRUCTIONS_RANGE: (f64, f64) = (1000.0, 20000.0);
const EXECUTION_TIME_RANGE: (f64, f64) = (0.01, 1.5);
const ENERGY_EFFICIENCY_RANGE: (f64, f64) = (0.1, 0.95);

/// Trait for telemetry sources, one reading per VM per call
pub trait SampleSource: Send + Sync {
    /// Produce one reading for the given VM, stamped with the current time
    fn sample(&self, vm_id: &str) -> RawSample;
}

/// Uniform random telemetry source
#[derive(Debug, Default)]
pub struct UniformSampleGenerator;

impl UniformSampleGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SampleSource for UniformSampleGenerator {
    fn sample(&self, vm_id: &str) -> RawSample {
        let mut rng = rand::rng();

        RawSample {
            vm_id: vm_id.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            features: SampleFeatures {
                cpu_usage: rng.random_range(CPU_USAGE_RANGE.0..=CPU_USAGE_RANGE.1),
                memory_usage: rng.random_range(MEMORY_USAGE_RANGE.0..=MEMORY_USAGE_RANGE.1),
                network_traffic: rng
                    .random_range(NETWORK_TRAFFIC_RANGE.0..=NETWORK_TRAFFIC_RANGE.1),
                power_consumption: rng
                    .random_range(POWER_CONSUMPTION_RANGE.0..=POWER_CONSUMPTION_RANGE.1),
                num_executed_instructions: rng
                    .random_range(NUM_INSTRUCTIONS_RANGE.0..=NUM_INSTRUCTIONS_RANGE.1),
                execution_time: rng.random_range(EXECUTION_TIME_RANGE.0..=EXECUTION_TIME_RANGE.1),
                energy_efficiency: rng
                    .random_range(ENERGY_EFFICIENCY_RANGE.0..=ENERGY_EFFICIENCY_RANGE.1),
                task_type: *pick(&mut rng, &TaskType::ALL),
                task_priority: *pick(&mut rng, &TaskPriority::ALL),
                task_status: *pick(&mut rng, &TaskStatus::ALL),
            },
        }
    }
}

fn pick<'a, T>(rng: &mut impl Rng, choices: &'a [T]) -> &'a T {
    &choices[rng.random_range(0..choices.len())]
}
