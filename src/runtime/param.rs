//! Parameter Automation
//!
//! Timeline of scheduled value changes for one node parameter (gain,
//! frequency, Q). Evaluation follows the host audio runtime rules:
//! - events are ordered by time; a ramp interpolates from the previous
//!   event's time and value to its own
//! - a ramp with no previous event starts at the time it was scheduled, from
//!   the value the parameter had then
//! - an exponential ramp whose endpoints are not both positive (or both
//!   negative) holds its start value until the end time
//! - a target curve approaches its target with the given time constant until
//!   the next event

/// One scheduled change
#[derive(Debug, Clone, Copy, PartialEq)]
enum EventKind {
    SetValue(f32),
    LinearRamp(f32),
    ExponentialRamp(f32),
    SetTarget { target: f32, time_constant: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ParamEvent {
    time: f64,
    kind: EventKind,
}

/// Automatable node parameter
#[derive(Debug, Clone, PartialEq)]
pub struct AudioParam {
    /// Intrinsic value, used before the first event
    value: f32,
    /// Start point of a leading ramp
    anchor_time: f64,
    events: Vec<ParamEvent>,
}

impl AudioParam {
    /// Create a parameter with a fixed intrinsic value
    pub fn new(value: f32) -> Self {
        AudioParam {
            value,
            anchor_time: 0.0,
            events: Vec::new(),
        }
    }

    /// Assign the value now
    ///
    /// With automation pending this behaves like `set_value_at_time(value, now)`.
    pub fn set_value(&mut self, value: f32, now: f64) {
        if self.events.is_empty() {
            self.value = value;
            self.anchor_time = now;
        } else {
            self.set_value_at_time(value, now);
        }
    }

    /// Jump to `value` at `time`
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(time, EventKind::SetValue(value));
    }

    /// Linear ramp reaching `value` at `end_time`
    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, end_time: f64, now: f64) {
        self.anchor_if_idle(now);
        self.insert(end_time, EventKind::LinearRamp(value));
    }

    /// Exponential ramp reaching `value` at `end_time`
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, end_time: f64, now: f64) {
        self.anchor_if_idle(now);
        self.insert(end_time, EventKind::ExponentialRamp(value));
    }

    /// Exponential approach to `target` from `start_time`
    ///
    /// A non-positive time constant jumps straight to the target.
    pub fn set_target_at_time(&mut self, target: f32, start_time: f64, time_constant: f64) {
        if time_constant <= 0.0 {
            self.set_value_at_time(target, start_time);
        } else {
            self.insert(
                start_time,
                EventKind::SetTarget {
                    target,
                    time_constant,
                },
            );
        }
    }

    /// Drop every event scheduled at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time < time);
    }

    /// Number of pending automation events
    pub fn scheduled_event_count(&self) -> usize {
        self.events.len()
    }

    /// Evaluate the parameter at time `t`
    pub fn value_at(&self, t: f64) -> f32 {
        let mut value = self.value;
        let mut prev_time = self.anchor_time;
        let mut target: Option<(f32, f64)> = None;

        for event in &self.events {
            if event.time > t {
                return match event.kind {
                    EventKind::LinearRamp(end) => {
                        let span = event.time - prev_time;
                        if span <= 0.0 {
                            end
                        } else {
                            let ratio = ((t - prev_time) / span).clamp(0.0, 1.0) as f32;
                            value + (end - value) * ratio
                        }
                    }
                    EventKind::ExponentialRamp(end) => {
                        let span = event.time - prev_time;
                        if span <= 0.0 {
                            end
                        } else if value * end > 0.0 {
                            let ratio = ((t - prev_time) / span).clamp(0.0, 1.0) as f32;
                            value * (end / value).powf(ratio)
                        } else {
                            value
                        }
                    }
                    _ => follow_target(value, prev_time, target, t),
                };
            }

            match event.kind {
                EventKind::SetValue(v)
                | EventKind::LinearRamp(v)
                | EventKind::ExponentialRamp(v) => {
                    value = v;
                    target = None;
                }
                EventKind::SetTarget {
                    target: goal,
                    time_constant,
                } => {
                    value = follow_target(value, prev_time, target, event.time);
                    target = Some((goal, time_constant));
                }
            }
            prev_time = event.time;
        }

        follow_target(value, prev_time, target, t)
    }

    fn anchor_if_idle(&mut self, now: f64) {
        if self.events.is_empty() {
            self.anchor_time = now;
        }
    }

    fn insert(&mut self, time: f64, kind: EventKind) {
        let index = self.events.partition_point(|e| e.time <= time);
        self.events.insert(index, ParamEvent { time, kind });
    }
}

fn follow_target(value: f32, from: f64, target: Option<(f32, f64)>, t: f64) -> f32 {
    match target {
        Some((goal, tau)) => {
            let elapsed = (t - from).max(0.0);
            goal + (value - goal) * (-(elapsed / tau)).exp() as f32
        }
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_intrinsic_value_without_events() {
        let param = AudioParam::new(0.7);
        assert_relative_eq!(param.value_at(0.0), 0.7);
        assert_relative_eq!(param.value_at(100.0), 0.7);
    }

    #[test]
    fn test_leading_linear_ramp_starts_when_scheduled() {
        let mut param = AudioParam::new(0.0);
        param.linear_ramp_to_value_at_time(1.0, 5.0, 2.0);
        assert_relative_eq!(param.value_at(2.0), 0.0);
        assert_relative_eq!(param.value_at(3.5), 0.5);
        assert_relative_eq!(param.value_at(5.0), 1.0);
        assert_relative_eq!(param.value_at(9.0), 1.0);
    }

    #[test]
    fn test_pinned_fade_out() {
        let mut param = AudioParam::new(1.0);
        param.cancel_scheduled_values(1.0);
        param.set_value_at_time(0.8, 1.0);
        param.linear_ramp_to_value_at_time(0.0, 4.0, 1.0);
        assert_relative_eq!(param.value_at(0.5), 1.0);
        assert_relative_eq!(param.value_at(2.5), 0.4, epsilon = 1e-6);
        assert_relative_eq!(param.value_at(4.0), 0.0);
    }

    #[test]
    fn test_exponential_ramp() {
        let mut param = AudioParam::new(0.0);
        param.set_value_at_time(440.0, 0.0);
        param.exponential_ramp_to_value_at_time(880.0, 1.0, 0.0);
        assert_relative_eq!(param.value_at(0.5), 440.0 * 2f32.sqrt(), epsilon = 1e-3);
        assert_relative_eq!(param.value_at(1.0), 880.0);
    }

    #[test]
    fn test_exponential_ramp_from_zero_holds() {
        let mut param = AudioParam::new(0.0);
        param.set_value_at_time(0.0, 0.0);
        param.exponential_ramp_to_value_at_time(1.0, 1.0, 0.0);
        assert_relative_eq!(param.value_at(0.9), 0.0);
        assert_relative_eq!(param.value_at(1.0), 1.0);
    }

    #[test]
    fn test_envelope_attack_then_decay() {
        let mut param = AudioParam::new(0.0);
        param.set_value_at_time(0.0, 0.0);
        param.linear_ramp_to_value_at_time(0.5, 0.02, 0.0);
        param.exponential_ramp_to_value_at_time(0.001, 0.4, 0.0);
        assert_relative_eq!(param.value_at(0.01), 0.25, epsilon = 1e-6);
        assert_relative_eq!(param.value_at(0.02), 0.5);
        assert!(param.value_at(0.2) < 0.5 && param.value_at(0.2) > 0.001);
        assert_relative_eq!(param.value_at(0.4), 0.001);
    }

    #[test]
    fn test_set_target_decays() {
        let mut param = AudioParam::new(1.0);
        param.set_target_at_time(0.0, 0.0, 0.5);
        assert_relative_eq!(param.value_at(0.5), (-1.0f32).exp(), epsilon = 1e-6);
        param.set_value_at_time(0.25, 1.0);
        assert_relative_eq!(param.value_at(2.0), 0.25);
    }

    #[test]
    fn test_cancel_scheduled_values() {
        let mut param = AudioParam::new(0.0);
        param.set_value_at_time(1.0, 1.0);
        param.set_value_at_time(2.0, 2.0);
        param.cancel_scheduled_values(1.5);
        assert_eq!(param.scheduled_event_count(), 1);
        assert_relative_eq!(param.value_at(3.0), 1.0);
    }
}
