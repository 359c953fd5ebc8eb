//! Parameter automation timelines
//!
//! A `ParamTimeline` describes how a voice parameter (frequency or gain)
//! evolves over absolute audio-clock time. Events are appended in time order
//! and evaluated lazily by the mixer for every rendered sample:
//! - `set_value_at` jumps to a value at a given time
//! - `linear_ramp_to` interpolates linearly from the previous event
//! - `exponential_ramp_to` interpolates geometrically from the previous event
//!
//! A ramp always starts where the previous event ended. A ramp with no
//! preceding event starts from the initial value at time zero.

/// One automation event on a timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    SetValue { time: f64, value: f32 },
    LinearRamp { end_time: f64, value: f32 },
    ExponentialRamp { end_time: f64, value: f32 },
}

impl ParamEvent {
    fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. } => time,
            ParamEvent::LinearRamp { end_time, .. } => end_time,
            ParamEvent::ExponentialRamp { end_time, .. } => end_time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            ParamEvent::SetValue { value, .. } => value,
            ParamEvent::LinearRamp { value, .. } => value,
            ParamEvent::ExponentialRamp { value, .. } => value,
        }
    }
}

/// Time-ordered automation for a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTimeline {
    initial: f32,
    events: Vec<ParamEvent>,
}

impl ParamTimeline {
    /// Create a timeline holding `initial` until the first event.
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            events: Vec::with_capacity(4),
        }
    }

    /// Timeline that never changes.
    pub fn constant(value: f32) -> Self {
        Self::new(value)
    }

    pub fn set_value_at(mut self, value: f32, time: f64) -> Self {
        self.push(ParamEvent::SetValue { time, value });
        self
    }

    pub fn linear_ramp_to(mut self, value: f32, end_time: f64) -> Self {
        self.push(ParamEvent::LinearRamp { end_time, value });
        self
    }

    /// Geometric ramp towards `value`.
    ///
    /// Both endpoints must be non-zero and share a sign; otherwise the
    /// previous value is held until `end_time`.
    pub fn exponential_ramp_to(mut self, value: f32, end_time: f64) -> Self {
        self.push(ParamEvent::ExponentialRamp { end_time, value });
        self
    }

    /// Time of the last event, or zero for a constant timeline.
    pub fn end_time(&self) -> f64 {
        self.events.last().map(ParamEvent::time).unwrap_or(0.0)
    }

    /// Evaluate the timeline at absolute time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        let mut prev_time = 0.0_f64;
        let mut prev_value = self.initial;

        for event in &self.events {
            let event_time = event.time();
            match *event {
                ParamEvent::SetValue { .. } => {
                    if t < event_time {
                        return prev_value;
                    }
                }
                ParamEvent::LinearRamp { value, .. } => {
                    if t < event_time {
                        let progress = ramp_progress(prev_time, event_time, t);
                        return prev_value + (value - prev_value) * progress;
                    }
                }
                ParamEvent::ExponentialRamp { value, .. } => {
                    if t < event_time {
                        if !exponential_ramp_defined(prev_value, value) {
                            return prev_value;
                        }
                        let progress = ramp_progress(prev_time, event_time, t);
                        return prev_value * (value / prev_value).powf(progress);
                    }
                }
            }
            prev_time = event_time;
            prev_value = event.value();
        }

        prev_value
    }

    fn push(&mut self, event: ParamEvent) {
        debug_assert!(
            self.events
                .last()
                .map_or(true, |last| last.time() <= event.time()),
            "automation events must be appended in time order"
        );
        self.events.push(event);
    }
}

fn ramp_progress(start: f64, end: f64, t: f64) -> f32 {
    if end <= start {
        return 1.0;
    }
    (((t - start) / (end - start)).clamp(0.0, 1.0)) as f32
}

fn exponential_ramp_defined(from: f32, to: f32) -> bool {
    from != 0.0 && to != 0.0 && from.signum() == to.signum()
}
