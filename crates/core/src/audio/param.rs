/// Automatable gain value with a single in-flight target.
///
/// Every change re-bases the curve at the value it had at `now`, which cancels
/// whatever ramp was scheduled before and keeps the output continuous.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioParam {
    start_value: f32,
    start_time: f64,
    ramp: Option<Ramp>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ramp {
    target: f32,
    time_constant: f64,
}

impl AudioParam {
    pub fn new(value: f32) -> Self {
        Self {
            start_value: value,
            start_time: 0.0,
            ramp: None,
        }
    }

    /// Jumps straight to `value`. Only used while a node is being created.
    pub fn set_value(&mut self, value: f32, now: f64) {
        self.start_value = value;
        self.start_time = now;
        self.ramp = None;
    }

    /// Cancels any scheduled ramp and approaches `target` exponentially from
    /// the current value.
    pub fn set_target(&mut self, target: f32, now: f64, time_constant: f64) {
        let current = self.value_at(now);
        self.start_value = current;
        self.start_time = now;
        self.ramp = if time_constant > 0.0 {
            Some(Ramp {
                target,
                time_constant,
            })
        } else {
            self.start_value = target;
            None
        };
    }

    /// Value the curve settles at.
    pub fn target(&self) -> f32 {
        self.ramp.map(|ramp| ramp.target).unwrap_or(self.start_value)
    }

    pub fn value_at(&self, time: f64) -> f32 {
        match self.ramp {
            None => self.start_value,
            Some(_) if time <= self.start_time => self.start_value,
            Some(Ramp {
                target,
                time_constant,
            }) => {
                let decay = (-(time - self.start_time) / time_constant).exp() as f32;
                target + (self.start_value - target) * decay
            }
        }
    }
}
