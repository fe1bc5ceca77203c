use chrono::{DateTime, TimeDelta, Utc};

/// Simulated clock driven by wall time and a speed factor.
///
/// The simulated instant is `epoch + elapsed`, where `elapsed` accumulates wall-clock
/// deltas multiplied by the current speed factor. Every context that applies the same
/// sequence of `sync`, `set_speed` and `reset` calls derives the same instant.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    /// Wall time at which the clock was created, the simulated epoch.
    epoch: DateTime<Utc>,
    /// Wall time of the last synchronisation.
    last_wall: DateTime<Utc>,
    /// Accumulated simulated offset from `epoch`.
    elapsed: TimeDelta,
    /// Multiple of real time.
    speed: f64,
    /// `false` once the clock was sped up or slowed down since the last reset.
    real_time: bool,
}

impl SimClock {
    /// Creates a real-time clock whose epoch is `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { epoch: now, last_wall: now, elapsed: TimeDelta::zero(), speed: 1.0, real_time: true }
    }

    /// Advances the simulated offset to wall time `now` and returns the simulated instant.
    ///
    /// Wall time running backwards is ignored so the simulated instant never decreases.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn sync(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let wall_dt = (now - self.last_wall).max(TimeDelta::zero());
        let wall_us = wall_dt.num_microseconds().unwrap_or(i64::MAX) as f64;
        self.elapsed += TimeDelta::microseconds((wall_us * self.speed).round() as i64);
        self.last_wall = self.last_wall.max(now);
        self.instant()
    }

    /// The simulated instant as of the last synchronisation.
    pub fn instant(&self) -> DateTime<Utc> { self.epoch + self.elapsed }

    /// Changes the speed factor. Elapsed wall time up to `now` is accounted at the old speed.
    pub fn set_speed(&mut self, factor: f64, now: DateTime<Utc>) {
        self.sync(now);
        if (factor - self.speed).abs() > f64::EPSILON {
            self.real_time = false;
        }
        self.speed = factor;
    }

    /// Snaps the simulated instant back to wall time and resets the speed to 1.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.speed = 1.0;
        self.elapsed = now - self.epoch;
        self.last_wall = now;
        self.real_time = true;
    }

    pub fn speed(&self) -> f64 { self.speed }
    pub fn epoch(&self) -> DateTime<Utc> { self.epoch }
    pub fn is_real_time(&self) -> bool { self.real_time }
}

/// Discrete simulation speeds selectable from the viewer, in multiples of real time.
pub const SPEED_STEPS: [(f64, &str); 7] = [
    (1.0, "1 sec/s"),
    (10.0, "10 sec/s"),
    (30.0, "30 sec/s"),
    (60.0, "1 min/s"),
    (300.0, "5 min/s"),
    (1800.0, "30 min/s"),
    (3600.0, "1 hr/s"),
];

/// Cursor over [`SPEED_STEPS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedLadder {
    index: usize,
}

impl SpeedLadder {
    /// Steps one speed up. Returns the new factor, or `None` at the top of the ladder.
    pub fn faster(&mut self) -> Option<f64> {
        if self.index + 1 < SPEED_STEPS.len() {
            self.index += 1;
            Some(self.factor())
        } else {
            None
        }
    }

    /// Steps one speed down. Returns the new factor, or `None` at the bottom of the ladder.
    pub fn slower(&mut self) -> Option<f64> {
        if self.index > 0 {
            self.index -= 1;
            Some(self.factor())
        } else {
            None
        }
    }

    pub fn reset(&mut self) { self.index = 0; }
    pub fn factor(&self) -> f64 { SPEED_STEPS[self.index].0 }
    pub fn label(&self) -> &'static str { SPEED_STEPS[self.index].1 }
    pub fn can_go_faster(&self) -> bool { self.index + 1 < SPEED_STEPS.len() }
    pub fn can_go_slower(&self) -> bool { self.index > 0 }
}
