//! Smooth moves for lights and beams
//!
//! Each light or beam has at most one active tween. Starting a new move on
//! the same target replaces the old tween, so two moves never interleave.

use std::collections::BTreeMap;
use std::time::Duration;

use glam::Vec2;

/// Cosine ease-in-out over [0, 1]
#[inline]
pub fn ease_in_out(progress: f32) -> f32 {
    0.5 - (progress * std::f32::consts::PI).cos() / 2.0
}

/// Host seconds to a duration; negative and NaN become zero.
pub fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs.max(0.0)).unwrap_or(Duration::MAX)
}

/// Position and facing of an animated object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec2,
    /// Degrees; ignored for point lights
    pub angle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    pub from: Pose,
    pub to: Pose,
    pub start: Duration,
    pub duration: Duration,
}

impl Tween {
    /// Linear progress in [0, 1] at `now`
    pub fn progress(&self, now: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.start).as_secs_f64();
        (elapsed / self.duration.as_secs_f64()).min(1.0) as f32
    }

    /// Eased pose at `now`
    pub fn sample(&self, now: Duration) -> Pose {
        let p = self.progress(now);
        if p >= 1.0 {
            return self.to;
        }
        let e = ease_in_out(p);
        Pose {
            position: self.from.position.lerp(self.to.position, e),
            angle: self.from.angle + (self.to.angle - self.from.angle) * e,
        }
    }
}

/// What a tween drives
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    Light(String),
    Beam(String),
}

/// Active tweens keyed by target
#[derive(Debug, Clone, Default)]
pub struct Animations {
    active: BTreeMap<Target, Tween>,
}

impl Animations {
    /// Start a tween, cancelling any running on the same target.
    /// Returns true when an earlier tween was cancelled.
    pub fn start(&mut self, target: Target, tween: Tween) -> bool {
        let replaced = self.active.insert(target.clone(), tween).is_some();
        if replaced {
            log::debug!("Cancelled running animation on {:?}", target);
        }
        replaced
    }

    pub fn cancel(&mut self, target: &Target) -> bool {
        self.active.remove(target).is_some()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn is_active(&self, target: &Target) -> bool {
        self.active.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Sample every tween at `now`, dropping the ones that finished.
    pub fn step(&mut self, now: Duration) -> Vec<(Target, Pose)> {
        let poses: Vec<(Target, Pose)> = self
            .active
            .iter()
            .map(|(target, tween)| (target.clone(), tween.sample(now)))
            .collect();
        self.active.retain(|_, tween| tween.progress(now) < 1.0);
        poses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pose(x: f32, y: f32, angle: f32) -> Pose {
        Pose { position: Vec2::new(x, y), angle }
    }

    fn tween(secs: f32) -> Tween {
        Tween {
            from: pose(0.0, 0.0, 0.0),
            to: pose(100.0, -50.0, 90.0),
            start: Duration::from_secs(1),
            duration: seconds(secs),
        }
    }

    #[test]
    fn test_ease_endpoints() {
        assert_relative_eq!(ease_in_out(0.0), 0.0);
        assert_relative_eq!(ease_in_out(0.5), 0.5);
        assert_relative_eq!(ease_in_out(1.0), 1.0);
        // Slow start
        assert!(ease_in_out(0.1) < 0.1);
    }

    #[test]
    fn test_seconds_sanitises_input() {
        assert_eq!(seconds(-3.0), Duration::ZERO);
        assert_eq!(seconds(f32::NAN), Duration::ZERO);
        assert_eq!(seconds(1.5), Duration::from_millis(1500));
        assert_eq!(seconds(f32::INFINITY), Duration::MAX);
    }

    #[test]
    fn test_tween_sampling() {
        let t = tween(2.0);
        assert_eq!(t.sample(Duration::ZERO), t.from, "before start holds the origin");
        let mid = t.sample(Duration::from_secs(2));
        assert_relative_eq!(mid.position.x, 50.0, epsilon = 1e-3);
        assert_relative_eq!(mid.angle, 45.0, epsilon = 1e-3);
        assert_eq!(t.sample(Duration::from_secs(10)), t.to);
    }

    #[test]
    fn test_zero_duration_finishes_immediately() {
        let t = tween(0.0);
        assert_eq!(t.progress(Duration::from_secs(1)), 1.0);
        assert_eq!(t.sample(Duration::from_secs(1)), t.to);
    }

    #[test]
    fn test_new_move_cancels_previous() {
        let mut anims = Animations::default();
        let target = Target::Light("L1".into());
        assert!(!anims.start(target.clone(), tween(1.0)));
        assert!(anims.start(target.clone(), tween(3.0)));
        assert_eq!(anims.len(), 1);

        // Only the 3 second tween is left: still running after 2 seconds
        let poses = anims.step(Duration::from_secs(3));
        assert_eq!(poses.len(), 1);
        assert!(anims.is_active(&target));

        let poses = anims.step(Duration::from_secs(4));
        assert_eq!(poses[0].1, tween(3.0).to);
        assert!(anims.is_empty());
    }
}
