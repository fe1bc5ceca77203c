use crate::common::GroupId;
use crate::common::sim_clock::{SPEED_STEPS, SimClock, SpeedLadder};
use crate::common::vec3d::Vec3D;
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use rand::Rng;
use std::f64::consts::FRAC_PI_2;

fn start() -> DateTime<Utc> { DateTime::UNIX_EPOCH + TimeDelta::days(20_000) }

#[test]
fn test_clock_accumulates_at_speed() {
    let t0 = start();
    let mut clock = SimClock::new(t0);
    assert_eq!(clock.sync(t0 + TimeDelta::seconds(2)), t0 + TimeDelta::seconds(2));
    clock.set_speed(60.0, t0 + TimeDelta::seconds(4));
    assert!(!clock.is_real_time());
    assert_eq!(clock.sync(t0 + TimeDelta::seconds(5)), t0 + TimeDelta::seconds(4 + 60));

    clock.set_speed(10.0, t0 + TimeDelta::seconds(6));
    assert_eq!(clock.instant(), t0 + TimeDelta::seconds(4 + 120));
    assert_eq!(clock.sync(t0 + TimeDelta::milliseconds(6_500)), t0 + TimeDelta::seconds(4 + 125));
    println!("Simulated instant {}", clock.instant());
}

#[test]
fn test_clock_never_runs_backwards_until_reset() {
    let t0 = start();
    let mut clock = SimClock::new(t0);
    clock.set_speed(3600.0, t0);
    let ahead = clock.sync(t0 + TimeDelta::seconds(1));
    assert_eq!(clock.sync(t0), ahead);

    clock.reset(t0 + TimeDelta::seconds(2));
    assert_eq!(clock.instant(), t0 + TimeDelta::seconds(2));
    assert!(clock.instant() < ahead);
    assert!(clock.is_real_time());
    assert!((clock.speed() - 1.0).abs() < f64::EPSILON);
    assert_eq!(clock.epoch(), t0);
}

#[test]
fn test_identical_command_sequences_agree() {
    let mut rng = rand::rng();
    let t0 = start();
    let steps = (0..20)
        .map(|i| (t0 + TimeDelta::milliseconds(i * rng.random_range(100..900)), rng.random_range(1.0..100.0)))
        .sorted_by_key(|(t, _)| *t)
        .collect_vec();
    let mut first = SimClock::new(t0);
    let mut second = SimClock::new(t0);
    for (now, factor) in &steps {
        first.set_speed(*factor, *now);
        second.set_speed(*factor, *now);
    }
    assert_eq!(first.instant(), second.instant());
}

#[test]
fn test_speed_ladder() {
    let mut ladder = SpeedLadder::default();
    assert!(ladder.slower().is_none());
    assert_eq!(ladder.label(), "1 sec/s");
    let climbed = std::iter::from_fn(|| ladder.faster()).collect_vec();
    assert_eq!(climbed, SPEED_STEPS[1..].iter().map(|(f, _)| *f).collect_vec());
    assert!(!ladder.can_go_faster());
    assert_eq!(ladder.label(), "1 hr/s");
    assert_eq!(ladder.slower(), Some(1800.0));
    ladder.reset();
    assert!(!ladder.can_go_slower());
    assert!((ladder.factor() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_vec3d_products() {
    let x: Vec3D<f64> = Vec3D::new(1.0, 0.0, 0.0);
    let y: Vec3D<f64> = Vec3D::new(0.0, 1.0, 0.0);
    assert_eq!(x.cross(y), Vec3D::unit_z());
    assert!(x.dot(y).abs() < f64::EPSILON);
    let v: Vec3D<f64> = Vec3D::new(3.0, 4.0, 12.0);
    assert!((v.abs() - 13.0).abs() < 1e-12);
    assert!((v.normalize().abs() - 1.0).abs() < 1e-12);
    let rotated = x.rotated_z(FRAC_PI_2);
    assert!(rotated.distance_sq(&y) < 1e-24);
    assert!(y.rotated_x(FRAC_PI_2).distance_sq(&Vec3D::unit_z()) < 1e-24);
    assert!(!Vec3D::new(f64::NAN, 0.0, 0.0).is_finite());
    assert_eq!(format!("{}", Vec3D::new(1, 2, 3)), "[1, 2, 3]");
}

#[test]
fn test_group_id() {
    let id = GroupId::from("./groups/stations.json");
    assert_eq!(id.as_str(), "./groups/stations.json");
    assert_eq!(id.to_string(), "./groups/stations.json");
    assert_eq!(id, GroupId::new("./groups/stations.json"));
}
