use lib_fusion::engine::PositionReport;
use std::f64::consts::TAU;
use std::time::Duration;

const METERS_PER_DEGREE: f64 = 111_320.0;

/// # Circular Path
///
/// A vehicle driving laps around a fixed center. Fix `n` is fully determined
/// by `n`, so two runs with the same settings report the same coordinates.
///
/// Speed and heading are derived from the previous fix, the way a browser's
/// geolocation reports them: the first fix carries neither.
#[derive(Debug, Clone)]
pub struct CircularPath {
    track: String,
    center: (f64, f64),
    radius_m: f64,
    steps_per_lap: u32,
    interval: Duration,
    step: u64,
    previous: Option<(f64, f64)>,
}

impl CircularPath {
    pub fn new(track: String, interval: Duration) -> Self {
        Self {
            track,
            center: (52.520008, 13.404954),
            radius_m: 400.0,
            steps_per_lap: 120,
            interval,
            step: 0,
            previous: None,
        }
    }

    /// Number of fixes produced so far.
    pub fn produced(&self) -> u64 {
        self.step
    }

    fn fix(&self, step: u64) -> (f64, f64) {
        let angle = TAU * (step % u64::from(self.steps_per_lap)) as f64 / f64::from(self.steps_per_lap);
        let (center_lat, center_lon) = self.center;
        let lat = center_lat + self.radius_m * angle.cos() / METERS_PER_DEGREE;
        let lon = center_lon + self.radius_m * angle.sin() / (METERS_PER_DEGREE * center_lat.to_radians().cos());
        (lat, lon)
    }

    pub fn next_report(&mut self) -> PositionReport {
        let (latitude, longitude) = self.fix(self.step);
        self.step += 1;

        let (speed, heading) = match self.previous.replace((latitude, longitude)) {
            Some(previous) => {
                let (distance, bearing) = displacement(previous, (latitude, longitude));
                (Some(distance / self.interval.as_secs_f64()), Some(bearing))
            }
            None => (None, None),
        };

        PositionReport {
            latitude,
            longitude,
            speed,
            heading,
            track: self.track.clone(),
        }
    }
}

// Equirectangular approximation; good enough for a few hundred meters.
fn displacement(from: (f64, f64), to: (f64, f64)) -> (f64, f64) {
    let mid_lat = ((from.0 + to.0) / 2.0).to_radians();
    let north = (to.0 - from.0) * METERS_PER_DEGREE;
    let east = (to.1 - from.1) * METERS_PER_DEGREE * mid_lat.cos();
    let bearing = east.atan2(north).to_degrees().rem_euclid(360.0);
    (north.hypot(east), bearing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> CircularPath {
        CircularPath::new("bus1".into(), Duration::from_secs(1))
    }

    #[test]
    fn first_fix_has_no_speed_or_heading() {
        let mut path = path();
        let first = path.next_report();
        assert_eq!(first.track, "bus1");
        assert_eq!(first.speed, None);
        assert_eq!(first.heading, None);

        let second = path.next_report();
        assert!(second.speed.is_some());
        assert!(second.heading.is_some());
        assert_eq!(path.produced(), 2);
    }

    #[test]
    fn runs_are_reproducible() {
        let mut a = path();
        let mut b = path();
        for _ in 0..10 {
            assert_eq!(a.next_report(), b.next_report());
        }
    }

    #[test]
    fn laps_return_to_the_start() {
        let mut path = path();
        let start = path.next_report();
        for _ in 1..120 {
            path.next_report();
        }
        let lap = path.next_report();
        assert_eq!(lap.latitude, start.latitude);
        assert_eq!(lap.longitude, start.longitude);
    }

    #[test]
    fn speed_matches_chord_length() {
        let mut path = path();
        path.next_report();
        let second = path.next_report();

        // chord of a 400 m circle split into 120 steps, covered in 1 s
        let expected = 2.0 * 400.0 * (TAU / 240.0).sin();
        let speed = second.speed.unwrap();
        assert!((speed - expected).abs() < 0.5, "speed {speed} vs {expected}");
        // starting north of the center and turning clockwise: heading east-south-east
        let heading = second.heading.unwrap();
        assert!((90.0..=100.0).contains(&heading), "heading {heading}");
    }

    #[test]
    fn bearing_is_normalized() {
        let (_, west) = displacement((0.0, 0.0), (0.0, -0.001));
        assert!((west - 270.0).abs() < 1e-9);
        let (_, north) = displacement((0.0, 0.0), (0.001, 0.0));
        assert!(north.abs() < 1e-9);
    }
}
