//! Location acquisition: one-shot position request with a fixed fallback.
//!
//! The host capability (browser geolocation, a configured fixed position,
//! or nothing at all) sits behind `Geolocator`. A `LocationRequest` is the
//! single in-flight request: it resolves exactly once, falls back to
//! `Coordinate::DEFAULT_ORIGIN` on any failure, and drops callbacks that
//! arrive after it was cancelled (e.g. the view went away).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Coordinate;

/// Options handed to the host geolocation capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeolocationOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Hosts may answer from a cached fix this old. Advisory only.
    pub maximum_age: Duration,
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("location request timed out")]
    Timeout,
    #[error("geolocation is not supported")]
    Unsupported,
}

impl GeolocationError {
    /// Map a W3C `GeolocationPositionError.code`.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable,
            3 => Self::Timeout,
            _ => Self::PositionUnavailable,
        }
    }
}

/// Resolved origin plus an optional advisory for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationOutcome {
    pub origin: Coordinate,
    pub advisory: Option<String>,
}

impl LocationOutcome {
    pub fn resolve(result: Result<Coordinate, GeolocationError>) -> Self {
        match result {
            Ok(origin) if origin.is_finite() => Self {
                origin,
                advisory: None,
            },
            Ok(_) => Self::fallback(GeolocationError::PositionUnavailable),
            Err(e) => Self::fallback(e),
        }
    }

    pub fn fallback(error: GeolocationError) -> Self {
        Self {
            origin: Coordinate::DEFAULT_ORIGIN,
            advisory: Some(format!(
                "{error}. Showing players near the default location (New York City)."
            )),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.advisory.is_some()
    }
}

/// Callback handed to a `Geolocator`; fires at most once.
pub type LocationCallback = Box<dyn FnOnce(Result<Coordinate, GeolocationError>) + Send>;

/// Host geolocation capability.
pub trait Geolocator {
    fn request_position(&mut self, options: &GeolocationOptions, callback: LocationCallback);
}

/// A host with no geolocation capability at all.
pub struct NoGeolocation;

impl Geolocator for NoGeolocation {
    fn request_position(&mut self, _options: &GeolocationOptions, callback: LocationCallback) {
        callback(Err(GeolocationError::Unsupported));
    }
}

/// A host that always reports one configured position.
pub struct FixedGeolocation(pub Coordinate);

impl Geolocator for FixedGeolocation {
    fn request_position(&mut self, _options: &GeolocationOptions, callback: LocationCallback) {
        callback(Ok(self.0));
    }
}

// ---------------------------------------------------------------------------
// LocationRequest
// ---------------------------------------------------------------------------

struct RequestInner {
    alive: AtomicBool,
    outcome: Mutex<Option<LocationOutcome>>,
    settled: AtomicBool,
}

/// Handle to one in-flight location request.
///
/// Cloneable; the host callback holds a clone. `poll()` enforces the
/// timeout even when the host never answers.
#[derive(Clone)]
pub struct LocationRequest {
    inner: Arc<RequestInner>,
    started_at: f64,
    timeout_secs: f64,
}

impl LocationRequest {
    /// Start a request against `geolocator`. `now` is the caller's clock in seconds.
    pub fn start(geolocator: &mut dyn Geolocator, options: &GeolocationOptions, now: f64) -> Self {
        let request = Self {
            inner: Arc::new(RequestInner {
                alive: AtomicBool::new(true),
                outcome: Mutex::new(None),
                settled: AtomicBool::new(false),
            }),
            started_at: now,
            timeout_secs: options.timeout.as_secs_f64(),
        };
        let handle = request.clone();
        geolocator.request_position(options, Box::new(move |result| handle.settle(result)));
        request
    }

    fn settle(&self, result: Result<Coordinate, GeolocationError>) {
        if !self.inner.alive.load(Ordering::Acquire) {
            return;
        }
        if self.inner.settled.swap(true, Ordering::AcqRel) {
            return;
        }
        let outcome = LocationOutcome::resolve(result);
        *self.inner.outcome.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
    }

    /// Take the outcome once it is available. Past the timeout with no
    /// answer, resolves to the fallback. Returns `None` after `cancel()`.
    pub fn poll(&self, now: f64) -> Option<LocationOutcome> {
        if !self.inner.alive.load(Ordering::Acquire) {
            return None;
        }
        if now - self.started_at >= self.timeout_secs {
            self.settle(Err(GeolocationError::Timeout));
        }
        self.inner
            .outcome
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Stop listening. Late host callbacks are ignored.
    pub fn cancel(&self) {
        self.inner.alive.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        !self.inner.alive.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Holds the callback so the test decides when (and whether) it fires.
    #[derive(Default)]
    struct DeferredGeolocation {
        callback: Option<LocationCallback>,
    }

    impl Geolocator for DeferredGeolocation {
        fn request_position(&mut self, _options: &GeolocationOptions, callback: LocationCallback) {
            self.callback = Some(callback);
        }
    }

    #[test]
    fn failure_falls_back_to_new_york() {
        let request = LocationRequest::start(&mut NoGeolocation, &Default::default(), 0.0);
        let outcome = request.poll(0.1).unwrap();
        assert_eq!(outcome.origin, Coordinate::new(40.7128, -74.0060));
        assert!(outcome.is_fallback());
        assert!(outcome.advisory.unwrap().contains("not supported"));
        // Resolved once; nothing more to take.
        assert!(request.poll(0.2).is_none());
    }

    #[test]
    fn fallback_origin_still_generates_a_population() {
        let outcome = LocationOutcome::resolve(Err(GeolocationError::PermissionDenied));
        let players = crate::PopulationGenerator::seeded(2)
            .generate(outcome.origin, &Default::default());
        assert_eq!(players.len(), 15);
    }

    #[test]
    fn fixed_position_has_no_advisory() {
        let here = Coordinate::new(19.076, 72.8777);
        let request =
            LocationRequest::start(&mut FixedGeolocation(here), &Default::default(), 0.0);
        let outcome = request.poll(0.0).unwrap();
        assert_eq!(outcome.origin, here);
        assert!(outcome.advisory.is_none());
    }

    #[test]
    fn silent_host_times_out() {
        let mut geo = DeferredGeolocation::default();
        let request = LocationRequest::start(&mut geo, &Default::default(), 100.0);
        assert!(request.poll(105.0).is_none());
        let outcome = request.poll(110.0).unwrap();
        assert!(outcome.advisory.unwrap().contains("timed out"));

        // A late answer after the timeout changes nothing.
        (geo.callback.take().unwrap())(Ok(Coordinate::new(1.0, 1.0)));
        assert!(request.poll(111.0).is_none());
    }

    #[test]
    fn cancelled_request_ignores_late_callback() {
        let mut geo = DeferredGeolocation::default();
        let request = LocationRequest::start(&mut geo, &Default::default(), 0.0);
        request.cancel();
        (geo.callback.take().unwrap())(Ok(Coordinate::new(1.0, 1.0)));
        assert!(request.is_cancelled());
        assert!(request.poll(1.0).is_none());
        assert!(request.poll(60.0).is_none());
    }

    #[test]
    fn non_finite_fix_is_treated_as_unavailable() {
        let outcome = LocationOutcome::resolve(Ok(Coordinate::new(f64::NAN, 0.0)));
        assert_eq!(outcome.origin, Coordinate::DEFAULT_ORIGIN);
        assert_eq!(GeolocationError::from_code(1), GeolocationError::PermissionDenied);
        assert_eq!(GeolocationError::from_code(3), GeolocationError::Timeout);
    }
}
