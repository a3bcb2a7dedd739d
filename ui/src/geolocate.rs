//! Host geolocation for the map.
//!
//! The browser build asks `navigator.geolocation`; the native build has no
//! positioning hardware to ask, so it reports a configured fixed origin or
//! nothing at all (which resolves to the default-origin fallback).

use playermap::{Coordinate, FixedGeolocation, Geolocator};

/// Geolocator for the current platform. `fixed` wins when set.
pub fn platform_geolocator(fixed: Option<Coordinate>) -> Box<dyn Geolocator> {
    if let Some(origin) = fixed {
        return Box::new(FixedGeolocation(origin));
    }
    #[cfg(target_arch = "wasm32")]
    {
        Box::new(browser::BrowserGeolocation)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Box::new(playermap::NoGeolocation)
    }
}

#[cfg(target_arch = "wasm32")]
mod browser {
    use std::cell::RefCell;
    use std::rc::Rc;

    use playermap::{
        Coordinate, GeolocationError, GeolocationOptions, Geolocator, LocationCallback,
    };
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::Closure;

    pub struct BrowserGeolocation;

    impl Geolocator for BrowserGeolocation {
        fn request_position(&mut self, options: &GeolocationOptions, callback: LocationCallback) {
            let Some(geolocation) =
                web_sys::window().and_then(|w| w.navigator().geolocation().ok())
            else {
                callback(Err(GeolocationError::Unsupported));
                return;
            };

            // Whichever browser callback fires first consumes it.
            let slot = Rc::new(RefCell::new(Some(callback)));

            let on_success = {
                let slot = Rc::clone(&slot);
                Closure::once(move |position: web_sys::Position| {
                    if let Some(cb) = slot.borrow_mut().take() {
                        let coords = position.coords();
                        cb(Ok(Coordinate::new(coords.latitude(), coords.longitude())));
                    }
                })
            };
            let on_error = {
                let slot = Rc::clone(&slot);
                Closure::once(move |error: web_sys::PositionError| {
                    if let Some(cb) = slot.borrow_mut().take() {
                        cb(Err(GeolocationError::from_code(error.code())));
                    }
                })
            };

            let opts = web_sys::PositionOptions::new();
            opts.set_enable_high_accuracy(options.enable_high_accuracy);
            opts.set_timeout(options.timeout.as_millis() as u32);
            opts.set_maximum_age(options.maximum_age.as_millis() as u32);

            let requested = geolocation.get_current_position_with_error_callback_and_options(
                on_success.as_ref().unchecked_ref(),
                Some(on_error.as_ref().unchecked_ref()),
                &opts,
            );
            if requested.is_err()
                && let Some(cb) = slot.borrow_mut().take()
            {
                cb(Err(GeolocationError::Unsupported));
            }

            // Browser owns the callbacks from here on.
            on_success.forget();
            on_error.forget();
        }
    }
}
