//! Phase-Locked Delay Line
//!
//! A second-order delay-locked loop over zero-crossing timestamps. The loop
//! predicts the next crossing time from its running period estimate and
//! corrects both from the observed phase error, giving per-crossing frequency
//! readings far finer than the FFT's bin resolution.
//!
//! Crossing times are expressed on the caller's monotonic sample counter, so
//! phase stays well-defined across block boundaries for as long as the loop
//! remains locked.

/// Loop stiffness: omega = K_LOOP * PI * fc / rate, widened below 50 Hz
/// where crossings arrive slowly.
const K_LOOP: f64 = 4.0;
const K_LOOP_WIDE: f64 = 6.0;
const WIDE_BELOW_HZ: f64 = 50.0;

/// Relative phase error above which the edge-to-edge reading is trusted over
/// the loop's period estimate. During frequency ramps the period estimate
/// lags while the edge spacing stays true.
const EDGE_SELECT: f64 = 0.02;

/// One frequency reading, produced per accepted zero crossing.
#[derive(Debug, Clone, Copy)]
pub struct CrossingEstimate {
    /// Selected instantaneous frequency in Hz.
    pub freq: f32,
    /// Phase error at this crossing, in samples.
    pub phase_error: f64,
}

/// Second-order DLL tracking the period of a zero-crossing train.
#[derive(Debug, Clone, Copy)]
pub struct DelayLockedLoop {
    rate: f64,
    edges: f64,
    fc: f64,
    b: f64,
    c: f64,
    t0: f64,
    t1: f64,
    e0: f64,
    e2: f64,
    initialized: bool,
}

impl DelayLockedLoop {
    /// `edges_per_period` is 2 when both rising and falling crossings feed
    /// the loop, 1 for rising-only operation.
    pub fn new(rate: f64, edges_per_period: u8) -> Self {
        Self {
            rate,
            edges: edges_per_period as f64,
            fc: 0.0,
            b: 0.0,
            c: 0.0,
            t0: 0.0,
            t1: 0.0,
            e0: 0.0,
            e2: 0.0,
            initialized: false,
        }
    }

    /// Retarget the loop to a new center frequency and invalidate tracking.
    pub fn tune(&mut self, fc: f64) {
        let k = if fc < WIDE_BELOW_HZ { K_LOOP_WIDE } else { K_LOOP };
        let omega = k * std::f64::consts::PI * fc / self.rate;
        self.b = std::f64::consts::SQRT_2 * omega;
        self.c = omega * omega;
        self.fc = fc;
        self.initialized = false;
    }

    /// Drop the lock; the next crossing re-seeds the loop.
    pub fn invalidate(&mut self) {
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Phase error of the most recent crossing, in samples.
    pub fn phase_error(&self) -> f64 {
        self.e0
    }

    /// Mark the loop locked without a crossing. Spectrum-only operation uses
    /// this so the readout path sees a zero phase error.
    pub fn force_initialized(&mut self) {
        self.initialized = true;
        self.e0 = 0.0;
    }

    /// Feed one zero crossing observed at absolute sample time `now`.
    ///
    /// The first crossing after `tune`/`invalidate` seeds the loop from the
    /// tuned center frequency and yields no estimate; each later crossing
    /// advances the loop and returns one.
    pub fn crossing(&mut self, now: f64) -> Option<CrossingEstimate> {
        if !self.initialized {
            self.initialized = true;
            self.e0 = 0.0;
            self.t0 = 0.0;
            self.e2 = self.rate / (self.edges * self.fc);
            self.t1 = now + self.e2;
            return None;
        }

        // phase 'error' = observed crossing time - predicted crossing time
        self.e0 = now - self.t1;
        self.t0 = self.t1;
        self.t1 += self.b * self.e0 + self.e2;
        self.e2 += self.c * self.e0;

        let f_edge = self.rate / (self.edges * (self.t1 - self.t0));
        let f_period = self.rate / (self.edges * self.e2);
        let freq = if (self.e0 * self.fc / self.rate).abs() > EDGE_SELECT {
            f_edge
        } else {
            f_period
        };
        Some(CrossingEstimate {
            freq: freq as f32,
            phase_error: self.e0,
        })
    }
}
