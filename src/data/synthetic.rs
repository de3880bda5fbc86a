//! Synthetic torque sweeps generated from the double-Lorentzian model.
//!
//! The load signal is the inverse of the physical conversion:
//!
//! ```text
//! load(θ) = ic(θ)[mA] / 1000 · B · cos θ / icScale  +  drift · θ_raw + offset  +  noise
//! ```
//!
//! so a noise-free sweep that ends at ±90° (where `cos θ = 0`) reduces back to
//! the model curve exactly. The angle trace ramps up past the peak and then
//! reverses, like a real recording.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::convert::ic_scale;
use crate::domain::{LorentzParams, Recording, SampleGeometry, Sweep};
use crate::error::AppError;

/// Knobs for synthetic sweep generation.
#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    pub geometry: SampleGeometry,
    /// Constant applied field (T).
    pub field: f64,
    /// Model angle range of the rising ramp (deg).
    pub angle_min: f64,
    pub angle_max: f64,
    pub step: f64,
    /// Raw instrument angle at which the model peak (θ = 0) sits.
    pub peak_offset: f64,
    /// Samples recorded after the reversal point.
    pub reverse_samples: usize,
    /// Repeat every n-th ramp sample once (0 disables).
    pub duplicate_every: usize,
    /// Linear load drift (V per raw degree).
    pub drift: f64,
    /// Constant load offset (V).
    pub offset: f64,
    /// Gaussian load noise standard deviation (V).
    pub noise: f64,
    /// Sample temperature (K), recorded as a flat auxiliary channel.
    pub temperature: f64,
    pub seed: u64,
}

impl SyntheticOptions {
    pub fn new(geometry: SampleGeometry) -> Self {
        Self {
            geometry,
            field: 1.0,
            angle_min: -90.0,
            angle_max: 90.0,
            step: 1.0,
            peak_offset: 120.0,
            reverse_samples: 20,
            duplicate_every: 0,
            drift: 0.0,
            offset: 0.0,
            noise: 0.0,
            temperature: 77.0,
            seed: 42,
        }
    }
}

/// Generate a ramp-then-reverse sweep.
pub fn synthetic_sweep(params: &LorentzParams, opts: &SyntheticOptions) -> Result<Sweep, AppError> {
    if !(opts.step.is_finite() && opts.step > 0.0) {
        return Err(AppError::new(2, "Synthetic angle step must be > 0."));
    }
    if !(opts.angle_min.is_finite() && opts.angle_max.is_finite() && opts.angle_max > opts.angle_min) {
        return Err(AppError::new(2, "Invalid synthetic angle range."));
    }
    if !(opts.field.is_finite() && opts.field != 0.0) {
        return Err(AppError::new(2, "Synthetic field must be finite and non-zero."));
    }
    if !(opts.noise.is_finite() && opts.noise >= 0.0) {
        return Err(AppError::new(2, "Synthetic noise must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let scale = ic_scale(&opts.geometry);
    let n_ramp = ((opts.angle_max - opts.angle_min) / opts.step).round() as usize + 1;

    // Model angles: rising ramp, then back down from just below the top.
    let mut thetas: Vec<f64> = Vec::with_capacity(n_ramp + opts.reverse_samples);
    for i in 0..n_ramp {
        let theta = opts.angle_min + opts.step * i as f64;
        thetas.push(theta);
        if opts.duplicate_every > 0 && i > 0 && i + 1 < n_ramp && i % opts.duplicate_every == 0 {
            thetas.push(theta);
        }
    }
    let top = opts.angle_min + opts.step * (n_ramp - 1) as f64;
    for k in 1..=opts.reverse_samples {
        thetas.push(top - opts.step * k as f64);
    }

    let mut sweep = Sweep {
        angle: Vec::with_capacity(thetas.len()),
        load: Vec::with_capacity(thetas.len()),
        field: Vec::with_capacity(thetas.len()),
        time: Vec::with_capacity(thetas.len()),
    };

    for (i, &theta) in thetas.iter().enumerate() {
        let raw = opts.peak_offset + theta;
        let ic_amps = params.evaluate(theta) / 1000.0;
        let torque = ic_amps * opts.field * theta.to_radians().cos() / scale;
        let noise = if opts.noise > 0.0 {
            opts.noise * normal.sample(&mut rng)
        } else {
            0.0
        };

        sweep.angle.push(raw);
        sweep.load.push(torque + opts.drift * raw + opts.offset + noise);
        sweep.field.push(opts.field);
        sweep.time.push(i as f64 * 0.5);
    }

    Ok(sweep)
}

/// Generate a full recording (sweep plus flat auxiliary channels).
pub fn synthetic_recording(
    params: &LorentzParams,
    opts: &SyntheticOptions,
) -> Result<Recording, AppError> {
    let sweep = synthetic_sweep(params, opts)?;
    let n = sweep.len();
    Ok(Recording {
        pickup_coil: sweep.angle.clone(),
        temperature: vec![opts.temperature; n],
        heater_power: Some(vec![0.0; n]),
        sweep,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Probe;
    use crate::sweep::find_reversal;

    fn params() -> LorentzParams {
        LorentzParams::from_array([1.2, 3.5, 0.9, 11.0])
    }

    fn options() -> SyntheticOptions {
        SyntheticOptions::new(SampleGeometry::new(4e-3, 13e-3, Probe::One).unwrap())
    }

    #[test]
    fn sweep_ramps_then_reverses() {
        let sweep = synthetic_sweep(&params(), &options()).unwrap();
        assert_eq!(sweep.len(), 181 + 20);
        assert_eq!(find_reversal(&sweep.angle), Some(180));
        assert_eq!(sweep.angle[0], 30.0);
        assert_eq!(sweep.angle[180], 210.0);
    }

    #[test]
    fn load_vanishes_at_right_angles() {
        let sweep = synthetic_sweep(&params(), &options()).unwrap();
        assert!(sweep.load[0].abs() < 1e-18);
        assert!(sweep.load[180].abs() < 1e-18);
        assert!(sweep.load[90] > 0.0);
    }

    #[test]
    fn duplicates_are_inserted_on_the_ramp() {
        let mut opts = options();
        opts.duplicate_every = 10;
        let sweep = synthetic_sweep(&params(), &opts).unwrap();
        let repeats = sweep.angle.windows(2).filter(|w| w[0] == w[1]).count();
        assert_eq!(repeats, 17);
    }

    #[test]
    fn same_seed_same_noise() {
        let mut opts = options();
        opts.noise = 1e-8;
        let a = synthetic_sweep(&params(), &opts).unwrap();
        let b = synthetic_sweep(&params(), &opts).unwrap();
        assert_eq!(a, b);
        opts.seed = 7;
        let c = synthetic_sweep(&params(), &opts).unwrap();
        assert_ne!(a.load, c.load);
    }

    #[test]
    fn rejects_bad_step() {
        let mut opts = options();
        opts.step = 0.0;
        assert_eq!(synthetic_sweep(&params(), &opts).unwrap_err().exit_code(), 2);
    }
}
