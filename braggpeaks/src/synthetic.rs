//! Synthetic count volumes: Gaussian bumps on a flat background.

use crate::error::FindPeaksError;
use crate::volume::CountVolume;

/// A separable Gaussian peak in (row, col, channel) bin coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianBump {
    pub row: f32,
    pub col: f32,
    pub chan: f32,
    /// Height above background at the centre.
    pub amplitude: f32,
    /// Standard deviation along rows and columns.
    pub sigma: f32,
    /// Standard deviation along channels.
    pub sigma_chan: f32,
}

impl GaussianBump {
    pub fn new(row: f32, col: f32, chan: f32, amplitude: f32) -> Self {
        Self {
            row,
            col,
            chan,
            amplitude,
            sigma: 1.5,
            sigma_chan: 1.0,
        }
    }

    pub fn with_sigma(self, sigma: f32, sigma_chan: f32) -> Self {
        Self {
            sigma,
            sigma_chan,
            ..self
        }
    }

    #[inline]
    pub fn value_at(&self, row: usize, col: usize, chan: usize) -> f32 {
        let dr = row as f32 - self.row;
        let dc = col as f32 - self.col;
        let dt = chan as f32 - self.chan;
        let spatial = (dr * dr + dc * dc) / (2.0 * self.sigma * self.sigma);
        let temporal = dt * dt / (2.0 * self.sigma_chan * self.sigma_chan);
        self.amplitude * (-(spatial + temporal)).exp()
    }
}

/// Sum of `bumps` over a constant `background`.
pub fn gaussian_bumps(
    rows: usize,
    cols: usize,
    channels: usize,
    background: f32,
    bumps: &[GaussianBump],
) -> Result<CountVolume, FindPeaksError> {
    let mut volume = CountVolume::filled(rows, cols, channels, background)?;
    for row in 0..rows {
        for col in 0..cols {
            for chan in 0..channels {
                let extra: f32 = bumps.iter().map(|b| b.value_at(row, col, chan)).sum();
                volume[(row, col, chan)] += extra;
            }
        }
    }
    Ok(volume)
}
