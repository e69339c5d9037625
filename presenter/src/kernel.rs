/// Normalized square Gaussian kernel.
///
/// The 2-D weights are `exp(-(x² + y²) / 2σ²)` over a centred odd-sized grid,
/// scaled to sum to 1. They are the outer product of the normalized 1-D
/// profile, which is what the blur actually convolves with (rows, then
/// columns).
#[derive(Debug, Clone)]
pub struct GaussianKernel {
    size: usize,
    sigma: f64,
    profile: Vec<f64>,
}

impl GaussianKernel {
    /// `size` is bumped to the next odd number when even; zero becomes 1.
    pub fn new(size: usize, sigma: f64) -> Self {
        let size = match size {
            0 => 1,
            s if s % 2 == 0 => s + 1,
            s => s,
        };
        let half = (size as f64 - 1.0) / 2.0;
        let raw: Vec<f64> = (0..size)
            .map(|i| {
                let x = i as f64 - half;
                (-0.5 * x * x / (sigma * sigma)).exp()
            })
            .collect();
        let total: f64 = raw.iter().sum();
        let profile = raw.into_iter().map(|w| w / total).collect();
        Self {
            size,
            sigma,
            profile,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn radius(&self) -> usize {
        self.size / 2
    }

    /// 1-D weights, length `size`.
    pub fn profile(&self) -> &[f64] {
        &self.profile
    }

    /// Weight at row `y`, column `x` of the 2-D kernel.
    pub fn weight(&self, x: usize, y: usize) -> f64 {
        self.profile[y] * self.profile[x]
    }

    /// Row-major 2-D weights, `size * size` long.
    pub fn weights_2d(&self) -> Vec<f64> {
        (0..self.size)
            .flat_map(|y| (0..self.size).map(move |x| (x, y)))
            .map(|(x, y)| self.weight(x, y))
            .collect()
    }
}
