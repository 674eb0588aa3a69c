use image::GrayImage;

/// Blur verdict for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpnessResult {
    pub is_blurry: bool,
    pub variance_score: f64,
    pub threshold: f64,
}

/// Classifies images as blurry by the variance of their Laplacian response.
#[derive(Debug, Clone, Copy)]
pub struct SharpnessAnalyzer {
    threshold: f64,
}

impl SharpnessAnalyzer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn analyze(&self, img: &GrayImage) -> SharpnessResult {
        self.classify(laplacian_variance(img))
    }

    /// Equal to the threshold counts as sharp.
    pub fn classify(&self, variance_score: f64) -> SharpnessResult {
        SharpnessResult {
            is_blurry: variance_score < self.threshold,
            variance_score,
            threshold: self.threshold,
        }
    }
}

impl Default for SharpnessAnalyzer {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Variance of the 4-neighbour Laplacian over every pixel.
///
/// Kernel `[0 1 0; 1 -4 1; 0 1 0]`. Borders mirror without repeating the
/// edge pixel (`dcb|abcd|cba`), so a flat image of any size scores 0.
pub fn laplacian_variance(img: &GrayImage) -> f64 {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let (w, h) = (w as i64, h as i64);
    let px = |x: i64, y: i64| img.get_pixel(reflect101(x, w), reflect101(y, h)).0[0] as f64;

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;

    for y in 0..h {
        for x in 0..w {
            let laplacian =
                px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y) - 4.0 * px(x, y);
            sum += laplacian;
            sum_sq += laplacian * laplacian;
        }
    }

    let count = (w * h) as f64;
    let mean = sum / count;
    ((sum_sq / count) - (mean * mean)).max(0.0)
}

fn reflect101(i: i64, n: i64) -> u32 {
    if n == 1 {
        return 0;
    }
    let reflected = if i < 0 {
        -i
    } else if i >= n {
        2 * n - 2 - i
    } else {
        i
    };
    reflected.clamp(0, n - 1) as u32
}
