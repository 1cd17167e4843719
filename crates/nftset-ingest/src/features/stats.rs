//! Per-channel pixel statistics
//!
//! Everything is derived from 256-bucket channel histograms, the same way
//! classic image-stat tooling does it: moments come from bucket index times
//! bucket count, the median is the first bucket whose cumulative count
//! passes half the pixels, and entropy is taken over the concatenated
//! histogram of all channels.

/// Buckets per 8-bit channel
pub const BUCKETS_PER_CHANNEL: usize = 256;

/// Fixed histogram width of a dataset row; four 8-bit channels fill it
pub const HISTOGRAM_LEN: usize = 1024;

/// Statistics of one channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub count: u64,
    pub sum: f64,
    pub sum2: f64,
    pub mean: f64,
    pub median: u8,
    pub rms: f64,
    pub var: f64,
    pub stddev: f64,
    pub min: u8,
    pub max: u8,
}

impl ChannelStats {
    pub fn from_histogram(histogram: &[u64]) -> Self {
        let count: u64 = histogram.iter().sum();

        let mut sum = 0.0;
        let mut sum2 = 0.0;
        for (value, &n) in histogram.iter().enumerate() {
            let v = value as f64;
            let n = n as f64;
            sum += v * n;
            sum2 += v * v * n;
        }

        let half = count / 2;
        let mut cumulative = 0;
        let mut median = 0;
        for (value, &n) in histogram.iter().enumerate() {
            cumulative += n;
            if cumulative > half {
                median = value;
                break;
            }
        }

        let occupied = || histogram.iter().enumerate().filter(|&(_, &n)| n > 0).map(|(v, _)| v);
        let min = occupied().next().unwrap_or(0);
        let max = occupied().last().unwrap_or(0);

        let (mean, rms, var) = if count == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let c = count as f64;
            let var = ((sum2 - sum * sum / c) / c).max(0.0);
            (sum / c, (sum2 / c).sqrt(), var)
        };

        Self {
            count,
            sum,
            sum2,
            mean,
            median: clamp_u8(median),
            rms,
            var,
            stddev: var.sqrt(),
            min: clamp_u8(min),
            max: clamp_u8(max),
        }
    }
}

fn clamp_u8(value: usize) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

/// The statistics bundle of one image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStats {
    channels: Vec<ChannelStats>,

    /// Native histogram: 256 buckets per channel, channels concatenated
    histogram: Vec<u64>,

    pub entropy: f64,
}

impl ImageStats {
    /// Compute from interleaved 8-bit samples with `channels` samples per
    /// pixel
    pub fn from_samples(samples: &[u8], channels: usize) -> Self {
        let channels = channels.max(1);
        let mut histogram = vec![0u64; BUCKETS_PER_CHANNEL * channels];

        for pixel in samples.chunks_exact(channels) {
            for (channel, &value) in pixel.iter().enumerate() {
                histogram[channel * BUCKETS_PER_CHANNEL + usize::from(value)] += 1;
            }
        }

        let channel_stats = histogram
            .chunks_exact(BUCKETS_PER_CHANNEL)
            .map(ChannelStats::from_histogram)
            .collect();

        Self {
            channels: channel_stats,
            entropy: entropy(&histogram),
            histogram,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Statistics of channel `index`, `None` past the image's channel count
    pub fn channel(&self, index: usize) -> Option<&ChannelStats> {
        self.channels.get(index)
    }

    pub fn native_histogram(&self) -> &[u64] {
        &self.histogram
    }

    /// Histogram right-padded with zeros to exactly [`HISTOGRAM_LEN`] buckets
    pub fn padded_histogram(&self) -> Vec<u64> {
        let mut padded = self.histogram.clone();
        padded.resize(HISTOGRAM_LEN, 0);
        padded
    }
}

/// Shannon entropy, in bits, of a histogram treated as one distribution
pub fn entropy(histogram: &[u64]) -> f64 {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    histogram
        .iter()
        .filter(|&&n| n > 0)
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_channel_moments() {
        // Four pixels: 0, 0, 2, 4
        let mut hist = vec![0u64; 256];
        hist[0] = 2;
        hist[2] = 1;
        hist[4] = 1;

        let stats = ChannelStats::from_histogram(&hist);
        assert_eq!(stats.count, 4);
        assert!(approx(stats.sum, 6.0));
        assert!(approx(stats.sum2, 20.0));
        assert!(approx(stats.mean, 1.5));
        assert!(approx(stats.rms, 5.0f64.sqrt()));
        assert!(approx(stats.var, 2.75));
        assert!(approx(stats.stddev, 2.75f64.sqrt()));
        assert_eq!(stats.median, 2);
        assert_eq!((stats.min, stats.max), (0, 4));
    }

    #[test]
    fn test_rgb_samples_split_by_channel() {
        let samples = [255u8, 0, 10, 255, 0, 20];
        let stats = ImageStats::from_samples(&samples, 3);

        assert_eq!(stats.channel_count(), 3);
        assert_eq!(stats.native_histogram().len(), 768);
        assert_eq!(stats.channel(0).unwrap().min, 255);
        assert_eq!(stats.channel(1).unwrap().max, 0);
        assert!(approx(stats.channel(2).unwrap().mean, 15.0));
        assert!(stats.channel(3).is_none());
    }

    #[test]
    fn test_histogram_always_padded_to_full_width() {
        let gray = ImageStats::from_samples(&[0, 255, 255, 0], 1);
        let rgba = ImageStats::from_samples(&[1, 2, 3, 4], 4);

        assert_eq!(gray.native_histogram().len(), 256);
        assert_eq!(gray.padded_histogram().len(), HISTOGRAM_LEN);
        assert!(gray.padded_histogram()[256..].iter().all(|&n| n == 0));
        assert_eq!(rgba.padded_histogram().len(), HISTOGRAM_LEN);
        assert_eq!(rgba.padded_histogram()[3 * 256 + 4], 1);
    }

    #[test]
    fn test_entropy() {
        assert!(approx(entropy(&[5, 0, 0]), 0.0));
        assert!(approx(entropy(&[1, 1]), 1.0));
        assert!(approx(entropy(&[1, 1, 1, 1]), 2.0));
        assert!(approx(entropy(&[]), 0.0));

        let stats = ImageStats::from_samples(&[0, 255, 0, 255], 1);
        assert!(approx(stats.entropy, 1.0));
    }

    #[test]
    fn test_empty_image_has_no_nan() {
        let stats = ImageStats::from_samples(&[], 3);
        let r = stats.channel(0).unwrap();
        assert_eq!(r.count, 0);
        assert!(r.mean == 0.0 && r.var == 0.0 && r.stddev == 0.0);
    }
}
