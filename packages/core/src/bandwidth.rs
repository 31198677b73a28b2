//! Throughput samples and the running statistics shown next to them.
//!
//! Samples come from a [`BandwidthSampler`]. The binary uses random noise;
//! tests inject fixed readings.

use std::ops::RangeInclusive;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upload/download pair in Mbps
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub upload: f64,
    pub download: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandwidthStats {
    pub current: Throughput,
    pub peak: Throughput,
    pub average: Throughput,
    /// GB transferred
    pub total: f64,
    pub samples: u64,
}

impl BandwidthStats {
    /// Fold in one sample covering `interval_secs` seconds.
    pub fn record(&mut self, sample: Throughput, interval_secs: f64) {
        let n = self.samples as f64;
        self.current = sample;
        self.peak.upload = self.peak.upload.max(sample.upload);
        self.peak.download = self.peak.download.max(sample.download);
        self.average.upload = (self.average.upload * n + sample.upload) / (n + 1.0);
        self.average.download = (self.average.download * n + sample.download) / (n + 1.0);
        // Mbps * s / 8 = MB, / 1000 = GB
        self.total += (sample.upload + sample.download) * interval_secs / 8.0 / 1000.0;
        self.samples += 1;
    }
}

pub trait BandwidthSampler: Send {
    fn sample(&mut self) -> Throughput;
}

/// Uniform noise within fixed bands
#[derive(Debug, Clone)]
pub struct RandomSampler {
    upload: RangeInclusive<f64>,
    download: RangeInclusive<f64>,
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self {
            upload: 5.0..=25.0,
            download: 3.0..=18.0,
        }
    }
}

impl BandwidthSampler for RandomSampler {
    fn sample(&mut self) -> Throughput {
        let mut rng = rand::thread_rng();
        Throughput {
            upload: rng.gen_range(self.upload.clone()),
            download: rng.gen_range(self.download.clone()),
        }
    }
}

/// Always reports the same reading
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub Throughput);

impl BandwidthSampler for FixedSampler {
    fn sample(&mut self) -> Throughput {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tracks_peak_and_average() {
        let mut stats = BandwidthStats::default();
        stats.record(Throughput { upload: 10.0, download: 4.0 }, 3.0);
        stats.record(Throughput { upload: 20.0, download: 2.0 }, 3.0);

        assert_eq!(stats.current.upload, 20.0);
        assert_eq!(stats.peak.upload, 20.0);
        assert_eq!(stats.peak.download, 4.0);
        assert_eq!(stats.average.upload, 15.0);
        assert_eq!(stats.average.download, 3.0);
        assert_eq!(stats.samples, 2);
    }

    #[test]
    fn total_converts_megabits_to_gigabytes() {
        let mut stats = BandwidthStats::default();
        stats.record(Throughput { upload: 8.0, download: 0.0 }, 1000.0);
        assert!((stats.total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn random_sampler_stays_in_band() {
        let mut sampler = RandomSampler::default();
        for _ in 0..100 {
            let s = sampler.sample();
            assert!((5.0..=25.0).contains(&s.upload));
            assert!((3.0..=18.0).contains(&s.download));
        }
    }
}
