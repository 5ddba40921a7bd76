use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{Result, SimStageError};

/// Aggregate over every block measured since the last reset.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MeterSummary {
    pub sample_rate: u32,
    pub blocks: usize,
    pub duration_seconds: f32,
    pub max_peak: f32,
    pub mean_rms: f32,
}

/// Levels of a single rendered block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    /// Centre of the block, in seconds of rendered output.
    pub time: f32,
    pub rms: f32,
    pub peak: f32,
    /// Normalised [0, 1] spectral centroid where 1.0 is Nyquist.
    pub spectral_centroid: f32,
}

impl MeterReading {
    pub fn is_silent(&self) -> bool {
        self.peak <= SILENCE_FLOOR
    }
}

const SILENCE_FLOOR: f32 = 1e-4;

/// Measures blocks pulled from [`AudioEngine::render`](crate::AudioEngine::render).
pub struct OutputMeter {
    sample_rate: u32,
    summary: MeterSummary,
    rms_total: f32,
    processed_samples: usize,
    latest: Option<MeterReading>,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl OutputMeter {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            summary: MeterSummary {
                sample_rate,
                ..Default::default()
            },
            rms_total: 0.0,
            processed_samples: 0,
            latest: None,
            fft_planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn summary(&self) -> &MeterSummary {
        &self.summary
    }

    pub fn latest(&self) -> Option<&MeterReading> {
        self.latest.as_ref()
    }

    pub fn reset(&mut self) {
        self.summary = MeterSummary {
            sample_rate: self.sample_rate,
            ..Default::default()
        };
        self.rms_total = 0.0;
        self.processed_samples = 0;
        self.latest = None;
    }

    pub fn measure(&mut self, samples: &[f32]) -> Result<MeterReading> {
        if samples.len() < 2 {
            return Err(SimStageError::InvalidInput(
                "metering requires blocks with at least two samples",
            ));
        }

        let block_size = samples.len();
        let sample_rate = self.sample_rate as f32;
        let start_time = self.processed_samples as f32 / sample_rate;
        let end_time = (self.processed_samples + block_size) as f32 / sample_rate;

        let rms = compute_rms(samples);
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        let centroid_hz = self.compute_spectral_centroid(samples)?;
        let nyquist = sample_rate.max(1.0) * 0.5;
        let spectral_centroid = (centroid_hz / nyquist).clamp(0.0, 1.0);

        self.processed_samples += block_size;
        self.rms_total += rms;
        self.summary.blocks += 1;
        self.summary.duration_seconds = end_time;
        self.summary.max_peak = self.summary.max_peak.max(peak);
        self.summary.mean_rms = self.rms_total / self.summary.blocks as f32;

        let reading = MeterReading {
            time: start_time + (end_time - start_time) * 0.5,
            rms,
            peak,
            spectral_centroid,
        };
        self.latest = Some(reading.clone());
        Ok(reading)
    }

    fn compute_spectral_centroid(&mut self, samples: &[f32]) -> Result<f32> {
        let len = samples.len();
        let bin_hz = self.sample_rate as f32 / len as f32;
        let fft = self.prepare_fft(len);

        for (index, value) in samples.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, len);
        }
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let mut magnitude_sum = 0.0;
        let mut weighted_sum = 0.0;
        for (i, bin) in fft.spectrum.iter().enumerate() {
            let magnitude = bin.norm();
            magnitude_sum += magnitude;
            weighted_sum += magnitude * (i as f32 * bin_hz);
        }

        if magnitude_sum <= f32::EPSILON {
            Ok(0.0)
        } else {
            Ok(weighted_sum / magnitude_sum)
        }
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        if self.fft.as_ref().is_some_and(|fft| fft.size != size) {
            self.fft = None;
        }
        let planner = &mut self.fft_planner;
        self.fft
            .get_or_insert_with(|| FftResources::plan(planner, size))
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn plan(planner: &mut RealFftPlanner<f32>, size: usize) -> Self {
        let plan = planner.plan_fft_forward(size);
        Self {
            size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        }
    }
}

impl fmt::Debug for OutputMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputMeter")
            .field("sample_rate", &self.sample_rate)
            .field("summary", &self.summary)
            .field("latest", &self.latest)
            .field("fft_size", &self.fft.as_ref().map(|fft| fft.size))
            .finish()
    }
}

fn compute_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn silence_reads_as_zero() {
        let mut meter = OutputMeter::new(48_000);
        let reading = meter.measure(&vec![0.0; 1024]).unwrap();
        assert_eq!(reading.rms, 0.0);
        assert_eq!(reading.peak, 0.0);
        assert_eq!(reading.spectral_centroid, 0.0);
        assert!(reading.is_silent());
    }

    #[test]
    fn rejects_tiny_blocks() {
        let mut meter = OutputMeter::new(8_000);
        assert!(matches!(
            meter.measure(&[0.5]),
            Err(SimStageError::InvalidInput(_))
        ));
    }

    #[test]
    fn tone_levels_and_centroid() {
        let mut meter = OutputMeter::new(8_000);
        let reading = meter.measure(&tone(1_000.0, 8_000, 800, 0.5)).unwrap();
        assert!((reading.peak - 0.5).abs() < 0.01);
        assert!((reading.rms - 0.5 / 2f32.sqrt()).abs() < 0.01);
        // 1 kHz over a 4 kHz Nyquist.
        assert!((reading.spectral_centroid - 0.25).abs() < 0.05);
        assert!(!reading.is_silent());
    }

    #[test]
    fn summary_tracks_blocks_and_resets() {
        let mut meter = OutputMeter::new(100);
        meter.measure(&vec![0.0; 50]).unwrap();
        meter.measure(&vec![1.0; 25]).unwrap();

        let summary = meter.summary();
        assert_eq!(summary.blocks, 2);
        assert!((summary.duration_seconds - 0.75).abs() < 1e-6);
        assert_eq!(summary.max_peak, 1.0);
        assert!((summary.mean_rms - 0.5).abs() < 1e-6);
        assert!((meter.latest().unwrap().time - 0.625).abs() < 1e-6);

        meter.reset();
        assert_eq!(meter.summary().blocks, 0);
        assert!(meter.latest().is_none());
    }
}
