use anyhow::{anyhow, Result};
#[cfg(feature = "high-quality-audio")]
use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};
use std::cmp::Ordering as CmpOrdering;
use std::f32::consts::PI;
#[cfg(feature = "high-quality-audio")]
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) const MIN_RATE: u32 = 2_000;
pub(crate) const MAX_RATE: u32 = 1_600_000;
pub(crate) const MIN_RATIO: f64 = 0.01;
pub(crate) const MAX_RATIO: f64 = 8.0;
const MAX_FIR_TAPS: usize = 129;

#[cfg(feature = "high-quality-audio")]
static RUBATO_WARNING_SHOWN: AtomicBool = AtomicBool::new(false);

fn ratio_for(from_rate: u32, to_rate: u32) -> Result<f64> {
    if !(MIN_RATE..=MAX_RATE).contains(&from_rate) || !(MIN_RATE..=MAX_RATE).contains(&to_rate) {
        return Err(anyhow!(
            "unsupported sample rate pair {from_rate}Hz -> {to_rate}Hz"
        ));
    }
    let ratio = f64::from(to_rate) / f64::from(from_rate);
    if !(MIN_RATIO..=MAX_RATIO).contains(&ratio) {
        return Err(anyhow!("resample ratio {ratio} out of range"));
    }
    Ok(ratio)
}

/// Convert mono samples between rates. Sinc (rubato) when the feature is on,
/// FIR + linear otherwise or when rubato refuses the input. Out-of-range rate
/// pairs are returned unchanged.
pub(crate) fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }

    #[cfg(feature = "high-quality-audio")]
    {
        match resample_with_rubato(input, from_rate, to_rate) {
            Ok(output) => output,
            Err(err) => {
                if !RUBATO_WARNING_SHOWN.swap(true, Ordering::AcqRel) {
                    tracing::warn!(error = %err, "sinc resampler failed; using linear path");
                }
                basic_resample(input, from_rate, to_rate)
            }
        }
    }

    #[cfg(not(feature = "high-quality-audio"))]
    {
        basic_resample(input, from_rate, to_rate)
    }
}

#[cfg(feature = "high-quality-audio")]
pub(crate) fn resample_with_rubato(
    input: &[f32],
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>> {
    if input.is_empty() || from_rate == to_rate {
        return Ok(input.to_vec());
    }
    let ratio = ratio_for(from_rate, to_rate)?;

    let chunk = 256usize;
    let params = InterpolationParameters {
        sinc_len: 64,
        f_cutoff: 0.90,
        interpolation: InterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut rs = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk, 1)
        .map_err(|e| anyhow!("failed to construct sinc resampler: {e:?}"))?;

    let expect = (((input.len() as f64) * ratio).round() as usize).max(1);
    let mut out = Vec::with_capacity(expect + chunk);
    let mut seg = vec![0.0f32; chunk];
    for block in input.chunks(chunk) {
        let pad = block.last().copied().unwrap_or(0.0);
        seg.fill(pad);
        seg[..block.len()].copy_from_slice(block);
        let produced = rs
            .process(std::slice::from_ref(&seg), None)
            .map_err(|e| anyhow!("resampler process failed: {e:?}"))?;
        if let Some(channel) = produced.first() {
            out.extend_from_slice(channel);
        }
    }
    Ok(adjust_frame_length(out, expect))
}

pub(crate) fn basic_resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == to_rate {
        return input.to_vec();
    }
    let Ok(ratio) = ratio_for(from_rate, to_rate) else {
        return input.to_vec();
    };
    let filtered = if from_rate > to_rate {
        // Decimating: low-pass first so content above the new Nyquist does not alias.
        let taps = fir_tap_count(from_rate, to_rate);
        low_pass_fir(input, from_rate, to_rate, taps)
    } else {
        input.to_vec()
    };
    resample_linear(&filtered, ratio as f32)
}

pub(crate) fn resample_linear(input: &[f32], ratio: f32) -> Vec<f32> {
    let input_len = input.len();
    let output_len = (input_len as f32 * ratio).round() as usize;
    let pad = input.last().copied().unwrap_or(0.0);
    (0..output_len)
        .map(|i| {
            let src = i as f32 / ratio;
            let idx = src.floor() as usize;
            let frac = src - idx as f32;
            if idx + 1 < input_len {
                input[idx] * (1.0 - frac) + input[idx + 1] * frac
            } else {
                pad
            }
        })
        .collect()
}

/// Odd tap count that grows with the decimation ratio.
pub(crate) fn fir_tap_count(from_rate: u32, to_rate: u32) -> usize {
    let decimation = from_rate as f32 / to_rate.max(1) as f32;
    let mut taps = (decimation * 4.0).ceil().max(11.0) as usize;
    if taps % 2 == 0 {
        taps += 1;
    }
    taps.min(MAX_FIR_TAPS)
}

pub(crate) fn low_pass_fir(input: &[f32], from_rate: u32, to_rate: u32, taps: usize) -> Vec<f32> {
    if input.is_empty() || taps <= 1 {
        return input.to_vec();
    }
    let cutoff = (to_rate as f32 * 0.5 / from_rate as f32).min(0.499);
    let coeffs = design_low_pass(cutoff, taps);
    let half = taps / 2;
    (0..input.len())
        .map(|n| {
            coeffs
                .iter()
                .enumerate()
                .filter_map(|(k, coeff)| {
                    let idx = (n + k).checked_sub(half)?;
                    input.get(idx).map(|sample| sample * coeff)
                })
                .sum()
        })
        .collect()
}

/// Normalized Hamming-windowed sinc taps.
pub(crate) fn design_low_pass(normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let m = (taps.max(1) - 1) as f32;
    let mut coeffs: Vec<f32> = (0..taps)
        .map(|n| {
            let centered = n as f32 - m / 2.0;
            let x = 2.0 * PI * normalized_cutoff * centered;
            let sinc = if centered == 0.0 {
                2.0 * normalized_cutoff
            } else {
                (2.0 * normalized_cutoff * x.sin()) / x
            };
            let window = if taps <= 1 {
                1.0
            } else {
                0.54 - 0.46 * ((2.0 * PI * n as f32) / m).cos()
            };
            sinc * window
        })
        .collect();
    let sum: f32 = coeffs.iter().sum();
    if sum != 0.0 {
        coeffs.iter_mut().for_each(|c| *c /= sum);
    }
    coeffs
}

/// Pad (repeating the last sample) or truncate to exactly `desired` samples.
pub(crate) fn adjust_frame_length(mut data: Vec<f32>, desired: usize) -> Vec<f32> {
    match data.len().cmp(&desired) {
        CmpOrdering::Greater => data.truncate(desired),
        CmpOrdering::Less => {
            let pad = data.last().copied().unwrap_or(0.0);
            data.resize(desired, pad);
        }
        CmpOrdering::Equal => {}
    }
    data
}

/// Resample one device frame to the target rate and force the exact length
/// the voice gate expects.
pub(crate) fn convert_frame(
    frame: Vec<f32>,
    device_rate: u32,
    target_rate: u32,
    desired_len: usize,
) -> Vec<f32> {
    if device_rate == target_rate {
        return adjust_frame_length(frame, desired_len);
    }
    adjust_frame_length(
        basic_resample(&frame, device_rate, target_rate),
        desired_len,
    )
}
