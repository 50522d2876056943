//! Current measurement over wall-clock windows
//!
//! The profiler streams samples continuously; a measurement is defined as
//! everything that arrives within some window of time. [`measure_window`]
//! runs such a window against a [`SampleSource`] and reduces the result to
//! its arithmetic mean. [`ToleranceBand`] is the acceptance check that the
//! tests apply to that mean.


use std::{
    thread,
    time::{
        Duration,
        Instant,
    },
};


/// The default fractional threshold of a tolerance band
pub const DEFAULT_THRESHOLD: f64 = 0.05;


/// A source of current samples
///
/// Implemented by the power profiler. The measurement logic only talks to
/// this trait, so it can be exercised against a scripted source.
pub trait SampleSource {
    type Error;

    /// Start the sample stream
    fn start_sampling(&mut self) -> Result<(), Self::Error>;

    /// Return the samples that arrived since the last poll, in microamps
    ///
    /// An empty batch is not an error; it means no samples were waiting.
    fn take_samples(&mut self) -> Result<Vec<f64>, Self::Error>;

    /// Stop the sample stream
    fn stop_sampling(&mut self) -> Result<(), Self::Error>;
}


/// A monotonic time source
///
/// Exists so the window logic can be tested without waiting out real time.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&mut self, duration: Duration);
}


/// The clock used outside of tests
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}


/// The samples accumulated over one measurement window
#[derive(Debug)]
pub struct Measurement {
    samples: Vec<f64>,
}

impl Measurement {
    /// The arithmetic mean of all samples, in microamps
    pub fn mean_ua(&self) -> f64 {
        // `measure_window` never constructs an empty measurement.
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// All samples, in microamps, in arrival order
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
}


/// Measure the current drawn over one wall-clock window
///
/// Starts the sample stream, polls it every `poll_interval` until `duration`
/// has elapsed, then stops the stream. Never returns before the window has
/// elapsed. Fails with [`MeasureError::NoSamples`] if the source delivered
/// nothing at all, which on the real hardware means the profiler isn't
/// actually sampling.
pub fn measure_window<S, C>(
    source:        &mut S,
    clock:         &mut C,
    duration:      Duration,
    poll_interval: Duration,
)
    -> Result<Measurement, MeasureError<S::Error>>
    where
        S: SampleSource,
        C: Clock,
{
    let start = clock.now();

    source.start_sampling()
        .map_err(|err| MeasureError::Source(err))?;

    let mut samples = Vec::new();

    while clock.now().duration_since(start) < duration {
        let batch = source.take_samples()
            .map_err(|err| MeasureError::Source(err))?;
        samples.extend(batch);

        clock.sleep(poll_interval);
    }

    source.stop_sampling()
        .map_err(|err| MeasureError::Source(err))?;

    if samples.is_empty() {
        return Err(MeasureError::NoSamples);
    }

    Ok(
        Measurement {
            samples,
        }
    )
}


/// An inclusive acceptance interval around an expected current
///
/// Spans `expected - expected * threshold` to `expected + expected *
/// threshold`, both ends included.
#[derive(Clone, Copy, Debug)]
pub struct ToleranceBand {
    expected_ua: f64,
    threshold:   f64,
}

impl ToleranceBand {
    /// Create a band around `expected_ua` with the given threshold
    pub fn new(expected_ua: f64, threshold: f64) -> Self {
        Self {
            expected_ua,
            threshold,
        }
    }

    /// Create a band around `expected_ua` with the default threshold
    pub fn with_default_threshold(expected_ua: f64) -> Self {
        Self::new(expected_ua, DEFAULT_THRESHOLD)
    }

    /// The lower end of the band, in microamps
    pub fn lower_ua(&self) -> f64 {
        self.expected_ua - self.expected_ua * self.threshold
    }

    /// The upper end of the band, in microamps
    pub fn upper_ua(&self) -> f64 {
        self.expected_ua + self.expected_ua * self.threshold
    }

    /// Whether a measured current lies within the band
    pub fn contains(&self, measured_ua: f64) -> bool {
        self.lower_ua() <= measured_ua && measured_ua <= self.upper_ua()
    }
}


/// Error measuring the current over a window
#[derive(Debug)]
pub enum MeasureError<E> {
    /// The sample source failed
    Source(E),

    /// The window elapsed without the source delivering a single sample
    ///
    /// Distinct from measuring a current of zero.
    NoSamples,
}
