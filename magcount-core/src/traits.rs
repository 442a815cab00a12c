//! Pipeline seams
//!
//! The polling loop only talks to the outside world through these traits.
//! Keep them small: hardware sits behind one, the broker behind the other.

use crate::sample::Sample;

/// Something that produces magnetometer samples
///
/// Implemented by [`crate::sensor::SampleReader`]; tests substitute scripted
/// sources.
pub trait SampleSource {
    /// Error type for failed reads (always fatal to the polling loop)
    type Error;

    /// Block until the next sample is available and return it
    fn read_sample(&mut self) -> Result<Sample, Self::Error>;
}

/// Destination for counter reports
///
/// Reports are fire-and-forget: an implementation that cannot deliver logs
/// the failure and returns. The counter already holds the authoritative
/// total, so the next successful report carries the correct value.
pub trait Reporter {
    /// Report the current counter value
    fn report_value(&mut self, value: f64);

    /// Report one raw sample (diagnostic firehose)
    fn report_sample(&mut self, _sample: &Sample) {}

    /// Give the transport up to `grace_ms` to come up before the first report
    ///
    /// Returns whether the transport is ready.
    fn await_ready(&mut self, _grace_ms: u32) -> bool {
        true
    }
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    type Error = S::Error;

    fn read_sample(&mut self) -> Result<Sample, Self::Error> {
        (**self).read_sample()
    }
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report_value(&mut self, value: f64) {
        (**self).report_value(value)
    }

    fn report_sample(&mut self, sample: &Sample) {
        (**self).report_sample(sample)
    }

    fn await_ready(&mut self, grace_ms: u32) -> bool {
        (**self).await_ready(grace_ms)
    }
}
