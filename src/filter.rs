//! Analog reconstruction filter
//!
//! Two biquad low-pass sections in series bring the model's ~1 MHz raw
//! output down to the audible band. Coefficients are fixed when the cascade
//! is built and never recomputed while running.
//!
//! Sign convention: feedback coefficients are stored pre-negated, so every
//! section computes
//!
//! ```text
//! y0 = b0*x0 + b1*x1 + b2*x2 + a1*y1 + a2*y2
//! ```

/// Default section 0 (1 MHz rate, 22.05 kHz cutoff)
pub const SECTION0: BiquadCoefficients = BiquadCoefficients {
    b0: 0.004949567490326946,
    b1: 0.009899134980653892,
    b2: 0.004949567490326946,
    a1: 1.75670035983922,
    a2: -0.7736957551969215,
};

/// Default section 1 (1 MHz rate, 22.05 kHz cutoff)
pub const SECTION1: BiquadCoefficients = BiquadCoefficients {
    b0: 0.00390625,
    b1: 0.0078125,
    b2: 0.00390625,
    a1: 1.8814055219615045,
    a2: -0.8996073914464207,
};

/// Fixed coefficients of one second-order section
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    /// Feed-forward, current input
    pub b0: f64,
    /// Feed-forward, input delayed by one
    pub b1: f64,
    /// Feed-forward, input delayed by two
    pub b2: f64,
    /// Feedback, output delayed by one (pre-negated)
    pub a1: f64,
    /// Feedback, output delayed by two (pre-negated)
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Design an RBJ cookbook low-pass section
    ///
    /// Meant for building alternative cascades ahead of time. The returned
    /// feedback terms follow this module's pre-negated convention.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Rate the section will run at (Hz)
    /// * `cutoff` - -3 dB corner (Hz), must be below Nyquist
    /// * `q` - Quality factor (0.7071 for Butterworth)
    pub fn lowpass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let w0 = 2.0 * std::f64::consts::PI * cutoff / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;

        let b1 = (1.0 - cos_w0) / a0;
        Self {
            b0: b1 / 2.0,
            b1,
            b2: b1 / 2.0,
            a1: 2.0 * cos_w0 / a0,
            a2: -(1.0 - alpha) / a0,
        }
    }

    /// Gain at DC
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 - self.a1 - self.a2)
    }
}

/// One second-order IIR section with its delay line
#[derive(Clone, Debug)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Biquad {
    /// Create a section with zeroed state
    pub fn new(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Filter one sample and shift the delay line
    #[inline]
    pub fn process(&mut self, x0: f64) -> f64 {
        let c = &self.coeffs;
        let mut acc = self.x2 * c.b2;
        acc += self.x1 * c.b1;
        acc += x0 * c.b0;
        acc += self.y2 * c.a2;
        acc += self.y1 * c.a1;

        self.x2 = self.x1;
        self.x1 = x0;
        self.y2 = self.y1;
        self.y1 = acc;

        acc
    }

    /// Zero the delay line
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Section coefficients
    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coeffs
    }
}

/// Two sections in series, one output sample per input sample
#[derive(Clone, Debug)]
pub struct FilterCascade {
    sections: [Biquad; 2],
}

impl FilterCascade {
    /// Cascade with the default 22.05 kHz reconstruction response
    pub fn new() -> Self {
        Self::with_sections(SECTION0, SECTION1)
    }

    /// Cascade with custom fixed sections
    pub fn with_sections(first: BiquadCoefficients, second: BiquadCoefficients) -> Self {
        Self {
            sections: [Biquad::new(first), Biquad::new(second)],
        }
    }

    /// Filter one raw sample
    #[inline]
    pub fn process(&mut self, raw: f64) -> f64 {
        let [first, second] = &mut self.sections;
        second.process(first.process(raw))
    }

    /// Zero both delay lines
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// The two sections, in signal order
    pub fn sections(&self) -> &[Biquad; 2] {
        &self.sections
    }
}

impl Default for FilterCascade {
    fn default() -> Self {
        Self::new()
    }
}
