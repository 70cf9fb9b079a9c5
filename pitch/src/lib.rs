#![warn(nonstandard_style, rust_2018_idioms, future_incompatible)]
pub trait Scale {
    fn to_frequency(&self, note_number: f64) -> f64;
}

pub struct EqualTemperament {
    freq_for_note_69: f64,
}

impl Scale for EqualTemperament {
    fn to_frequency(&self, note_number: f64) -> f64 {
        let offset = note_number - 69.;
        self.freq_for_note_69 * pitch_factor_from_semitones(offset)
    }
}

impl Default for EqualTemperament {
    fn default() -> EqualTemperament {
        EqualTemperament {
            freq_for_note_69: 440.,
        }
    }
}

impl EqualTemperament {
    pub fn new(concert_a: f64) -> EqualTemperament {
        EqualTemperament {
            freq_for_note_69: concert_a,
        }
    }
}

/// Frequency ratio for an offset in (possibly fractional) semitones.
pub fn pitch_factor_from_semitones(semitones: f64) -> f64 {
    (semitones / 12.).exp2()
}

/// Anything at or below this level is treated as silence.
pub const MINUS_INFINITY_DB: f32 = -100.;

pub fn decibels_to_gain(decibels: f32) -> f32 {
    if decibels > MINUS_INFINITY_DB {
        10f32.powf(decibels * 0.05)
    } else {
        0.
    }
}

pub fn gain_to_decibels(gain: f32) -> f32 {
    if gain > 0. {
        (20. * gain.log10()).max(MINUS_INFINITY_DB)
    } else {
        MINUS_INFINITY_DB
    }
}
