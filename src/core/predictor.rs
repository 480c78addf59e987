use std::io::{self, Read, Write};

use crate::prng::Prng;
use crate::storage;

/// Type alias for normalized prediction errors (range: 0.0 to 1.0).
pub type PredictionError = f64;

/// Contract a predictor must satisfy to occupy an expert slot.
///
/// The input sample is passed explicitly into every call; the structure
/// threads the sample it received for the current cycle through to the
/// predictors it touches.
///
/// `predict` is a pure read: calling it twice with the same input and no
/// intervening mutation must return the same error. Errors are normalized
/// to the closed range [0, 1]; a predictor returning a value outside that
/// range (or NaN) is a bug in the predictor, not a runtime condition the
/// structure recovers from.
pub trait Predictor {
    /// Recompute the prediction error against `input`.
    fn predict(&self, input: &[f64]) -> PredictionError;

    /// One learning step on `input`. May change the error a subsequent
    /// `predict` returns.
    fn adapt(&mut self, input: &[f64]);

    /// Reset internal parameters to small random values.
    fn initialize_randomized(&mut self, rng: &mut Prng);

    /// Reset internal parameters to reproduce `input` exactly, so the
    /// error against `input` becomes minimal.
    fn initialize_from_input(&mut self, input: &[f64]);

    /// Deep-copy another predictor's learned parameters into this one.
    fn copy_from(&mut self, other: &Self);
}

/// Opaque per-slot side data (e.g. Q-value tables) that is cloned
/// alongside predictors when a slot is grown. The structure never
/// interprets it.
pub trait Payload {
    /// Copy the data block at `from` onto `to`.
    fn copy_slot(&mut self, to: usize, from: usize);
}

/// No payload.
impl Payload for () {
    fn copy_slot(&mut self, _to: usize, _from: usize) {}
}

/// One clonable data block per slot.
impl<T: Clone> Payload for Vec<T> {
    fn copy_slot(&mut self, to: usize, from: usize) {
        assert!(to != from, "payload slot cloned onto itself");
        let block = self[from].clone();
        self[to] = block;
    }
}

/// Checkpointable predictor: learned parameters as a deterministic byte
/// stream. Capacities and topology are never part of this; see
/// `Gmes::save_image_to`.
pub trait PersistPredictor: Predictor {
    fn write_params_to<W: Write>(&self, w: &mut W) -> io::Result<()>;
    fn read_params_from<R: Read>(&mut self, r: &mut R) -> io::Result<()>;
}

/// Checkpointable payload: one slot's data block as a deterministic byte
/// stream.
pub trait PersistPayload: Payload {
    fn write_slot_to<W: Write>(&self, slot: usize, w: &mut W) -> io::Result<()>;
    fn read_slot_from<R: Read>(&mut self, slot: usize, r: &mut R) -> io::Result<()>;
}

impl PersistPayload for () {
    fn write_slot_to<W: Write>(&self, _slot: usize, _w: &mut W) -> io::Result<()> {
        Ok(())
    }

    fn read_slot_from<R: Read>(&mut self, _slot: usize, _r: &mut R) -> io::Result<()> {
        Ok(())
    }
}

impl PersistPayload for Vec<Vec<f64>> {
    fn write_slot_to<W: Write>(&self, slot: usize, w: &mut W) -> io::Result<()> {
        let block = &self[slot];
        storage::write_u32_le(w, block.len() as u32)?;
        for v in block {
            storage::write_f64_le(w, *v)?;
        }
        Ok(())
    }

    fn read_slot_from<R: Read>(&mut self, slot: usize, r: &mut R) -> io::Result<()> {
        let n = storage::read_u32_le(r)? as usize;
        let mut block = Vec::with_capacity(n);
        for _ in 0..n {
            block.push(storage::read_f64_le(r)?);
        }
        self[slot] = block;
        Ok(())
    }
}

/// Minimal reference predictor over a 1-D input.
///
/// The error is the absolute distance between the first input component
/// and a single internal weight, clamped to [0, 1]. `adapt` moves the
/// weight toward the input by a fixed fraction of the residual, so every
/// adaptation step strictly shrinks the error while it is nonzero.
#[derive(Debug, Clone)]
pub struct ScalarPredictor {
    weight: f64,
    adapt_rate: f64,
}

impl ScalarPredictor {
    pub fn new(adapt_rate: f64) -> Self {
        Self {
            weight: 0.0,
            adapt_rate,
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

impl Predictor for ScalarPredictor {
    fn predict(&self, input: &[f64]) -> PredictionError {
        (input[0] - self.weight).abs().clamp(0.0, 1.0)
    }

    fn adapt(&mut self, input: &[f64]) {
        self.weight += self.adapt_rate * (input[0] - self.weight);
    }

    fn initialize_randomized(&mut self, rng: &mut Prng) {
        self.weight = rng.gen_range_f64(-0.1, 0.1);
    }

    fn initialize_from_input(&mut self, input: &[f64]) {
        self.weight = input[0];
    }

    fn copy_from(&mut self, other: &Self) {
        self.weight = other.weight;
    }
}

impl PersistPredictor for ScalarPredictor {
    fn write_params_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        storage::write_f64_le(w, self.weight)
    }

    fn read_params_from<R: Read>(&mut self, r: &mut R) -> io::Result<()> {
        self.weight = storage::read_f64_le(r)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_is_a_pure_read() {
        let p = ScalarPredictor::new(0.3);
        let input = [0.7];
        assert_eq!(p.predict(&input).to_bits(), p.predict(&input).to_bits());
    }

    #[test]
    fn adapt_shrinks_the_error() {
        let mut p = ScalarPredictor::new(0.3);
        let input = [0.6];
        let before = p.predict(&input);
        p.adapt(&input);
        let after = p.predict(&input);
        assert!(after < before, "adapt did not improve: {} -> {}", before, after);
    }

    #[test]
    fn initialize_from_input_zeroes_the_error() {
        let mut p = ScalarPredictor::new(0.3);
        let input = [0.42];
        p.initialize_from_input(&input);
        assert_eq!(p.predict(&input), 0.0);
    }

    #[test]
    fn initialize_randomized_keeps_weights_small() {
        let mut rng = Prng::new(11);
        let mut p = ScalarPredictor::new(0.3);
        for _ in 0..50 {
            p.initialize_randomized(&mut rng);
            assert!(p.weight().abs() < 0.1);
        }
    }

    #[test]
    fn copy_from_transfers_parameters() {
        let mut src = ScalarPredictor::new(0.3);
        src.initialize_from_input(&[0.9]);
        let mut dst = ScalarPredictor::new(0.3);
        dst.copy_from(&src);
        assert_eq!(dst.weight(), 0.9);
    }

    #[test]
    fn error_is_clamped_to_unit_range() {
        let mut p = ScalarPredictor::new(0.3);
        p.initialize_from_input(&[-3.0]);
        assert_eq!(p.predict(&[3.0]), 1.0);
    }

    #[test]
    fn vec_payload_clones_one_block() {
        let mut payload: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![0.0], vec![5.0]];
        payload.copy_slot(1, 0);
        assert_eq!(payload[1], vec![1.0, 2.0]);
        assert_eq!(payload[2], vec![5.0]);
    }

    #[test]
    fn scalar_params_round_trip() {
        let mut src = ScalarPredictor::new(0.3);
        src.initialize_from_input(&[0.123456789]);

        let mut bytes = Vec::new();
        src.write_params_to(&mut bytes).unwrap();

        let mut dst = ScalarPredictor::new(0.3);
        dst.read_params_from(&mut std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(dst.weight().to_bits(), src.weight().to_bits());
    }

    #[test]
    fn vec_payload_slot_round_trip() {
        let src: Vec<Vec<f64>> = vec![vec![0.5, -1.5, 2.25], vec![]];
        let mut bytes = Vec::new();
        src.write_slot_to(0, &mut bytes).unwrap();

        let mut dst: Vec<Vec<f64>> = vec![vec![], vec![]];
        dst.read_slot_from(0, &mut std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(dst[0], src[0]);
    }
}
