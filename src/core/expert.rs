use crate::predictor::{Payload, PredictionError, Predictor};
use crate::prng::Prng;

/// Type alias for the conserved per-expert learning-capacity resource.
pub type Capacity = f64;

/// Type alias for expert activations (range: 0.0 to 1.0).
pub type Activation = f64;

/// Type alias for directed topology-edge strengths between expert slots.
pub type TransitionWeight = f64;

/// One arena slot: an adaptive predictor plus its bookkeeping.
///
/// A slot starts non-existing and becomes an expert either at
/// construction (`create_randomized`) or when another expert is cloned
/// onto it. Existence never reverts; slots are recycled by overwriting,
/// never destroyed.
#[derive(Debug, Clone)]
pub struct Expert<P> {
    exists: bool,
    learning_capacity: Capacity,
    perceptive_width: f64,
    transition: Vec<TransitionWeight>,
    last_error: PredictionError,
    predictor: P,
}

impl<P: Predictor> Expert<P> {
    fn new(predictor: P, slot_count: usize, initial_capacity: Capacity, perceptive_width: f64) -> Self {
        Self {
            exists: false,
            learning_capacity: initial_capacity,
            perceptive_width,
            transition: vec![0.0; slot_count],
            last_error: 0.0,
            predictor,
        }
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn learning_capacity(&self) -> Capacity {
        self.learning_capacity
    }

    /// The error from this expert's most recent `predict`.
    pub fn last_error(&self) -> PredictionError {
        self.last_error
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    pub(crate) fn predictor_mut(&mut self) -> &mut P {
        &mut self.predictor
    }

    /// Re-evaluate the predictor against `input`, caching the error.
    pub fn predict(&mut self, input: &[f64]) -> PredictionError {
        let err = self.predictor.predict(input);
        self.last_error = err;
        err
    }

    /// One learning step on `input`.
    pub fn adapt(&mut self, input: &[f64]) {
        self.predictor.adapt(input);
    }

    /// Activation from the cached prediction error: 0 for a non-existing
    /// slot, otherwise `exp(-err^2 / perceptive_width)`.
    pub fn update_and_get_activation(&self) -> Activation {
        if !self.exists {
            return 0.0;
        }
        (-(self.last_error * self.last_error) / self.perceptive_width).exp()
    }

    pub fn learning_capacity_is_exhausted(&self, threshold: Capacity) -> bool {
        self.learning_capacity < threshold
    }

    /// Bring the slot to life with freshly randomized parameters.
    pub fn create_randomized(&mut self, rng: &mut Prng) {
        self.exists = true;
        self.predictor.initialize_randomized(rng);
        self.last_error = 0.0;
    }

    /// Zero this expert's outgoing transition vector.
    pub fn clear_transitions(&mut self) {
        self.transition.fill(0.0);
    }

    /// A transition counts as validated above the configured threshold.
    pub fn exists_transition(&self, to: usize, threshold: TransitionWeight) -> bool {
        self.transition[to] > threshold
    }

    /// Mark the edge to slot `to` as freshly validated.
    pub fn reset_transition(&mut self, to: usize, value: TransitionWeight) {
        self.transition[to] = value;
    }

    pub fn transition(&self, to: usize) -> TransitionWeight {
        self.transition[to]
    }

    pub(crate) fn scale_transition(&mut self, to: usize, factor: f64) {
        self.transition[to] *= factor;
    }

    pub(crate) fn zero_transition(&mut self, to: usize) {
        self.transition[to] = 0.0;
    }

    pub(crate) fn add_capacity(&mut self, delta: Capacity) {
        self.learning_capacity += delta;
    }

    pub(crate) fn set_learning_capacity(&mut self, capacity: Capacity) {
        self.learning_capacity = capacity;
    }

    pub(crate) fn set_exists(&mut self, exists: bool) {
        self.exists = exists;
    }

    pub(crate) fn set_last_error(&mut self, err: PredictionError) {
        self.last_error = err;
    }
}

/// Fixed-size arena of expert slots plus the opaque per-slot payload.
///
/// Slots are addressed by index only, never by reference, so cloning slot
/// `from` onto slot `to` is a plain value copy with no aliasing hazard.
/// The slot count is fixed at construction and never changes.
#[derive(Debug)]
pub struct ExpertVec<P, Y> {
    slots: Vec<Expert<P>>,
    payload: Y,
}

impl<P: Predictor, Y: Payload> ExpertVec<P, Y> {
    pub fn new(
        predictors: Vec<P>,
        payload: Y,
        initial_capacity: Capacity,
        perceptive_width: f64,
    ) -> Self {
        let slot_count = predictors.len();
        let slots = predictors
            .into_iter()
            .map(|p| Expert::new(p, slot_count, initial_capacity, perceptive_width))
            .collect();
        Self { slots, payload }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: usize) -> &Expert<P> {
        &self.slots[slot]
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> &mut Expert<P> {
        &mut self.slots[slot]
    }

    pub fn payload(&self) -> &Y {
        &self.payload
    }

    pub(crate) fn payload_mut(&mut self) -> &mut Y {
        &mut self.payload
    }

    /// Clone slot `from` onto slot `to`, payload included.
    ///
    /// With one-shot learning the target predictor is reinitialized
    /// directly from the current input (fast snap, discarding `from`'s
    /// learned parameters); otherwise `from`'s parameters are deep-copied.
    /// Either way the target slot exists afterwards and its cached error
    /// is re-evaluated against the current input.
    pub fn copy(&mut self, to: usize, from: usize, one_shot_learning: bool, input: &[f64]) {
        assert!(to != from, "expert slot cloned onto itself");

        let (src, dst) = pair_mut(&mut self.slots, from, to);
        dst.exists = true;
        if one_shot_learning {
            dst.predictor.initialize_from_input(input);
        } else {
            dst.predictor.copy_from(&src.predictor);
        }
        dst.last_error = dst.predictor.predict(input);

        self.payload.copy_slot(to, from);
    }
}

/// Split-borrow helper: a shared view of `read` and a mutable view of
/// `write` out of the same slice. The indices must differ.
fn pair_mut<T>(slice: &mut [T], read: usize, write: usize) -> (&T, &mut T) {
    assert!(read != write);
    if read < write {
        let (lo, hi) = slice.split_at_mut(write);
        (&lo[read], &mut hi[0])
    } else {
        let (lo, hi) = slice.split_at_mut(read);
        (&hi[0], &mut lo[write])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::ScalarPredictor;

    fn make_arena(slot_count: usize) -> ExpertVec<ScalarPredictor, ()> {
        let predictors = (0..slot_count).map(|_| ScalarPredictor::new(0.3)).collect();
        ExpertVec::new(predictors, (), 1.0, 0.05)
    }

    #[test]
    fn nonexisting_slot_has_zero_activation() {
        let arena = make_arena(3);
        assert_eq!(arena.get(0).update_and_get_activation(), 0.0);
    }

    #[test]
    fn existing_expert_activation_is_in_unit_range() {
        let mut arena = make_arena(3);
        let mut rng = Prng::new(5);
        arena.get_mut(0).create_randomized(&mut rng);

        arena.get_mut(0).predict(&[0.4]);
        let act = arena.get(0).update_and_get_activation();
        assert!(act > 0.0 && act <= 1.0, "activation out of range: {}", act);

        // Perfect prediction saturates the activation.
        arena.get_mut(0).predictor_mut().initialize_from_input(&[0.4]);
        arena.get_mut(0).predict(&[0.4]);
        assert_eq!(arena.get(0).update_and_get_activation(), 1.0);
    }

    #[test]
    fn exhaustion_compares_against_threshold() {
        let mut arena = make_arena(2);
        assert!(!arena.get(0).learning_capacity_is_exhausted(0.5));
        arena.get_mut(0).set_learning_capacity(0.49);
        assert!(arena.get(0).learning_capacity_is_exhausted(0.5));
    }

    #[test]
    fn deep_copy_clone_transfers_learned_parameters() {
        let mut arena = make_arena(3);
        let mut rng = Prng::new(5);
        arena.get_mut(0).create_randomized(&mut rng);
        arena.get_mut(0).predictor_mut().initialize_from_input(&[0.8]);

        arena.copy(2, 0, false, &[0.3]);
        assert!(arena.get(2).exists());
        assert_eq!(arena.get(2).predictor().weight(), 0.8);
        // Cached error re-evaluated against the current input.
        assert!((arena.get(2).last_error() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn one_shot_clone_snaps_to_the_input() {
        let mut arena = make_arena(3);
        let mut rng = Prng::new(5);
        arena.get_mut(0).create_randomized(&mut rng);
        arena.get_mut(0).predictor_mut().initialize_from_input(&[0.8]);

        arena.copy(1, 0, true, &[0.3]);
        assert_eq!(arena.get(1).predictor().weight(), 0.3);
        assert_eq!(arena.get(1).last_error(), 0.0);
        // Source keeps its own parameters.
        assert_eq!(arena.get(0).predictor().weight(), 0.8);
    }

    #[test]
    fn clone_copies_the_payload_block() {
        let predictors = (0..3).map(|_| ScalarPredictor::new(0.3)).collect();
        let payload: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![], vec![9.0]];
        let mut arena = ExpertVec::new(predictors, payload, 1.0, 0.05);
        let mut rng = Prng::new(5);
        arena.get_mut(0).create_randomized(&mut rng);

        arena.copy(1, 0, true, &[0.5]);
        assert_eq!(arena.payload()[1], vec![1.0, 2.0]);
        assert_eq!(arena.payload()[2], vec![9.0]);
    }

    #[test]
    fn clone_works_in_both_index_orders() {
        let mut arena = make_arena(4);
        let mut rng = Prng::new(5);
        arena.get_mut(0).create_randomized(&mut rng);
        arena.get_mut(3).create_randomized(&mut rng);
        arena.get_mut(3).predictor_mut().initialize_from_input(&[0.6]);

        // from < to and from > to both take the split-borrow path.
        arena.copy(2, 0, false, &[0.1]);
        arena.copy(1, 3, false, &[0.1]);
        assert_eq!(arena.get(1).predictor().weight(), 0.6);
    }

    #[test]
    #[should_panic(expected = "cloned onto itself")]
    fn clone_onto_itself_is_a_programmer_error() {
        let mut arena = make_arena(2);
        arena.copy(1, 1, true, &[0.0]);
    }

    #[test]
    fn transition_bookkeeping() {
        let mut arena = make_arena(3);
        let e = arena.get_mut(0);
        assert!(!e.exists_transition(1, 0.5));

        e.reset_transition(1, 1.0);
        assert!(e.exists_transition(1, 0.5));
        assert_eq!(e.transition(1), 1.0);

        e.scale_transition(1, 0.4);
        assert!((e.transition(1) - 0.4).abs() < 1e-12);
        assert!(!e.exists_transition(1, 0.5));

        e.reset_transition(2, 1.0);
        e.clear_transitions();
        assert_eq!(e.transition(1), 0.0);
        assert_eq!(e.transition(2), 0.0);
    }
}
