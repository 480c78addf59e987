use std::io::{self, Cursor, Read, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::expert::{Activation, Capacity, Expert, ExpertVec};
use crate::predictor::{Payload, PersistPayload, PersistPredictor, PredictionError, Predictor};
use crate::prng::Prng;
use crate::storage;

/// Configuration for a growing multi-expert structure.
///
/// Every field is validated at construction; no cycle executes on an
/// invalid configuration.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GmesConfig {
    /// Fixed slot count of the arena (Nmax). Growth saturates here.
    pub max_experts: usize,

    /// Experts created randomized at construction, occupying the first
    /// slots. They exist forever.
    pub initial_experts: usize,

    /// Scales how strongly learning progress depletes the winner's
    /// capacity. Range (0, 1].
    pub learning_rate: f64,

    /// Learning capacity every slot starts with. The sum over all slots
    /// is conserved at `max_experts * initial_capacity`.
    pub initial_capacity: Capacity,

    /// A winner whose capacity falls below this triggers growth.
    pub capacity_threshold: Capacity,

    /// Controls how sharply activation falls off as prediction error
    /// grows. Constant per structure.
    pub perceptive_width: f64,

    /// A transition edge above this strength counts as validated.
    pub transition_threshold: f64,

    /// Strength assigned to a freshly validated transition edge.
    pub transition_reset_value: f64,

    /// Growth mode: reinitialize the new expert directly from the current
    /// input instead of copying the source expert's learned parameters.
    pub one_shot_learning: bool,

    /// Tolerated drift of the capacity sum before a warning is recorded.
    pub conservation_tolerance: f64,

    /// If true, fold detected capacity drift back into the winner after
    /// reporting it. Default false: drift stays strictly diagnostic.
    pub correct_capacity_drift: bool,

    /// If set, makes the recipient draw (and randomized initialization)
    /// reproducible.
    pub seed: Option<u64>,
}

impl Default for GmesConfig {
    fn default() -> Self {
        Self {
            max_experts: 16,
            initial_experts: 1,
            learning_rate: 0.9,
            initial_capacity: 1.0,
            capacity_threshold: 0.1,
            perceptive_width: 0.05,
            transition_threshold: 0.5,
            transition_reset_value: 1.0,
            one_shot_learning: true,
            conservation_tolerance: 1e-9,
            correct_capacity_drift: false,
            seed: None,
        }
    }
}

impl GmesConfig {
    pub fn with_size(max_experts: usize, initial_experts: usize) -> Self {
        Self {
            max_experts,
            initial_experts,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    pub fn with_capacity(mut self, initial: Capacity, threshold: Capacity) -> Self {
        self.initial_capacity = initial;
        self.capacity_threshold = threshold;
        self
    }

    pub fn with_perceptive_width(mut self, width: f64) -> Self {
        self.perceptive_width = width;
        self
    }

    pub fn with_one_shot_learning(mut self, enabled: bool) -> Self {
        self.one_shot_learning = enabled;
        self
    }

    pub fn with_drift_correction(mut self, enabled: bool) -> Self {
        self.correct_capacity_drift = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_experts == 0 {
            return Err("max_experts must be >= 1");
        }
        if self.initial_experts == 0 || self.initial_experts > self.max_experts {
            return Err("initial_experts must be in [1, max_experts]");
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 || self.learning_rate > 1.0 {
            return Err("learning_rate must be in (0, 1]");
        }
        if !self.initial_capacity.is_finite() || self.initial_capacity <= 0.0 {
            return Err("initial_capacity must be finite and > 0");
        }
        if !self.capacity_threshold.is_finite()
            || self.capacity_threshold <= 0.0
            || self.capacity_threshold >= self.initial_capacity
        {
            return Err("capacity_threshold must be in (0, initial_capacity)");
        }
        if !self.perceptive_width.is_finite() || self.perceptive_width <= 0.0 {
            return Err("perceptive_width must be finite and > 0");
        }
        if !self.transition_threshold.is_finite() || self.transition_threshold < 0.0 {
            return Err("transition_threshold must be finite and >= 0");
        }
        if !self.transition_reset_value.is_finite()
            || self.transition_reset_value <= self.transition_threshold
        {
            return Err("transition_reset_value must exceed transition_threshold");
        }
        if !self.conservation_tolerance.is_finite() || self.conservation_tolerance <= 0.0 {
            return Err("conservation_tolerance must be finite and > 0");
        }
        Ok(())
    }
}

/// On-demand snapshot of per-cycle orchestrator state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    pub cycles: u64,
    pub number_of_experts: usize,
    pub winner: usize,
    pub last_winner: usize,
    pub to_insert: usize,
    pub recipient: usize,
    pub new_node: bool,
    pub state_changed: bool,
    pub learning_progress: f64,
    pub min_prediction_error: PredictionError,
    pub capacity_sum: f64,
    pub capacity_drift: f64,
    pub growth_events: u64,
    pub capacity_warnings: u64,
    pub progress_warnings: u64,
}

/// Growing multi-expert structure.
///
/// An online competitive learner over a fixed arena of `max_experts`
/// predictor slots. Each cycle it picks the existing expert with the
/// smallest prediction error, grows a new expert when the winner's
/// conserved learning capacity is exhausted, adapts the winner, shifts
/// capacity toward a random recipient in proportion to learning progress,
/// and maintains a decaying transition topology between slots.
///
/// The per-expert activation vector doubles as a state representation for
/// downstream consumers.
#[derive(Debug)]
pub struct Gmes<P, Y> {
    cfg: GmesConfig,
    experts: ExpertVec<P, Y>,
    rng: Prng,

    number_of_experts: usize,
    winner: usize,
    last_winner: usize,
    recipient: usize,
    to_insert: usize,
    new_node: bool,
    learning_progress: f64,
    min_prediction_error: PredictionError,
    activations: Vec<Activation>,

    cycles: u64,
    growth_events: u64,
    capacity_warnings: u64,
    progress_warnings: u64,
    last_capacity_warning: String,
}

impl<P: Predictor, Y: Payload> Gmes<P, Y> {
    /// Build a structure over `predictors.len()` slots. The predictor
    /// count must equal `cfg.max_experts`; the first
    /// `cfg.initial_experts` slots come to life with randomized
    /// parameters.
    pub fn new(cfg: GmesConfig, predictors: Vec<P>, payload: Y) -> Result<Self, &'static str> {
        cfg.validate()?;
        if predictors.len() != cfg.max_experts {
            return Err("predictor count must equal max_experts");
        }

        let mut rng = Prng::new(cfg.seed.unwrap_or(1));
        let mut experts = ExpertVec::new(
            predictors,
            payload,
            cfg.initial_capacity,
            cfg.perceptive_width,
        );
        for slot in 0..cfg.initial_experts {
            experts.get_mut(slot).create_randomized(&mut rng);
        }

        let number_of_experts = cfg.initial_experts;
        let to_insert = if number_of_experts < cfg.max_experts {
            number_of_experts
        } else {
            0
        };

        Ok(Self {
            activations: vec![0.0; cfg.max_experts],
            cfg,
            experts,
            rng,
            number_of_experts,
            winner: 0,
            last_winner: 0,
            recipient: 0,
            to_insert,
            new_node: false,
            learning_progress: 0.0,
            min_prediction_error: 0.0,
            cycles: 0,
            growth_events: 0,
            capacity_warnings: 0,
            progress_warnings: 0,
            last_capacity_warning: String::new(),
        })
    }

    /// Run one control cycle against the current input sample.
    ///
    /// The steps form a strict total order; later steps read state
    /// mutated by earlier ones. The only non-determinism is the one
    /// seeded recipient draw.
    pub fn execute_cycle(&mut self, input: &[f64]) {
        let nmax = self.cfg.max_experts;

        // 1. Remember the previous winner.
        self.last_winner = self.winner;

        // 2. Winner determination. Slot 0 always exists and provides the
        // bootstrap baseline; strict `<` keeps the earlier index on ties.
        let mut best_error = self.experts.get_mut(0).predict(input);
        let mut winner = 0;
        for slot in 1..nmax {
            if !self.experts.get(slot).exists() {
                continue;
            }
            let err = self.experts.get_mut(slot).predict(input);
            if err < best_error {
                best_error = err;
                winner = slot;
            }
        }
        self.winner = winner;
        self.min_prediction_error = best_error;

        // 3. Insertion on demand: the winner ran out of capacity, so its
        // region of the input space splits into a fresh expert.
        self.new_node = false;
        let exhausted = self
            .experts
            .get(self.winner)
            .learning_capacity_is_exhausted(self.cfg.capacity_threshold);
        if exhausted && self.to_insert != self.winner {
            let grown = self.to_insert;
            self.experts
                .copy(grown, self.winner, self.cfg.one_shot_learning, input);

            // The new expert starts with exactly one validated edge: back
            // to the slot it was grown from. Nothing points at it yet.
            self.experts.get_mut(grown).clear_transitions();
            for slot in 0..nmax {
                self.experts.get_mut(slot).zero_transition(grown);
            }
            self.experts
                .get_mut(grown)
                .reset_transition(self.winner, self.cfg.transition_reset_value);

            self.winner = grown;
            self.new_node = true;
            self.growth_events += 1;
        }

        // 4. Adapt the winner on the current sample.
        let error_before_adapt = self.experts.get(self.winner).last_error();
        self.experts.get_mut(self.winner).adapt(input);

        // 5. Learning progress: how much the adaptation just helped.
        let error_after_adapt = self.experts.get_mut(self.winner).predict(input);
        self.learning_progress = error_before_adapt - error_after_adapt;
        debug_assert!(
            (0.0..=1.0).contains(&self.learning_progress),
            "learning progress out of range: {}",
            self.learning_progress
        );
        if !(0.0..=1.0).contains(&self.learning_progress) {
            self.progress_warnings += 1;
        }

        // 6. Capacity redistribution, conserved by construction: the same
        // delta that leaves the winner lands on the recipient. The
        // recipient may be any slot, existing or not.
        let decay = (-self.cfg.learning_rate * self.learning_progress).exp();
        let delta = self.experts.get(self.winner).learning_capacity() * (1.0 - decay);
        self.experts.get_mut(self.winner).add_capacity(-delta);
        self.recipient = self.rng.gen_range_usize(0, nmax);
        self.experts.get_mut(self.recipient).add_capacity(delta);

        // 7. Topology refresh: decay every edge touching the winner, then
        // validate the edge just traversed. The self edge belongs to both
        // the outgoing and the incoming set; scale it once.
        for slot in 0..nmax {
            self.experts.get_mut(self.winner).scale_transition(slot, decay);
            if slot != self.winner {
                self.experts.get_mut(slot).scale_transition(self.winner, decay);
            }
        }
        self.experts
            .get_mut(self.winner)
            .reset_transition(self.last_winner, self.cfg.transition_reset_value);

        // 8. Recount existing experts (monotone: slots never die).
        self.number_of_experts = (0..nmax).filter(|&slot| self.experts.get(slot).exists()).count();

        // 9. Conservation check. Drift means a bookkeeping bug in step 3
        // or 6; report it, never swallow it.
        let capacity_sum: f64 = (0..nmax)
            .map(|slot| self.experts.get(slot).learning_capacity())
            .sum();
        let expected_sum = nmax as f64 * self.cfg.initial_capacity;
        let drift = capacity_sum - expected_sum;
        if drift.abs() > self.cfg.conservation_tolerance {
            self.capacity_warnings += 1;
            self.last_capacity_warning = format!(
                "cycle {}: capacity sum {:.12} drifted from {:.12} by {:+.3e}",
                self.cycles, capacity_sum, expected_sum, drift
            );
            if self.cfg.correct_capacity_drift {
                self.experts.get_mut(self.winner).add_capacity(-drift);
            }
        }

        // 10. Where the next growth event lands: the next free slot, or
        // once saturated, the most capacity-rich slot (earlier index on
        // ties).
        self.to_insert = self.select_insert_slot();

        // 11. Refresh the activation vector for downstream consumers.
        for slot in 0..nmax {
            self.activations[slot] = self.experts.get(slot).update_and_get_activation();
        }

        self.cycles += 1;
    }

    fn select_insert_slot(&self) -> usize {
        if self.number_of_experts < self.cfg.max_experts {
            return self.number_of_experts;
        }
        let mut best = 0;
        for slot in 1..self.cfg.max_experts {
            if self.experts.get(slot).learning_capacity()
                > self.experts.get(best).learning_capacity()
            {
                best = slot;
            }
        }
        best
    }

    // ─── Read-only accessors for external collaborators ──────────────────

    pub fn config(&self) -> &GmesConfig {
        &self.cfg
    }

    pub fn number_of_experts(&self) -> usize {
        self.number_of_experts
    }

    pub fn max_number_of_experts(&self) -> usize {
        self.cfg.max_experts
    }

    pub fn winner(&self) -> usize {
        self.winner
    }

    pub fn last_winner(&self) -> usize {
        self.last_winner
    }

    pub fn to_insert(&self) -> usize {
        self.to_insert
    }

    pub fn recipient(&self) -> usize {
        self.recipient
    }

    /// True only during the cycle a growth event occurred.
    pub fn has_new_node(&self) -> bool {
        self.new_node
    }

    /// True when the winner changed relative to the previous cycle.
    pub fn has_state_changed(&self) -> bool {
        self.winner != self.last_winner
    }

    pub fn learning_progress(&self) -> f64 {
        self.learning_progress
    }

    pub fn min_prediction_error(&self) -> PredictionError {
        self.min_prediction_error
    }

    /// The per-expert activation vector, usable directly as a feature or
    /// state vector. Zero exactly for non-existing slots.
    pub fn activations(&self) -> &[Activation] {
        &self.activations
    }

    pub fn expert(&self, slot: usize) -> &Expert<P> {
        self.experts.get(slot)
    }

    pub fn exists(&self, slot: usize) -> bool {
        self.experts.get(slot).exists()
    }

    pub fn learning_capacity(&self, slot: usize) -> Capacity {
        self.experts.get(slot).learning_capacity()
    }

    /// Whether the directed edge `from -> to` is currently validated.
    pub fn exists_transition(&self, from: usize, to: usize) -> bool {
        self.experts
            .get(from)
            .exists_transition(to, self.cfg.transition_threshold)
    }

    pub fn payload(&self) -> &Y {
        self.experts.payload()
    }

    /// Mutable access to the externally-owned payload. The structure
    /// clones payload blocks on growth but never interprets them; what
    /// they mean is entirely the caller's business.
    pub fn payload_mut(&mut self) -> &mut Y {
        self.experts.payload_mut()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn growth_events(&self) -> u64 {
        self.growth_events
    }

    pub fn capacity_warnings(&self) -> u64 {
        self.capacity_warnings
    }

    pub fn progress_warnings(&self) -> u64 {
        self.progress_warnings
    }

    /// Human-readable description of the most recent conservation drift,
    /// empty when none was ever detected.
    pub fn last_capacity_warning(&self) -> &str {
        &self.last_capacity_warning
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let capacity_sum: f64 = (0..self.cfg.max_experts)
            .map(|slot| self.experts.get(slot).learning_capacity())
            .sum();
        let expected_sum = self.cfg.max_experts as f64 * self.cfg.initial_capacity;

        Diagnostics {
            cycles: self.cycles,
            number_of_experts: self.number_of_experts,
            winner: self.winner,
            last_winner: self.last_winner,
            to_insert: self.to_insert,
            recipient: self.recipient,
            new_node: self.new_node,
            state_changed: self.has_state_changed(),
            learning_progress: self.learning_progress,
            min_prediction_error: self.min_prediction_error,
            capacity_sum,
            capacity_drift: capacity_sum - expected_sum,
            growth_events: self.growth_events,
            capacity_warnings: self.capacity_warnings,
            progress_warnings: self.progress_warnings,
        }
    }
}

impl<P, Y> Gmes<P, Y>
where
    P: PersistPredictor,
    Y: PersistPayload,
{
    /// Serialize the learned state: predictor parameters and payload for
    /// every existing slot.
    ///
    /// Learning capacities and transitions are deliberately not part of
    /// the image; `load_image_from` resets them to the construction
    /// state, re-warming the growth/competition dynamics around the
    /// restored predictors.
    pub fn save_image_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(storage::MAGIC)?;
        storage::write_u32_le(w, storage::VERSION_CURRENT)?;

        let nmax = self.cfg.max_experts;
        let mut body: Vec<u8> = Vec::new();
        storage::write_u32_le(&mut body, nmax as u32)?;
        for slot in 0..nmax {
            body.push(self.experts.get(slot).exists() as u8);
        }
        for slot in 0..nmax {
            if !self.experts.get(slot).exists() {
                continue;
            }
            let mut params: Vec<u8> = Vec::new();
            self.experts.get(slot).predictor().write_params_to(&mut params)?;
            storage::write_bytes(&mut body, &params)?;

            let mut block: Vec<u8> = Vec::new();
            self.experts.payload().write_slot_to(slot, &mut block)?;
            storage::write_bytes(&mut body, &block)?;
        }

        storage::write_chunk_lz4(w, *b"EXPT", &body)
    }

    /// Restore predictor parameters and payloads from an image produced by
    /// `save_image_to`, then reset all competition state (capacities,
    /// transitions, winner bookkeeping, counters) to the construction
    /// baseline.
    pub fn load_image_from<R: Read>(&mut self, r: &mut R) -> io::Result<()> {
        let magic = storage::read_exact::<8, _>(r)?;
        if &magic != storage::MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad gmes image magic"));
        }
        let version = storage::read_u32_le(r)?;
        if version != storage::VERSION_CURRENT {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unsupported gmes image version",
            ));
        }

        let (tag, len) = storage::read_chunk_header(r)?;
        if &tag != b"EXPT" {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "missing EXPT chunk"));
        }
        let body = storage::read_chunk_lz4(r, len)?;
        let mut cur = Cursor::new(body);

        let nmax = storage::read_u32_le(&mut cur)? as usize;
        if nmax != self.cfg.max_experts {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "image max_experts mismatch",
            ));
        }
        let mut exists = vec![false; nmax];
        for flag in exists.iter_mut() {
            *flag = storage::read_exact::<1, _>(&mut cur)?[0] != 0;
        }
        if exists[..self.cfg.initial_experts].iter().any(|&e| !e) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "image missing initial experts",
            ));
        }

        for (slot, &present) in exists.iter().enumerate() {
            if !present {
                continue;
            }
            let params = storage::read_bytes(&mut cur)?;
            self.experts
                .get_mut(slot)
                .predictor_mut()
                .read_params_from(&mut Cursor::new(params))?;

            let block = storage::read_bytes(&mut cur)?;
            self.experts
                .payload_mut()
                .read_slot_from(slot, &mut Cursor::new(block))?;
        }

        // Reset competition state to the construction baseline.
        for (slot, &present) in exists.iter().enumerate() {
            let expert = self.experts.get_mut(slot);
            expert.set_exists(present);
            expert.set_learning_capacity(self.cfg.initial_capacity);
            expert.set_last_error(0.0);
            expert.clear_transitions();
        }
        self.number_of_experts = exists.iter().filter(|&&e| e).count();
        self.winner = 0;
        self.last_winner = 0;
        self.recipient = 0;
        self.new_node = false;
        self.learning_progress = 0.0;
        self.min_prediction_error = 0.0;
        self.activations.fill(0.0);
        self.to_insert = self.select_insert_slot();
        self.cycles = 0;
        self.growth_events = 0;
        self.capacity_warnings = 0;
        self.progress_warnings = 0;
        self.last_capacity_warning.clear();

        Ok(())
    }
}
