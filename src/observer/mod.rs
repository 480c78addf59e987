use crate::engine::{Diagnostics, Gmes};
use crate::predictor::{Payload, Predictor};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A read-only snapshot of what the expert structure is doing.
///
/// Design intent:
/// - Observers cannot mutate or steer the structure.
/// - Snapshotting is *on-demand* and can allocate; the cycle loop stays
///   unchanged.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GmesSnapshot {
    pub diagnostics: Diagnostics,

    pub exists: Vec<bool>,
    pub activations: Vec<f64>,
    pub capacities: Vec<f64>,

    /// Directed edges currently above the validation threshold, as
    /// `(from, to)` slot pairs. Intended for topology visualization.
    pub validated_edges: Vec<(usize, usize)>,

    /// Most recent conservation warning, empty when none was detected.
    pub last_capacity_warning: String,
}

pub struct GmesAdapter<'a, P, Y> {
    gmes: &'a Gmes<P, Y>,
}

impl<'a, P: Predictor, Y: Payload> GmesAdapter<'a, P, Y> {
    pub fn new(gmes: &'a Gmes<P, Y>) -> Self {
        Self { gmes }
    }

    pub fn snapshot(&self) -> GmesSnapshot {
        let nmax = self.gmes.max_number_of_experts();

        let mut validated_edges = Vec::new();
        for from in 0..nmax {
            for to in 0..nmax {
                if self.gmes.exists_transition(from, to) {
                    validated_edges.push((from, to));
                }
            }
        }

        GmesSnapshot {
            diagnostics: self.gmes.diagnostics(),
            exists: (0..nmax).map(|slot| self.gmes.exists(slot)).collect(),
            activations: self.gmes.activations().to_vec(),
            capacities: (0..nmax).map(|slot| self.gmes.learning_capacity(slot)).collect(),
            validated_edges,
            last_capacity_warning: self.gmes.last_capacity_warning().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GmesConfig;
    use crate::predictor::ScalarPredictor;

    fn make_gmes() -> Gmes<ScalarPredictor, ()> {
        let cfg = GmesConfig::with_size(4, 2).with_seed(42);
        let predictors = (0..4).map(|_| ScalarPredictor::new(0.1)).collect();
        Gmes::new(cfg, predictors, ()).expect("valid test config")
    }

    #[test]
    fn snapshot_mirrors_the_accessors() {
        let mut gmes = make_gmes();
        for t in 0..50 {
            gmes.execute_cycle(&[((t % 4) as f64) / 4.0]);
        }

        let snap = GmesAdapter::new(&gmes).snapshot();
        assert_eq!(snap.diagnostics, gmes.diagnostics());
        assert_eq!(snap.activations, gmes.activations());
        assert_eq!(snap.exists.len(), 4);
        assert_eq!(snap.capacities.len(), 4);
        for slot in 0..4 {
            assert_eq!(snap.exists[slot], gmes.exists(slot));
            assert_eq!(snap.capacities[slot], gmes.learning_capacity(slot));
        }
        for &(from, to) in &snap.validated_edges {
            assert!(gmes.exists_transition(from, to));
        }
    }

    #[test]
    fn snapshot_contains_the_traversed_edges() {
        let mut gmes = make_gmes();
        gmes.execute_cycle(&[0.2]);
        gmes.execute_cycle(&[0.2]);

        let snap = GmesAdapter::new(&gmes).snapshot();
        let winner = gmes.winner();
        assert!(snap.validated_edges.contains(&(winner, winner)));
    }
}
