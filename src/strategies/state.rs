//! Per-instrument position state machine.
//!
//! Path-dependent policies keep a FLAT/LONG state for each instrument and fold
//! a transition rule over the dates. A date with a missing observation forces
//! the instrument FLAT. Instruments never influence each other.

use crate::panel::Panel;

/// Position held by one instrument on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long,
}

impl PositionState {
    /// Raw target weight for this state.
    pub fn weight(self) -> f64 {
        match self {
            PositionState::Flat => 0.0,
            PositionState::Long => 1.0,
        }
    }
}

/// Entry and exit conditions of a path-dependent policy.
pub trait TransitionRule {
    /// Everything the rule needs to look at on one date.
    type Observation: Copy;

    /// Whether a FLAT instrument enters.
    fn enter(&self, obs: Self::Observation) -> bool;

    /// Whether a LONG instrument exits.
    fn exit(&self, obs: Self::Observation) -> bool;

    fn step(&self, state: PositionState, obs: Option<Self::Observation>) -> PositionState {
        match (state, obs) {
            (_, None) => PositionState::Flat,
            (PositionState::Flat, Some(o)) if self.enter(o) => PositionState::Long,
            (PositionState::Long, Some(o)) if self.exit(o) => PositionState::Flat,
            (s, Some(_)) => s,
        }
    }
}

/// Fold `rule` over one instrument's observations, starting FLAT.
pub fn fold_positions<R, I>(rule: &R, observations: I) -> Vec<PositionState>
where
    R: TransitionRule,
    I: IntoIterator<Item = Option<R::Observation>>,
{
    let mut state = PositionState::Flat;
    observations
        .into_iter()
        .map(|obs| {
            state = rule.step(state, obs);
            state
        })
        .collect()
}

/// Run `rule` independently down every column of `panel`.
///
/// `observe(row, col)` builds the observation for one cell, returning `None`
/// when any input is missing. The result holds 1.0 where LONG, 0.0 where FLAT.
pub fn run_state_machine<R>(
    rule: &R,
    panel: &Panel,
    observe: impl Fn(usize, usize) -> Option<R::Observation>,
) -> Panel
where
    R: TransitionRule,
{
    let mut values = vec![vec![0.0; panel.n_cols()]; panel.n_rows()];
    for j in 0..panel.n_cols() {
        let states = fold_positions(rule, (0..panel.n_rows()).map(|i| observe(i, j)));
        for (row, state) in values.iter_mut().zip(states) {
            row[j] = state.weight();
        }
    }
    panel.with_values(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Threshold;

    impl TransitionRule for Threshold {
        type Observation = f64;

        fn enter(&self, x: f64) -> bool {
            x > 1.0
        }

        fn exit(&self, x: f64) -> bool {
            x < 0.0
        }
    }

    #[test]
    fn test_enter_hold_exit() {
        let obs = [0.5, 2.0, 0.5, -1.0, 0.5].map(Some);
        let states = fold_positions(&Threshold, obs);
        assert_eq!(
            states,
            vec![
                PositionState::Flat,
                PositionState::Long,
                PositionState::Long,
                PositionState::Flat,
                PositionState::Flat,
            ]
        );
    }

    #[test]
    fn test_missing_observation_forces_flat() {
        let obs = [Some(2.0), None, Some(0.5)];
        let states = fold_positions(&Threshold, obs);
        assert_eq!(
            states,
            vec![PositionState::Long, PositionState::Flat, PositionState::Flat]
        );
    }

    #[test]
    fn test_weights() {
        assert_eq!(PositionState::Flat.weight(), 0.0);
        assert_eq!(PositionState::Long.weight(), 1.0);
    }
}
