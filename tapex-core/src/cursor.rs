use serde::Serialize;

/// Extent of each cursor axis.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub struct Dims {
    pub runs: usize,
    pub conditions: usize,
    pub steps: usize,
}

impl Dims {
    pub fn is_empty(&self) -> bool {
        self.runs == 0 || self.conditions == 0 || self.steps == 0
    }

    /// Micro-steps visited in a complete session.
    pub fn total_steps(&self) -> usize {
        self.runs * self.conditions * self.steps
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Cursor {
    pub run: usize,
    pub condition: usize,
    pub step: usize,
}

impl Cursor {
    pub const ORIGIN: Cursor = Cursor {
        run: 0,
        condition: 0,
        step: 0,
    };

    /// Carry-propagating increment: step overflow bumps the condition,
    /// condition overflow bumps the run. `None` once the runs are exhausted.
    pub fn successor(self, dims: Dims) -> Option<Cursor> {
        let mut next = self;
        next.step += 1;
        if next.step >= dims.steps {
            next.step = 0;
            next.condition += 1;
        }
        if next.condition >= dims.conditions {
            next.condition = 0;
            next.run += 1;
        }
        (next.run < dims.runs).then_some(next)
    }
}

/// Progress pointer including the sentinel before the first micro-step and
/// the terminal state after the last one.
#[derive(Copy, Debug, Clone, Default, PartialEq, Eq)]
pub enum Position {
    #[default]
    BeforeFirst,
    At(Cursor),
    Finished,
}

impl Position {
    pub fn next(self, dims: Dims) -> Position {
        match self {
            Position::BeforeFirst if dims.is_empty() => Position::Finished,
            Position::BeforeFirst => Position::At(Cursor::ORIGIN),
            Position::At(cursor) => cursor.successor(dims).map_or(Position::Finished, Position::At),
            Position::Finished => Position::Finished,
        }
    }

    pub fn cursor(&self) -> Option<Cursor> {
        match self {
            Position::At(cursor) => Some(*cursor),
            _ => None,
        }
    }

    /// Run index; equals `dims.runs` only in the terminal state.
    pub fn run_index(&self, dims: Dims) -> usize {
        match self {
            Position::BeforeFirst => 0,
            Position::At(cursor) => cursor.run,
            Position::Finished => dims.runs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: Dims = Dims {
        runs: 2,
        conditions: 3,
        steps: 2,
    };

    #[test]
    fn sentinel_lands_on_origin() {
        assert_eq!(Position::BeforeFirst.next(DIMS), Position::At(Cursor::ORIGIN));
    }

    #[test]
    fn empty_dims_finish_immediately() {
        let empty = Dims { runs: 0, ..DIMS };
        assert_eq!(Position::BeforeFirst.next(empty), Position::Finished);
    }

    fn at(run: usize, condition: usize, step: usize) -> Cursor {
        Cursor {
            run,
            condition,
            step,
        }
    }

    #[test]
    fn increments_carry_through_every_axis() {
        assert_eq!(at(0, 0, 1).successor(DIMS), Some(at(0, 1, 0)));
        assert_eq!(at(0, 2, 1).successor(DIMS), Some(at(1, 0, 0)));
        assert_eq!(at(1, 2, 1).successor(DIMS), None);
    }

    #[test]
    fn walk_visits_every_triple_once_in_order() {
        let mut visited = Vec::new();
        let mut pos = Position::BeforeFirst.next(DIMS);
        while let Some(cursor) = pos.cursor() {
            visited.push(cursor);
            pos = pos.next(DIMS);
        }
        assert_eq!(visited.len(), DIMS.total_steps());
        assert!(visited.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(pos.run_index(DIMS), DIMS.runs);
    }

    #[test]
    fn finished_is_absorbing() {
        assert_eq!(Position::Finished.next(DIMS), Position::Finished);
        assert_eq!(Position::Finished.cursor(), None);
    }
}
