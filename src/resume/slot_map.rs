use crate::peers::PieceIndex;

/// what a physical storage slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    Unassigned,
    // disk space is allocated but no piece is bound to it yet
    Reserved,
    Assigned(PieceIndex),
}

impl SlotState {
    pub const UNASSIGNED: i32 = -1;
    pub const RESERVED: i32 = -2;

    /// wire value of the slot.
    pub fn to_raw(self) -> i32 {
        match self {
            SlotState::Unassigned => Self::UNASSIGNED,
            SlotState::Reserved => Self::RESERVED,
            SlotState::Assigned(piece) => piece as i32,
        }
    }

    /// None for values outside `[-2, num_pieces)`.
    pub fn from_raw(raw: i32, num_pieces: usize) -> Option<Self> {
        match raw {
            Self::UNASSIGNED => Some(SlotState::Unassigned),
            Self::RESERVED => Some(SlotState::Reserved),
            piece if piece >= 0 && (piece as usize) < num_pieces => {
                Some(SlotState::Assigned(piece as usize))
            }
            _ => None,
        }
    }
}

/// storage slot -> piece mapping, one entry per slot. With full allocation slot `i` holds piece
/// `i`, compact allocation may leave slots unassigned or reserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PieceSlotMap(Vec<SlotState>);

impl PieceSlotMap {
    pub fn unassigned(num_slots: usize) -> Self {
        Self(vec![SlotState::Unassigned; num_slots])
    }

    pub fn from_slots(slots: Vec<SlotState>) -> Self {
        Self(slots)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn slots(&self) -> &[SlotState] {
        &self.0
    }

    pub fn get(&self, slot: usize) -> Option<SlotState> {
        self.0.get(slot).copied()
    }

    /// binds `piece` to `slot`, releasing any other slot that held it so a piece is never in two
    /// slots.
    pub fn assign(&mut self, slot: usize, piece: PieceIndex) {
        for state in self.0.iter_mut() {
            if *state == SlotState::Assigned(piece) {
                *state = SlotState::Unassigned;
            }
        }
        self.set(slot, SlotState::Assigned(piece));
    }

    pub fn set(&mut self, slot: usize, state: SlotState) {
        if slot >= self.0.len() {
            self.0.resize(slot + 1, SlotState::Unassigned);
        }
        self.0[slot] = state;
    }

    pub fn slot_of(&self, piece: PieceIndex) -> Option<usize> {
        self.0
            .iter()
            .position(|state| *state == SlotState::Assigned(piece))
    }

    pub fn assigned_pieces(&self) -> impl Iterator<Item = PieceIndex> + '_ {
        self.0.iter().filter_map(|state| match state {
            SlotState::Assigned(piece) => Some(*piece),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(-1, Some(SlotState::Unassigned))]
    #[case(-2, Some(SlotState::Reserved))]
    #[case(0, Some(SlotState::Assigned(0)))]
    #[case(3, Some(SlotState::Assigned(3)))]
    #[case(4, None)]
    #[case(-3, None)]
    fn raw_values_map_to_slot_states(#[case] raw: i32, #[case] expected: Option<SlotState>) {
        assert_eq!(SlotState::from_raw(raw, 4), expected);
        if let Some(state) = expected {
            assert_eq!(state.to_raw(), raw);
        }
    }

    #[test]
    fn assigning_moves_a_piece_between_slots() {
        let mut map = PieceSlotMap::unassigned(3);
        map.assign(0, 2);
        map.assign(1, 2);
        assert_eq!(
            map.slots(),
            &[SlotState::Unassigned, SlotState::Assigned(2), SlotState::Unassigned]
        );
        assert_eq!(map.slot_of(2), Some(1));
        assert_eq!(map.assigned_pieces().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn set_grows_the_map() {
        let mut map = PieceSlotMap::default();
        map.set(2, SlotState::Reserved);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(0), Some(SlotState::Unassigned));
        assert_eq!(map.get(2), Some(SlotState::Reserved));
    }
}
