use std::io::{Cursor, Read};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use crate::torrent::{Bitfield, InfoHash};

use super::{
    PieceSlotMap, ResumeData, ResumeDataError, ResumeLayout, SlotState, UnfinishedPiece,
};

fn write_int(out: &mut Vec<u8>, value: i32) {
    let mut buf = [0u8; 4];
    BigEndian::write_i32(&mut buf, value);
    out.extend_from_slice(&buf);
}

fn read_int(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<i32, ResumeDataError> {
    cursor
        .read_i32::<BigEndian>()
        .map_err(|_| ResumeDataError::Truncated { field })
}

fn read_count(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<usize, ResumeDataError> {
    let value = read_int(cursor, field)?;
    usize::try_from(value).map_err(|_| ResumeDataError::NegativeCount { field, value })
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len() - cursor.position() as usize
}

// fails up front when `count` records of `record_len` bytes can't fit, so a corrupt count
// doesn't turn into a huge allocation
fn ensure_remaining(
    cursor: &Cursor<&[u8]>,
    count: usize,
    record_len: usize,
    field: &'static str,
) -> Result<(), ResumeDataError> {
    match count.checked_mul(record_len) {
        Some(needed) if needed <= remaining(cursor) => Ok(()),
        _ => Err(ResumeDataError::Truncated { field }),
    }
}

fn bitmask_len(blocks_per_piece: u32) -> usize {
    (blocks_per_piece as usize).div_ceil(8).max(1)
}

impl ResumeData {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mask_len = bitmask_len(self.blocks_per_piece);
        let mut out = Vec::with_capacity(
            InfoHash::LEN + 12 + 4 * self.slots.len() + self.unfinished.len() * (4 + mask_len),
        );

        out.extend_from_slice(self.info_hash.as_bytes());

        write_int(&mut out, self.slots.len() as i32);
        for slot in self.slots.slots() {
            write_int(&mut out, slot.to_raw());
        }

        write_int(&mut out, self.blocks_per_piece as i32);
        write_int(&mut out, self.unfinished.len() as i32);

        for piece in &self.unfinished {
            write_int(&mut out, piece.piece_index as i32);

            for j in 0..mask_len {
                let byte = (0..8).fold(0u8, |byte, k| {
                    match piece.finished.get(j * 8 + k).is_some_and(|bit| *bit) {
                        true => byte | (1 << k),
                        false => byte,
                    }
                });
                out.push(byte);
            }
        }

        out
    }

    /// parses and validates a blob against the torrent it is meant for. Nothing partial is ever
    /// returned, any inconsistency rejects the whole blob.
    pub fn decode(buf: &[u8], layout: &ResumeLayout) -> Result<Self, ResumeDataError> {
        let mut cursor = Cursor::new(buf);

        let mut info_hash = [0u8; InfoHash::LEN];
        cursor
            .read_exact(&mut info_hash)
            .map_err(|_| ResumeDataError::Truncated { field: "info hash" })?;
        let info_hash = InfoHash::new(info_hash);
        if info_hash != layout.info_hash {
            return Err(ResumeDataError::InfoHashMismatch);
        }

        let num_slots = read_count(&mut cursor, "slot count")?;
        ensure_remaining(&cursor, num_slots, 4, "slots")?;

        let mut seen = Bitfield::new();
        seen.resize(layout.num_pieces, false);
        let mut slots = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            let value = read_int(&mut cursor, "slots")?;
            let state = SlotState::from_raw(value, layout.num_pieces)
                .ok_or(ResumeDataError::SlotOutOfRange { slot, value })?;

            if let SlotState::Assigned(piece) = state {
                if seen.replace(piece, true) {
                    return Err(ResumeDataError::DuplicateSlotPiece { piece });
                }
            }
            slots.push(state);
        }

        let blocks_per_piece = read_int(&mut cursor, "blocks per piece")?;
        if blocks_per_piece != layout.blocks_per_piece as i32 {
            return Err(ResumeDataError::BlocksPerPieceMismatch {
                expected: layout.blocks_per_piece,
                found: blocks_per_piece,
            });
        }

        let mask_len = layout.bitmask_len();
        let num_unfinished = read_count(&mut cursor, "unfinished piece count")?;
        ensure_remaining(&cursor, num_unfinished, 4 + mask_len, "unfinished pieces")?;

        seen.fill(false);
        let mut unfinished = Vec::with_capacity(num_unfinished);
        let mut mask = vec![0u8; mask_len];
        for _ in 0..num_unfinished {
            let value = read_int(&mut cursor, "unfinished piece index")?;
            let piece_index = usize::try_from(value)
                .ok()
                .filter(|index| *index < layout.num_pieces)
                .ok_or(ResumeDataError::PieceOutOfRange { value })?;

            if seen.replace(piece_index, true) {
                return Err(ResumeDataError::DuplicateUnfinishedPiece { piece: piece_index });
            }

            cursor
                .read_exact(&mut mask)
                .map_err(|_| ResumeDataError::Truncated { field: "block bitmask" })?;

            // bits past the piece's last block are padding
            let finished: Bitfield = (0..layout.blocks_in_piece(piece_index) as usize)
                .map(|block| mask.get(block / 8).is_some_and(|b| b & (1 << (block % 8)) != 0))
                .collect();

            unfinished.push(UnfinishedPiece {
                piece_index,
                finished,
            });
        }

        match remaining(&cursor) {
            0 => Ok(Self {
                info_hash,
                slots: PieceSlotMap::from_slots(slots),
                blocks_per_piece: layout.blocks_per_piece,
                unfinished,
            }),
            count => Err(ResumeDataError::TrailingBytes { count }),
        }
    }
}
