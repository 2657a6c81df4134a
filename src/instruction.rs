use crate::error::RaffleError;
use crate::state::ParticipantId;
use crate::vrf::{RandomValue, RequestId};
use std::mem::size_of;

/// State-changing raffle operations in wire form: a tag byte followed
/// by fixed-width little-endian fields (keys and random words raw).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RaffleInstruction {
    /// Enter the current round
    ///
    /// Data: participant (32 bytes), amount (u64)
    Enter {
        participant: ParticipantId,
        /// Contribution, at least the entrance fee
        amount: u64,
    },

    /// Request randomness if the upkeep conditions hold.
    /// Any caller may submit it.
    PerformUpkeep {},

    /// Oracle callback delivering the random word for a request
    ///
    /// Data: request id (u64), random value (32 bytes, big-endian)
    FulfillRandomWords {
        request_id: RequestId,
        random_value: RandomValue,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, RaffleError> {
        let (tag, rest) = input.split_first().ok_or(RaffleError::InvalidInstruction)?;

        let (instruction, rest) = match tag {
            0 => {
                let (participant, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (amount, rest) = Self::unpack_u64(rest)?;
                (
                    Self::Enter {
                        participant: ParticipantId::new_from_array(participant),
                        amount,
                    },
                    rest,
                )
            }
            1 => (Self::PerformUpkeep {}, rest),
            2 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (random_value, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                (
                    Self::FulfillRandomWords {
                        request_id: RequestId(request_id),
                        random_value: RandomValue::from_be_bytes(random_value),
                    },
                    rest,
                )
            }
            _ => return Err(RaffleError::InvalidInstruction),
        };

        if !rest.is_empty() {
            return Err(RaffleError::InvalidInstruction);
        }
        Ok(instruction)
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::Enter { participant, amount } => {
                buf.push(0);
                buf.extend_from_slice(participant.as_ref());
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::PerformUpkeep {} => buf.push(1),
            Self::FulfillRandomWords {
                request_id,
                random_value,
            } => {
                buf.push(2);
                buf.extend_from_slice(&request_id.0.to_le_bytes());
                buf.extend_from_slice(&random_value.to_be_bytes());
            }
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), RaffleError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((u64::from_le_bytes(bytes), rest))
    }

    fn unpack_fixed_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), RaffleError> {
        if input.len() < N {
            return Err(RaffleError::InvalidInstruction);
        }
        let (bytes, rest) = input.split_at(N);
        let bytes = bytes.try_into().map_err(|_| RaffleError::InvalidInstruction)?;
        Ok((bytes, rest))
    }
}

/// Create enter instruction data
pub fn enter(participant: &ParticipantId, amount: u64) -> Vec<u8> {
    RaffleInstruction::Enter {
        participant: *participant,
        amount,
    }
    .pack()
}

/// Create perform_upkeep instruction data
pub fn perform_upkeep() -> Vec<u8> {
    RaffleInstruction::PerformUpkeep {}.pack()
}

/// Create fulfill_random_words instruction data
pub fn fulfill_random_words(request_id: RequestId, random_value: RandomValue) -> Vec<u8> {
    RaffleInstruction::FulfillRandomWords {
        request_id,
        random_value,
    }
    .pack()
}
