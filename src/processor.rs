use crate::clock::Clock;
use crate::engine::RaffleEngine;
use crate::error::RaffleError;
use crate::instruction::RaffleInstruction;
use crate::ledger::Ledger;
use crate::vrf::RandomnessOracle;
use log::info;

pub struct Processor;

impl Processor {
    /// Decode `instruction_data` and apply it to `engine`
    pub fn process<O, L, C>(
        engine: &mut RaffleEngine<O, L, C>,
        instruction_data: &[u8],
    ) -> Result<(), RaffleError>
    where
        O: RandomnessOracle,
        L: Ledger,
        C: Clock,
    {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::Enter { participant, amount } => {
                info!("Instruction: Enter");
                engine.enter(participant, amount)
            }
            RaffleInstruction::PerformUpkeep {} => {
                info!("Instruction: Perform Upkeep");
                engine.begin_selection().map(|_| ())
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_value,
            } => {
                info!("Instruction: Fulfill Random Words");
                engine.resolve(request_id, random_value).map(|_| ())
            }
        }
    }
}
