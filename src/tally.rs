//! Homomorphic tallying.
//!
//! The TallyingCenter never sees an individual plaintext: it mixes the
//! accepted ballots, verifies the mix, multiplies the mixed batch into a
//! single aggregate ciphertext and asks the Authority to decrypt that one
//! value. Yes is the decrypted sum, no is the remainder.

use crate::audit::{AuditLog, EventKind};
use crate::election::Authority;
use crate::elgamal::{Ciphertext, ElectionParameters};
use crate::mix::{self, MixRecord};
use crate::Error;

use log::info;
use serde_json::json;

/// Published result of one tally run.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TallyRecord {
    pub c_star: Ciphertext,
    pub sum: u64,
    pub voter_count: u64,
}

/// The full outcome handed back to the orchestrator.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TallyOutcome {
    pub yes: u64,
    pub no: u64,
    pub mix: MixRecord,
    pub record: TallyRecord,
}

pub struct TallyingCenter {
    params: ElectionParameters,
}

impl TallyingCenter {
    pub fn new(params: ElectionParameters) -> Self {
        TallyingCenter { params }
    }

    /// Mix, verify, aggregate and decrypt the accepted ballots. The tally
    /// is computed from the mixed batch, never from the input batch, so
    /// ballot order carries no information about voters.
    pub fn tally(
        &self,
        authority: &Authority,
        ballots: &[Ciphertext],
        audit: &mut AuditLog,
    ) -> Result<TallyOutcome, Error> {
        if ballots.is_empty() {
            return Err(Error::ParameterError("no ballots to tally".to_string()));
        }

        let (mixed, proof) = mix::mix(&self.params, ballots)?;
        mix::verify_mix(&self.params, ballots, &mixed, &proof)?;
        let mix_record = MixRecord::new(ballots, mixed, proof);

        audit.append(
            EventKind::Mix,
            json!({
                "input_digest": hex::encode(mix_record.input_digest),
                "ballots": mix_record.output_batch.len(),
                "proof": serde_json::to_value(&mix_record.proof)?,
            }),
        )?;

        let voter_count = mix_record.output_batch.len() as u64;
        let c_star = self.params.homomorphic_sum(&mix_record.output_batch)?;
        let sum = authority.decrypt_sum(&c_star, voter_count)?;
        info!("tally decrypted: {} of {} in favor", sum, voter_count);

        let record = TallyRecord {
            c_star: c_star.clone(),
            sum,
            voter_count,
        };

        audit.append(
            EventKind::Tally,
            json!({
                "c_star": serde_json::to_value(&c_star)?,
                "sum": sum,
                "voter_count": voter_count,
            }),
        )?;

        Ok(TallyOutcome {
            yes: sum,
            no: voter_count - sum,
            mix: mix_record,
            record,
        })
    }
}
