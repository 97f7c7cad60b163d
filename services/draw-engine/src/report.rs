use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use cosmwasm_schema::cw_serde;
use survey_draw_common::types::DrawRecord;

/// Auditor-facing summary of a completed draw.
#[cw_serde]
pub struct DrawReport {
    pub program_name: String,
    pub survey_instance_id: String,
    pub record_id: u64,
    /// RFC 3339, UTC
    pub executed_at: String,
    pub candidates_count: u64,
    pub winner_token: String,
    pub seed: String,
    pub pool_hash: String,
    pub verification_steps: Vec<String>,
}

/// Build the report of a draw record. Pure; reads nothing but the record.
pub fn format_report(record: &DrawRecord, program_name: &str) -> DrawReport {
    DrawReport {
        program_name: program_name.to_string(),
        survey_instance_id: record.survey_instance_id.clone(),
        record_id: record.id,
        executed_at: rfc3339(record),
        candidates_count: record.candidates_count,
        winner_token: record.winner_token.clone(),
        seed: record.seed.clone(),
        pool_hash: record.pool_hash.clone(),
        verification_steps: verification_steps(record),
    }
}

fn rfc3339(record: &DrawRecord) -> String {
    let secs = record.created_at.seconds() as i64;
    let nanos = record.created_at.subsec_nanos() as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| format!("{}s since epoch", record.created_at.seconds()))
}

fn verification_steps(record: &DrawRecord) -> Vec<String> {
    vec![
        format!(
            "Obtain the {} draw tokens of survey instance {} from the response store.",
            record.candidates_count, record.survey_instance_id
        ),
        "Remove duplicates and sort the tokens by their UTF-8 bytes, ascending.".to_string(),
        "Hash each token as leaf = SHA-256(0x00 || token). Pair leaves in order, hashing \
         node = SHA-256(0x01 || smaller || larger); an unpaired last node moves up unchanged. \
         Repeat until one root remains."
            .to_string(),
        format!("Check that the root equals the pool hash {}.", record.pool_hash),
        format!(
            "Compute digest = SHA-256(seed || pool hash) with seed {}, both as raw bytes.",
            record.seed
        ),
        "Read the digest as a big-endian 256-bit integer r. While r falls in the top \
         (2^256 mod N) values, replace the digest with SHA-256(digest)."
            .to_string(),
        format!(
            "The winner is the token at zero-based position r mod {} of the sorted list; \
             it must equal {}.",
            record.candidates_count, record.winner_token
        ),
    ]
}

impl fmt::Display for DrawReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: prize draw report", self.program_name)?;
        writeln!(f)?;
        writeln!(f, "Survey instance:   {}", self.survey_instance_id)?;
        writeln!(f, "Draw record:       #{}", self.record_id)?;
        writeln!(f, "Executed at:       {}", self.executed_at)?;
        writeln!(f, "Candidates:        {}", self.candidates_count)?;
        writeln!(f, "Winning token:     {}", self.winner_token)?;
        writeln!(f, "Seed:              {}", self.seed)?;
        writeln!(f, "Pool hash:         {}", self.pool_hash)?;
        writeln!(f)?;
        writeln!(f, "How to verify this result independently:")?;
        for (i, step) in self.verification_steps.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, step)?;
        }
        Ok(())
    }
}

impl DrawReport {
    /// Plain-text rendering for archiving alongside the survey results.
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}
