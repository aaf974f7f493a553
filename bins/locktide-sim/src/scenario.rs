//! Scenario files: engine config plus a timestamped list of actions.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use locktide_core::token::MemoryTokenLedger;
use locktide_core::traits::TokenLedger;
use locktide_core::types::{Address, Amount, TokenId};
use locktide_ledger::{Engine, EngineConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: EngineConfig,
    pub vault: Address,
    pub deployer: Address,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Unix timestamp the action runs at.
    pub at: u64,
    pub action: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Mint { token: TokenId, account: Address, amount: Amount },
    /// Approve the vault to pull `amount` of `token` from `owner`.
    Approve { token: TokenId, owner: Address, amount: Amount },
    SetTransferFee { token: TokenId, bps: u64 },
    Configure { caller: Address },
    Lock { account: Address, amount: Amount, weeks: u64 },
    Extend { account: Address, amount: Amount, from_weeks: u64, to_weeks: u64 },
    Exit { account: Address },
    Withdraw { account: Address },
    Deposit { depositor: Address, token: TokenId, amount: Amount },
    Claim { account: Address, tokens: Vec<TokenId> },
    Query { account: Address },
    /// Snapshot the engine and continue on the restored copy.
    Snapshot,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse scenario")
    }
}

/// Replays a scenario and collects one JSON line per event, query result
/// or failed step. With `strict`, the first failed step aborts the run.
///
/// Amounts are written as JSON integers in event lines and as decimal
/// strings in query lines.
pub struct Runner {
    engine: Engine<MemoryTokenLedger>,
    config: EngineConfig,
    strict: bool,
    output: Vec<String>,
}

impl Runner {
    pub fn new(scenario: &Scenario, strict: bool) -> Self {
        Self {
            engine: Engine::deploy(scenario.vault, scenario.deployer, MemoryTokenLedger::new()),
            config: scenario.config.clone(),
            strict,
            output: Vec::new(),
        }
    }

    pub fn run(mut self, steps: &[Step]) -> Result<Vec<String>> {
        for (index, step) in steps.iter().enumerate() {
            debug!(index, at = step.at, action = ?step.action, "sim: step");
            match self.apply(step) {
                Ok(Some(record)) => self.output.push(record.to_string()),
                Ok(None) => {}
                Err(e) if self.strict => {
                    return Err(e).with_context(|| format!("Step {index} at {} failed", step.at));
                }
                Err(e) => {
                    warn!(index, at = step.at, error = %e, "sim: step failed");
                    let record = json!({ "step": index, "at": step.at, "error": format!("{e:#}") });
                    self.output.push(record.to_string());
                }
            }
            for event in self.engine.drain_events() {
                self.output.push(serde_json::to_string(&event)?);
            }
        }
        Ok(self.output)
    }

    fn apply(&mut self, step: &Step) -> Result<Option<Value>> {
        let now = step.at;
        let engine = &mut self.engine;
        match &step.action {
            Action::Mint { token, account, amount } => {
                engine.tokens_mut().mint(token, account, *amount)?;
            }
            Action::Approve { token, owner, amount } => {
                let vault = *engine.vault();
                engine.tokens_mut().approve(token, owner, &vault, *amount);
            }
            Action::SetTransferFee { token, bps } => {
                if *bps > 10_000 {
                    bail!("transfer fee {bps} bps exceeds 100%");
                }
                engine.tokens_mut().set_transfer_fee_bps(token, *bps);
            }
            Action::Configure { caller } => {
                engine.configure(caller, self.config.clone(), now)?;
            }
            Action::Lock { account, amount, weeks } => {
                engine.lock(account, *amount, *weeks, now)?;
            }
            Action::Extend { account, amount, from_weeks, to_weeks } => {
                engine.extend_lock(account, *amount, *from_weeks, *to_weeks, now)?;
            }
            Action::Exit { account } => {
                engine.initiate_exit_stream(account, now)?;
            }
            Action::Withdraw { account } => {
                engine.withdraw_exit_stream(account, now)?;
            }
            Action::Deposit { depositor, token, amount } => {
                engine.deposit_fee(depositor, token, *amount, now)?;
            }
            Action::Claim { account, tokens } => {
                engine.claim(account, tokens, now)?;
            }
            Action::Query { account } => return Ok(Some(query(engine, account, now)?)),
            Action::Snapshot => {
                let bytes = engine.snapshot()?;
                let restored = Engine::restore(*engine.vault(), engine.tokens().clone(), &bytes)?;
                *engine = restored;
                return Ok(Some(json!({ "snapshot_bytes": bytes.len(), "at": now })));
            }
        }
        Ok(None)
    }
}

fn query(engine: &Engine<MemoryTokenLedger>, account: &Address, now: u64) -> Result<Value> {
    let epoch = engine.current_epoch(now)?;
    let locks = engine.lock_ledger()?;
    let fee_tokens = engine.fee_tokens()?.to_vec();
    let claimable = engine.claimable(account, &fee_tokens, now)?;
    let lock_token = engine.config()?.lock_token;

    let buckets: Vec<Value> = locks
        .lock_buckets(account, now)
        .iter()
        .map(|b| json!({ "weeks_to_unlock": b.weeks_to_unlock, "amount": b.amount.to_string() }))
        .collect();
    let fees: Vec<Value> = fee_tokens
        .iter()
        .zip(&claimable)
        .map(|(token, amount)| json!({ "token": token, "claimable": amount.to_string() }))
        .collect();
    Ok(json!({
        "query": account,
        "at": now,
        "epoch": epoch,
        "weight": locks.weight_of(account, now).to_string(),
        "total_weight": locks.total_weight(now).to_string(),
        "locked": locks.locked_balance(account, now).to_string(),
        "matured": locks.matured_balance(account, now).to_string(),
        "exit_withdrawable": locks.exit_stream_withdrawable(account, now).to_string(),
        "lock_token_balance": engine.tokens().balance_of(&lock_token, account).to_string(),
        "buckets": buckets,
        "fees": fees,
    }))
}
