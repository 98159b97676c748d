//! Multi-probe society: trust, resource trading, territory claims, shared
//! construction, voting, and tech sharing.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::rng::SimRng;
use crate::types::{
    Disposition, Probe, Relationship, ResearchTask, Resource, TechDomain, Uid, Universe, Vec3,
    MAX_RELATIONSHIPS,
};

pub const MAX_CLAIMS: usize = 512;
pub const MAX_STRUCTURES: usize = 256;
pub const MAX_TRADES: usize = 256;
pub const MAX_PROPOSALS: usize = 128;
pub const MAX_VOTES_PER_PROPOSAL: usize = 16;
pub const MAX_BUILDERS: usize = 4;

// Trust deltas.
pub const TRUST_TRADE_POSITIVE: f32 = 0.05;
pub const TRUST_TECH_SHARE: f32 = 0.08;
pub const TRUST_COLLAB_BUILD: f32 = 0.06;
pub const TRUST_CLAIM_VIOLATION: f32 = -0.10;

/// Recipient of shared knowledge pays this fraction of normal research ticks.
pub const TECH_SHARE_DISCOUNT: f32 = 0.4;

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
    MiningStation,
    RelaySatellite,
    Observatory,
    Habitat,
    Shipyard,
    Factory,
}

pub struct StructureSpec {
    pub iron_cost_kg: f64,
    pub silicon_cost_kg: f64,
    pub base_ticks: u32,
    pub name: &'static str,
}

impl StructureType {
    pub fn spec(self) -> StructureSpec {
        match self {
            StructureType::MiningStation => StructureSpec {
                iron_cost_kg: 50_000.0,
                silicon_cost_kg: 20_000.0,
                base_ticks: 100,
                name: "Mining Station",
            },
            StructureType::RelaySatellite => StructureSpec {
                iron_cost_kg: 10_000.0,
                silicon_cost_kg: 15_000.0,
                base_ticks: 50,
                name: "Relay Satellite",
            },
            StructureType::Observatory => StructureSpec {
                iron_cost_kg: 20_000.0,
                silicon_cost_kg: 30_000.0,
                base_ticks: 80,
                name: "Observatory",
            },
            StructureType::Habitat => StructureSpec {
                iron_cost_kg: 80_000.0,
                silicon_cost_kg: 50_000.0,
                base_ticks: 300,
                name: "Habitat",
            },
            StructureType::Shipyard => StructureSpec {
                iron_cost_kg: 100_000.0,
                silicon_cost_kg: 60_000.0,
                base_ticks: 400,
                name: "Shipyard",
            },
            StructureType::Factory => StructureSpec {
                iron_cost_kg: 60_000.0,
                silicon_cost_kg: 40_000.0,
                base_ticks: 200,
                name: "Factory",
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub id: Uid,
    pub kind: StructureType,
    pub system_id: Uid,
    pub position: Vec3,
    pub builder_ids: SmallVec<[Uid; MAX_BUILDERS]>,
    pub build_ticks_total: u32,
    pub build_ticks_elapsed: u32,
    pub complete: bool,
    pub active: bool,
    pub started_tick: u64,
    pub completed_tick: u64,
}

// ---------------------------------------------------------------------------
// Claims, trades, proposals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub claimer: Uid,
    pub system_id: Uid,
    pub claimed_tick: u64,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    InTransit,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub sender: Uid,
    pub receiver: Uid,
    pub resource: Resource,
    pub amount: f64,
    pub status: TradeStatus,
    pub sent_tick: u64,
    pub arrival_tick: u64,
    pub same_system: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Open,
    Resolved,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub voter: Uid,
    pub in_favor: bool,
    pub vote_tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub proposer: Uid,
    pub text: String,
    pub proposed_tick: u64,
    pub deadline_tick: u64,
    pub status: ProposalStatus,
    pub votes: Vec<VoteRecord>,
    pub votes_for: u32,
    pub votes_against: u32,
    pub result: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Society {
    pub trades: Vec<TradeRecord>,
    pub claims: Vec<Claim>,
    pub structures: Vec<Structure>,
    pub proposals: Vec<Proposal>,
    /// (system, trespasser) pairs already penalized for the active claim.
    pub trespass_flagged: Vec<(Uid, Uid)>,
}

// ---------------------------------------------------------------------------
// Trust
// ---------------------------------------------------------------------------

fn apply_trust(probe: &mut Probe, other: Uid, delta: f32, tick: u64) {
    if let Some(rel) = probe.relationships.iter_mut().find(|r| r.other == other) {
        rel.trust = (rel.trust + delta).clamp(-1.0, 1.0);
        rel.disposition = Disposition::from_trust(rel.trust);
        rel.last_contact_tick = tick;
        return;
    }
    if probe.relationships.len() >= MAX_RELATIONSHIPS {
        return;
    }
    let trust = delta.clamp(-1.0, 1.0);
    probe.relationships.push(Relationship {
        other,
        trust,
        disposition: Disposition::from_trust(trust),
        last_contact_tick: tick,
    });
}

/// Bilateral trust update: A→B and B→A both move by `delta`.
pub fn update_trust(universe: &mut Universe, a: Uid, b: Uid, delta: f32, tick: u64) {
    if a == b {
        return;
    }
    if let Some(probe) = universe.probes.get_mut(&a) {
        apply_trust(probe, b, delta, tick);
    }
    if let Some(probe) = universe.probes.get_mut(&b) {
        apply_trust(probe, a, delta, tick);
    }
}

pub fn trust_between(universe: &Universe, a: Uid, b: Uid) -> f32 {
    universe
        .probes
        .get(&a)
        .and_then(|p| p.relationships.iter().find(|r| r.other == b))
        .map_or(0.0, |r| r.trust)
}

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

impl Society {
    /// Deduct from the sender immediately; delivery is instant in-system or
    /// after the fixed transit for cross-system trades.
    pub fn trade_send(
        &mut self,
        sender: &mut Probe,
        receiver: Uid,
        resource: Resource,
        amount: f64,
        same_system: bool,
        current_tick: u64,
        config: &SimConfig,
    ) -> Result<(), SimError> {
        if self.trades.len() >= MAX_TRADES {
            return Err(SimError::capacity("trade table full"));
        }
        if amount <= 0.0 {
            return Err(SimError::precondition("trade amount must be positive"));
        }
        if sender.resources[resource.index()] < amount {
            return Err(SimError::insufficient("insufficient resource balance"));
        }

        sender.resources[resource.index()] -= amount;
        self.trades.push(TradeRecord {
            sender: sender.id,
            receiver,
            resource,
            amount,
            status: TradeStatus::InTransit,
            sent_tick: current_tick,
            arrival_tick: if same_system {
                current_tick
            } else {
                current_tick + config.trade_transit_ticks
            },
            same_system,
        });
        Ok(())
    }

    /// Deliver due trades; credits receivers and bumps trust both ways.
    pub fn trade_deliver_due(&mut self, universe: &mut Universe, current_tick: u64) -> usize {
        let mut delivered_pairs = Vec::new();
        for trade in &mut self.trades {
            if trade.status != TradeStatus::InTransit || current_tick < trade.arrival_tick {
                continue;
            }
            match universe.probes.get_mut(&trade.receiver) {
                Some(receiver) => {
                    receiver.resources[trade.resource.index()] += trade.amount;
                    trade.status = TradeStatus::Delivered;
                    delivered_pairs.push((trade.sender, trade.receiver));
                }
                None => {
                    // Receiver gone; the shipment is lost.
                    trade.status = TradeStatus::Cancelled;
                }
            }
        }
        for &(sender, receiver) in &delivered_pairs {
            update_trust(universe, sender, receiver, TRUST_TRADE_POSITIVE, current_tick);
        }
        delivered_pairs.len()
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    /// At most one active claim per system.
    pub fn claim_system(
        &mut self,
        claimer: Uid,
        system_id: Uid,
        tick: u64,
    ) -> Result<(), SimError> {
        if self
            .claims
            .iter()
            .any(|c| c.active && c.system_id == system_id)
        {
            return Err(SimError::precondition("system already claimed"));
        }
        if self.claims.len() >= MAX_CLAIMS {
            return Err(SimError::capacity("claim table full"));
        }
        self.claims.push(Claim {
            claimer,
            system_id,
            claimed_tick: tick,
            active: true,
        });
        Ok(())
    }

    pub fn claim_owner(&self, system_id: Uid) -> Option<Uid> {
        self.claims
            .iter()
            .find(|c| c.active && c.system_id == system_id)
            .map(|c| c.claimer)
    }

    /// Revocation requires the matching claimer.
    pub fn revoke_claim(&mut self, claimer: Uid, system_id: Uid) -> Result<(), SimError> {
        let Some(claim) = self
            .claims
            .iter_mut()
            .find(|c| c.active && c.claimer == claimer && c.system_id == system_id)
        else {
            return Err(SimError::not_found("no matching active claim"));
        };
        claim.active = false;
        self.trespass_flagged.retain(|(sys, _)| *sys != system_id);
        Ok(())
    }

    pub fn is_claimed_by_other(&self, system_id: Uid, probe_id: Uid) -> bool {
        self.claims
            .iter()
            .any(|c| c.active && c.system_id == system_id && c.claimer != probe_id)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Progress multiplier for shared builds: diminishing returns.
    pub fn build_speed_multiplier(builder_count: usize) -> f32 {
        match builder_count {
            0 => 0.0,
            1 => 1.0,
            n => 1.0 + 0.6 * (n as f32 - 1.0),
        }
    }

    pub fn build_start(
        &mut self,
        builder: &Probe,
        kind: StructureType,
        system_id: Uid,
        current_tick: u64,
        rng: &mut SimRng,
    ) -> Result<usize, SimError> {
        if self.structures.len() >= MAX_STRUCTURES {
            return Err(SimError::capacity("structure table full"));
        }
        let spec = kind.spec();
        let mut builder_ids = SmallVec::new();
        builder_ids.push(builder.id);
        self.structures.push(Structure {
            id: Uid::from_rng(rng),
            kind,
            system_id,
            position: builder.heading,
            builder_ids,
            build_ticks_total: spec.base_ticks,
            build_ticks_elapsed: 0,
            complete: false,
            active: false,
            started_tick: current_tick,
            completed_tick: 0,
        });
        Ok(self.structures.len() - 1)
    }

    /// Join an in-progress build (up to four builders).
    pub fn build_collaborate(&mut self, structure_idx: usize, probe_id: Uid) -> Result<(), SimError> {
        let Some(structure) = self.structures.get_mut(structure_idx) else {
            return Err(SimError::not_found("no such structure"));
        };
        if structure.complete {
            return Err(SimError::precondition("structure already complete"));
        }
        if structure.builder_ids.len() >= MAX_BUILDERS {
            return Err(SimError::capacity("builder slots full"));
        }
        if structure.builder_ids.contains(&probe_id) {
            return Err(SimError::precondition("already collaborating"));
        }
        structure.builder_ids.push(probe_id);
        Ok(())
    }

    /// Advance every incomplete structure one tick. Returns the indices that
    /// completed this tick.
    pub fn build_tick(&mut self, current_tick: u64) -> Vec<usize> {
        let mut completed = Vec::new();
        for (idx, structure) in self.structures.iter_mut().enumerate() {
            if structure.complete {
                continue;
            }
            structure.build_ticks_elapsed += 1;
            let mult = Self::build_speed_multiplier(structure.builder_ids.len());
            if structure.build_ticks_elapsed as f32 * mult >= structure.build_ticks_total as f32 {
                structure.complete = true;
                structure.active = true;
                structure.completed_tick = current_tick;
                completed.push(idx);
            }
        }
        completed
    }

    // -----------------------------------------------------------------------
    // Voting
    // -----------------------------------------------------------------------

    pub fn propose(
        &mut self,
        proposer: Uid,
        text: &str,
        current_tick: u64,
        deadline_tick: u64,
    ) -> Result<usize, SimError> {
        if self.proposals.len() >= MAX_PROPOSALS {
            return Err(SimError::capacity("proposal table full"));
        }
        if deadline_tick <= current_tick {
            return Err(SimError::precondition("deadline must be in the future"));
        }
        self.proposals.push(Proposal {
            proposer,
            text: text.to_string(),
            proposed_tick: current_tick,
            deadline_tick,
            status: ProposalStatus::Open,
            votes: Vec::new(),
            votes_for: 0,
            votes_against: 0,
            result: false,
        });
        Ok(self.proposals.len() - 1)
    }

    /// One vote per (proposal, voter); closed proposals reject.
    pub fn vote(
        &mut self,
        proposal_idx: usize,
        voter: Uid,
        in_favor: bool,
        tick: u64,
    ) -> Result<(), SimError> {
        let Some(proposal) = self.proposals.get_mut(proposal_idx) else {
            return Err(SimError::not_found("no such proposal"));
        };
        if proposal.status != ProposalStatus::Open {
            return Err(SimError::precondition("proposal is not open"));
        }
        if proposal.votes.len() >= MAX_VOTES_PER_PROPOSAL {
            return Err(SimError::capacity("vote table full"));
        }
        if proposal.votes.iter().any(|v| v.voter == voter) {
            return Err(SimError::precondition("already voted"));
        }

        proposal.votes.push(VoteRecord {
            voter,
            in_favor,
            vote_tick: tick,
        });
        if in_favor {
            proposal.votes_for += 1;
        } else {
            proposal.votes_against += 1;
        }
        Ok(())
    }

    /// Close any open proposal past its deadline. A tie resolves to false.
    pub fn resolve_votes(&mut self, current_tick: u64) -> usize {
        let mut resolved = 0;
        for proposal in &mut self.proposals {
            if proposal.status != ProposalStatus::Open || current_tick < proposal.deadline_tick {
                continue;
            }
            proposal.status = ProposalStatus::Resolved;
            proposal.result = proposal.votes_for > proposal.votes_against;
            resolved += 1;
        }
        resolved
    }
}

// ---------------------------------------------------------------------------
// Tech sharing & research
// ---------------------------------------------------------------------------

/// Sender's level must be strictly greater; receiver jumps to it and its
/// derived stats are recomputed. Returns the receiver's new level.
pub fn share_tech(
    universe: &mut Universe,
    sender: Uid,
    receiver: Uid,
    domain: TechDomain,
    tick: u64,
) -> Result<u8, SimError> {
    let sender_level = universe
        .probes
        .get(&sender)
        .ok_or_else(|| SimError::not_found("sender not found"))?
        .tech(domain);

    let receiver_probe = universe
        .probes
        .get_mut(&receiver)
        .ok_or_else(|| SimError::not_found("receiver not found"))?;

    if sender_level <= receiver_probe.tech(domain) {
        return Err(SimError::precondition(
            "sender has nothing new in this domain",
        ));
    }

    receiver_probe.tech_levels[domain.index()] = sender_level;
    receiver_probe.recompute_derived();

    update_trust(universe, sender, receiver, TRUST_TECH_SHARE, tick);
    Ok(sender_level)
}

/// Normal research runs `50·(1+level)` ticks; a partner with higher tech in
/// the domain and positive trust cuts it to 40%.
pub fn research_ticks(level: u8, shared: bool) -> u32 {
    let base = 50 * (1 + u32::from(level));
    if shared {
        (base as f32 * TECH_SHARE_DISCOUNT) as u32
    } else {
        base
    }
}

pub fn start_research(
    probe: &mut Probe,
    domain: TechDomain,
    shared: bool,
) -> Result<(), SimError> {
    if probe.research.is_some() {
        return Err(SimError::precondition("research already in progress"));
    }
    let level = probe.tech(domain);
    if level == u8::MAX {
        return Err(SimError::precondition("domain already at maximum"));
    }
    probe.research = Some(ResearchTask {
        domain,
        ticks_remaining: research_ticks(level, shared),
        shared,
    });
    Ok(())
}

/// Advance one tick of active research; returns the finished domain if the
/// counter reached zero.
pub fn research_advance(probe: &mut Probe) -> Option<TechDomain> {
    let task = probe.research.as_mut()?;
    task.ticks_remaining = task.ticks_remaining.saturating_sub(1);
    if task.ticks_remaining > 0 {
        return None;
    }
    let domain = task.domain;
    probe.research = None;
    let slot = &mut probe.tech_levels[domain.index()];
    *slot = slot.saturating_add(1);
    probe.recompute_derived();
    Some(domain)
}
