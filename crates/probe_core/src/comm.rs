//! Inter-probe communication: light-delayed messages, broadcast, beacons,
//! and relay satellites.
//!
//! Relays extend *reachability*, not propagation speed — the light-travel
//! delay always uses the direct line-of-sight distance.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::types::{Probe, Uid, Vec3, TICKS_PER_YEAR};

pub const MAX_MESSAGES: usize = 4096;
pub const MAX_BEACONS: usize = 256;
pub const MAX_RELAYS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageMode {
    Targeted,
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    InTransit,
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Uid,
    pub target: Uid,
    pub mode: MessageMode,
    pub content: String,
    pub sent_tick: u64,
    pub arrival_tick: u64,
    pub status: MessageStatus,
    /// Line-of-sight distance at send time.
    pub distance_ly: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    pub owner: Uid,
    pub system_id: Uid,
    pub position: Vec3,
    pub message: String,
    pub placed_tick: u64,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relay {
    pub owner: Uid,
    pub system_id: Uid,
    pub position: Vec3,
    pub built_tick: u64,
    pub active: bool,
    pub range_ly: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommSystem {
    pub messages: Vec<Message>,
    pub beacons: Vec<Beacon>,
    pub relays: Vec<Relay>,
}

/// Light delay in ticks: `round(distance · 365)` (1 ly = 1 year = 365 ticks).
pub fn light_delay_ticks(from: Vec3, to: Vec3) -> u64 {
    (from.dist(to) * TICKS_PER_YEAR as f64 + 0.5) as u64
}

impl CommSystem {
    /// Shortest relay-assisted path distance from `from` to `to`, or `None`
    /// if unreachable. `direct_range` is the sender's own comm range.
    pub fn relay_path_distance(&self, from: Vec3, to: Vec3, direct_range: f64) -> Option<f64> {
        let direct = from.dist(to);
        if direct <= direct_range {
            return Some(direct);
        }

        let n = self.relays.len();
        if n == 0 {
            return None;
        }

        // Dijkstra over the relay graph: the sender reaches a relay within
        // its own range; relay→relay and relay→target hops use the relay's
        // range.
        let mut dist_to = vec![None::<f64>; n];
        let mut visited = vec![false; n];
        for (i, relay) in self.relays.iter().enumerate() {
            if !relay.active {
                continue;
            }
            let d = from.dist(relay.position);
            if d <= direct_range {
                dist_to[i] = Some(d);
            }
        }

        for _ in 0..n {
            let mut best: Option<usize> = None;
            let mut best_dist = f64::INFINITY;
            for i in 0..n {
                if let Some(d) = dist_to[i] {
                    if !visited[i] && d < best_dist {
                        best = Some(i);
                        best_dist = d;
                    }
                }
            }
            let Some(best) = best else { break };
            visited[best] = true;

            let relay = &self.relays[best];
            let to_target = relay.position.dist(to);
            if to_target <= relay.range_ly {
                return Some(best_dist + to_target);
            }

            for (j, other) in self.relays.iter().enumerate() {
                if visited[j] || !other.active {
                    continue;
                }
                let hop = relay.position.dist(other.position);
                if hop <= relay.range_ly {
                    let candidate = best_dist + hop;
                    if dist_to[j].map_or(true, |d| candidate < d) {
                        dist_to[j] = Some(candidate);
                    }
                }
            }
        }

        None
    }

    /// Reachability check: direct range first, then the relay graph.
    pub fn reachable(&self, sender: &Probe, target_pos: Vec3) -> bool {
        self.relay_path_distance(sender.heading, target_pos, sender.comm_range_ly())
            .is_some()
    }

    /// Queue a targeted message. Deducts energy from the sender.
    pub fn send_targeted(
        &mut self,
        sender: &mut Probe,
        target: Uid,
        target_pos: Vec3,
        content: &str,
        current_tick: u64,
        config: &SimConfig,
    ) -> Result<u64, SimError> {
        if self.messages.len() >= MAX_MESSAGES {
            return Err(SimError::capacity("message queue full"));
        }
        if sender.energy_joules < config.message_energy_j {
            return Err(SimError::insufficient("insufficient energy to transmit"));
        }
        if !self.reachable(sender, target_pos) {
            return Err(SimError::precondition("target out of communication range"));
        }

        // Relays extend reachability; light still travels the direct path.
        let distance = sender.heading.dist(target_pos);
        let delay = light_delay_ticks(sender.heading, target_pos);
        sender.energy_joules -= config.message_energy_j;

        let arrival_tick = current_tick + delay;
        self.messages.push(Message {
            sender: sender.id,
            target,
            mode: MessageMode::Targeted,
            content: content.to_string(),
            sent_tick: current_tick,
            arrival_tick,
            status: MessageStatus::InTransit,
            distance_ly: distance,
        });
        Ok(arrival_tick)
    }

    /// Broadcast to every other probe within direct range (no relays).
    /// Energy is deducted once, up front. Returns the number queued.
    pub fn broadcast(
        &mut self,
        sender: &mut Probe,
        others: impl Iterator<Item = (Uid, Vec3)>,
        content: &str,
        current_tick: u64,
        config: &SimConfig,
    ) -> Result<usize, SimError> {
        if sender.energy_joules < config.broadcast_energy_j {
            return Err(SimError::insufficient("insufficient energy to broadcast"));
        }
        sender.energy_joules -= config.broadcast_energy_j;

        let range = sender.comm_range_ly();
        let mut queued = 0;
        for (target, pos) in others {
            if target == sender.id {
                continue;
            }
            let dist = sender.heading.dist(pos);
            if dist > range {
                continue;
            }
            if self.messages.len() >= MAX_MESSAGES {
                break;
            }
            self.messages.push(Message {
                sender: sender.id,
                target,
                mode: MessageMode::Broadcast,
                content: content.to_string(),
                sent_tick: current_tick,
                arrival_tick: current_tick + light_delay_ticks(sender.heading, pos),
                status: MessageStatus::InTransit,
                distance_ly: dist,
            });
            queued += 1;
        }
        Ok(queued)
    }

    /// Deliver every in-transit message whose arrival tick has passed.
    pub fn deliver_due(&mut self, current_tick: u64) -> usize {
        let mut delivered = 0;
        for message in &mut self.messages {
            if message.status == MessageStatus::InTransit && message.arrival_tick <= current_tick {
                message.status = MessageStatus::Delivered;
                delivered += 1;
            }
        }
        delivered
    }

    /// All delivered messages addressed to a probe.
    pub fn inbox(&self, probe_id: Uid) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.status == MessageStatus::Delivered && m.target == probe_id)
            .collect()
    }

    pub fn place_beacon(
        &mut self,
        owner: &Probe,
        message: &str,
        current_tick: u64,
    ) -> Result<(), SimError> {
        if self.beacons.len() >= MAX_BEACONS {
            return Err(SimError::capacity("beacon table full"));
        }
        self.beacons.push(Beacon {
            owner: owner.id,
            system_id: owner.system_id,
            position: owner.heading,
            message: message.to_string(),
            placed_tick: current_tick,
            active: true,
        });
        Ok(())
    }

    pub fn detect_beacons(&self, system_id: Uid) -> Vec<&Beacon> {
        self.beacons
            .iter()
            .filter(|b| b.active && b.system_id == system_id)
            .collect()
    }

    pub fn deactivate_beacon(&mut self, owner: Uid, system_id: Uid) -> Result<(), SimError> {
        let Some(beacon) = self
            .beacons
            .iter_mut()
            .find(|b| b.active && b.owner == owner && b.system_id == system_id)
        else {
            return Err(SimError::not_found("no active beacon to deactivate"));
        };
        beacon.active = false;
        Ok(())
    }

    /// Build a relay at a position (direct build or promoted structure).
    pub fn add_relay(
        &mut self,
        owner: Uid,
        system_id: Uid,
        position: Vec3,
        current_tick: u64,
        config: &SimConfig,
    ) -> Result<(), SimError> {
        if self.relays.len() >= MAX_RELAYS {
            return Err(SimError::capacity("relay table full"));
        }
        self.relays.push(Relay {
            owner,
            system_id,
            position,
            built_tick: current_tick,
            active: true,
            range_ly: config.relay_range_ly,
        });
        Ok(())
    }
}
