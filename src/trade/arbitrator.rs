use std::collections::{BTreeMap, VecDeque};

use ahash::AHashMap;
use thiserror::Error;

use crate::core::error::IgniteError;
use crate::core::types::ObjectId;
use crate::net::{IntentSink, Request, TradeProposal};
use crate::world::{Character, EntityKind, WorldView};

#[derive(Error, Debug)]
pub enum TradeError {
    #[error("Trade party not found: {0}")]
    PartyNotFound(ObjectId),

    #[error("Trade party is not a character: {0}")]
    NotACharacter(ObjectId),

    #[error("Unable to send accept request: {0}")]
    Send(#[source] IgniteError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDecision {
    Accept,
    Reject,
}

/// Validates trade proposals and confirms acceptable ones
///
/// Decisions are remembered by proposal id so a redelivered proposal is
/// never accepted twice. Only the most recent `memory` ids are kept.
#[derive(Debug)]
pub struct TradeArbitrator {
    decided: AHashMap<u64, TradeDecision>,
    order: VecDeque<u64>,
    memory: usize,
}

impl TradeArbitrator {
    pub fn new(memory: usize) -> Self {
        Self {
            decided: AHashMap::new(),
            order: VecDeque::new(),
            memory: memory.max(1),
        }
    }

    /// Decide on a proposal and, on accept, post the accept intent
    ///
    /// Without a sink the decision is made but nothing is sent.
    pub fn evaluate(
        &mut self,
        proposal: &TradeProposal,
        world: &dyn WorldView,
        sink: Option<&dyn IntentSink>,
    ) -> Result<TradeDecision, TradeError> {
        if let Some(&decision) = self.decided.get(&proposal.id) {
            tracing::debug!(trade = proposal.id, ?decision, "trade already decided");
            return Ok(decision);
        }

        let seller = party(world, &proposal.seller())?;
        let buyer = party(world, &proposal.buyer())?;

        let buy_value = total_value(world, seller, &proposal.items_buy);
        let sell_value = total_value(world, buyer, &proposal.items_sell);
        let decision = if sell_value >= buy_value {
            TradeDecision::Accept
        } else {
            TradeDecision::Reject
        };
        tracing::debug!(trade = proposal.id, buy_value, sell_value, ?decision, "trade evaluated");

        if decision == TradeDecision::Accept {
            if let Some(sink) = sink {
                sink.post(Request::accept(proposal.id)).map_err(TradeError::Send)?;
            }
        }
        self.remember(proposal.id, decision);
        Ok(decision)
    }

    #[cfg(test)]
    fn is_decided(&self, trade_id: u64) -> bool {
        self.decided.contains_key(&trade_id)
    }

    fn remember(&mut self, trade_id: u64, decision: TradeDecision) {
        if self.decided.insert(trade_id, decision).is_none() {
            self.order.push_back(trade_id);
        }
        while self.order.len() > self.memory {
            if let Some(old) = self.order.pop_front() {
                self.decided.remove(&old);
            }
        }
    }
}

impl Default for TradeArbitrator {
    fn default() -> Self {
        Self::new(1024)
    }
}

fn party<'w>(world: &'w dyn WorldView, id: &ObjectId) -> Result<&'w Character, TradeError> {
    match world.kind_of(id) {
        Some(EntityKind::Character) => {
            world.resolve(id).ok_or_else(|| TradeError::PartyNotFound(id.clone()))
        }
        Some(EntityKind::Object) => Err(TradeError::NotACharacter(id.clone())),
        None => Err(TradeError::PartyNotFound(id.clone())),
    }
}

/// Sum of item values in `owner`'s inventory; unknown items count as zero
///
/// Saturates instead of overflowing on extreme server values.
fn total_value(world: &dyn WorldView, owner: &Character, items: &BTreeMap<String, Vec<String>>) -> u64 {
    items
        .iter()
        .flat_map(|(id, serials)| serials.iter().map(move |serial| ObjectId::new(id.clone(), serial.clone())))
        .filter_map(|item| world.item_value(owner, &item))
        .fold(0u64, u64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::RecordingSink;
    use crate::world::{Item, ModuleData, WorldObject, WorldSnapshot};

    fn world() -> WorldSnapshot {
        WorldSnapshot::new(world_data())
    }

    fn world_data() -> ModuleData {
        let mut seller = Character::new("merchant", "0");
        seller.inventory.add(Item::new("sword", "1", 50));
        let mut buyer = Character::new("player", "0");
        buyer.inventory.add(Item::new("gem", "1", 60));
        buyer.inventory.add(Item::new("coin", "1", 40));
        ModuleData {
            id: "m".into(),
            characters: vec![seller, buyer],
            objects: vec![WorldObject {
                id: "chest".into(),
                serial: "0".into(),
                area: String::new(),
                position: Default::default(),
            }],
        }
    }

    fn proposal(id: u64, sell: &str) -> TradeProposal {
        TradeProposal {
            id,
            seller_id: "merchant".into(),
            seller_serial: "0".into(),
            buyer_id: "player".into(),
            buyer_serial: "0".into(),
            items_buy: BTreeMap::from([("sword".to_string(), vec!["1".to_string()])]),
            items_sell: BTreeMap::from([(sell.to_string(), vec!["1".to_string()])]),
        }
    }

    #[test]
    fn test_accepts_when_offer_covers_price() {
        let sink = RecordingSink::new();
        let mut arb = TradeArbitrator::default();
        let decision = arb.evaluate(&proposal(7, "gem"), &world(), Some(&sink)).unwrap();
        assert_eq!(decision, TradeDecision::Accept);
        assert_eq!(sink.take(), vec![Request::accept(7)]);
    }

    #[test]
    fn test_rejects_silently_when_offer_is_short() {
        let sink = RecordingSink::new();
        let mut arb = TradeArbitrator::default();
        let decision = arb.evaluate(&proposal(8, "coin"), &world(), Some(&sink)).unwrap();
        assert_eq!(decision, TradeDecision::Reject);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_unknown_items_are_worth_nothing() {
        let mut arb = TradeArbitrator::default();
        let mut p = proposal(9, "gem");
        p.items_buy.insert("phantom".into(), vec!["1".into()]);
        p.items_sell.insert("gem".into(), vec!["1".into(), "99".into()]);
        assert_eq!(arb.evaluate(&p, &world(), None).unwrap(), TradeDecision::Accept);
    }

    #[test]
    fn test_equal_values_are_accepted() {
        let mut arb = TradeArbitrator::default();
        let mut w = world_data();
        w.characters[1].inventory.add(Item::new("ring", "1", 50));
        let decision = arb.evaluate(&proposal(13, "ring"), &WorldSnapshot::new(w), None).unwrap();
        assert_eq!(decision, TradeDecision::Accept);
    }

    #[test]
    fn test_huge_values_saturate() {
        let mut w = world_data();
        w.characters[0].inventory.add(Item::new("crown", "1", u64::MAX));
        w.characters[0].inventory.add(Item::new("crown", "2", 1));
        let world = WorldSnapshot::new(w);
        let mut p = proposal(14, "gem");
        p.items_buy = BTreeMap::from([("crown".to_string(), vec!["1".to_string(), "2".to_string()])]);

        let mut arb = TradeArbitrator::default();
        assert_eq!(arb.evaluate(&p, &world, None).unwrap(), TradeDecision::Reject);
    }

    #[test]
    fn test_missing_party() {
        let mut arb = TradeArbitrator::default();
        let mut p = proposal(10, "gem");
        p.buyer_id = "nobody".into();
        assert!(matches!(arb.evaluate(&p, &world(), None), Err(TradeError::PartyNotFound(_))));
        assert!(!arb.is_decided(10));
    }

    #[test]
    fn test_object_party_is_not_a_character() {
        let mut arb = TradeArbitrator::default();
        let mut p = proposal(11, "gem");
        p.seller_id = "chest".into();
        assert!(matches!(arb.evaluate(&p, &world(), None), Err(TradeError::NotACharacter(_))));
    }

    #[test]
    fn test_redelivery_does_not_accept_twice() {
        let sink = RecordingSink::new();
        let mut arb = TradeArbitrator::default();
        let p = proposal(12, "gem");
        arb.evaluate(&p, &world(), Some(&sink)).unwrap();
        arb.evaluate(&p, &world(), Some(&sink)).unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_memory_is_bounded() {
        let mut arb = TradeArbitrator::new(2);
        for id in 0..3 {
            arb.evaluate(&proposal(id, "gem"), &world(), None).unwrap();
        }
        assert!(!arb.is_decided(0));
        assert!(arb.is_decided(1));
        assert!(arb.is_decided(2));
    }
}
