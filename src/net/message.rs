//! Wire messages exchanged with the game server
//!
//! Both directions carry one JSON record per line. Every field of a
//! request is optional and only serialized when that intent is sent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{IgniteError, Result};
use crate::core::types::{ObjectId, Position};
use crate::world::ModuleData;

/// Record delimiter appended to every outbound frame
pub const FRAME_DELIMITER: &str = "\r\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub id: String,
    pub pass: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Move {
    pub object_id: String,
    pub object_serial: String,
    pub pos_x: f32,
    pub pos_y: f32,
}

/// Target change; empty target fields clear the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Target {
    pub object_id: String,
    pub object_serial: String,
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub target_serial: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Use {
    pub user_id: String,
    pub user_serial: String,
    pub object_id: String,
    #[serde(default)]
    pub object_serial: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Chat {
    pub object_id: String,
    pub object_serial: String,
    pub text: String,
    #[serde(default)]
    pub translated: bool,
}

/// Outbound request (client intents)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub login: Vec<Login>,
    #[serde(rename = "move", default, skip_serializing_if = "Vec::is_empty")]
    pub moves: Vec<Move>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<Target>,
    #[serde(rename = "use", default, skip_serializing_if = "Vec::is_empty")]
    pub uses: Vec<Use>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat: Vec<Chat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<u64>,
}

impl Request {
    pub fn login(id: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            login: vec![Login {
                id: id.into(),
                pass: pass.into(),
            }],
            ..Default::default()
        }
    }

    pub fn move_to(object: &ObjectId, pos: Position) -> Self {
        Self {
            moves: vec![Move {
                object_id: object.id.clone(),
                object_serial: object.serial.clone(),
                pos_x: pos.x,
                pos_y: pos.y,
            }],
            ..Default::default()
        }
    }

    pub fn target(object: &ObjectId, target: Option<&ObjectId>) -> Self {
        let (target_id, target_serial) = target
            .map(|t| (t.id.clone(), t.serial.clone()))
            .unwrap_or_default();
        Self {
            target: vec![Target {
                object_id: object.id.clone(),
                object_serial: object.serial.clone(),
                target_id,
                target_serial,
            }],
            ..Default::default()
        }
    }

    pub fn use_object(user: &ObjectId, object: &ObjectId) -> Self {
        Self {
            uses: vec![Use {
                user_id: user.id.clone(),
                user_serial: user.serial.clone(),
                object_id: object.id.clone(),
                object_serial: object.serial.clone(),
            }],
            ..Default::default()
        }
    }

    pub fn chat(object: &ObjectId, text: impl Into<String>) -> Self {
        Self {
            chat: vec![Chat {
                object_id: object.id.clone(),
                object_serial: object.serial.clone(),
                text: text.into(),
                translated: false,
            }],
            ..Default::default()
        }
    }

    pub fn accept(trade_id: u64) -> Self {
        Self {
            accept: vec![trade_id],
            ..Default::default()
        }
    }

    /// True for the bare request that asks the server for an update push
    pub fn is_empty(&self) -> bool {
        self.login.is_empty()
            && self.moves.is_empty()
            && self.target.is_empty()
            && self.uses.is_empty()
            && self.chat.is_empty()
            && self.accept.is_empty()
    }

    /// Encode into one delimited frame
    pub fn encode(&self) -> Result<String> {
        let mut text = serde_json::to_string(self)?;
        text.push_str(FRAME_DELIMITER);
        Ok(text)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub module: ModuleData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRef {
    pub id: String,
    pub serial: String,
}

impl CharacterRef {
    pub fn object_id(&self) -> ObjectId {
        ObjectId::new(self.id.clone(), self.serial.clone())
    }
}

/// Trade offer between two characters
///
/// `items_buy` are the seller's items the buyer is asked to pay for;
/// `items_sell` are the buyer's items offered in exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeProposal {
    pub id: u64,
    #[serde(rename = "sellerID")]
    pub seller_id: String,
    pub seller_serial: String,
    #[serde(rename = "buyerID")]
    pub buyer_id: String,
    pub buyer_serial: String,
    #[serde(default)]
    pub items_buy: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub items_sell: BTreeMap<String, Vec<String>>,
}

impl TradeProposal {
    pub fn seller(&self) -> ObjectId {
        ObjectId::new(self.seller_id.clone(), self.seller_serial.clone())
    }

    pub fn buyer(&self) -> ObjectId {
        ObjectId::new(self.buyer_id.clone(), self.buyer_serial.clone())
    }
}

/// Inbound push from the server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    pub logon: bool,
    pub update: Option<Update>,
    /// Full set of characters this client controls, when present
    pub character: Option<Vec<CharacterRef>>,
    pub trade: Vec<TradeProposal>,
    pub error: Vec<String>,
    pub paused: Option<bool>,
}

impl Response {
    /// Decode one frame, delimiter already stripped
    pub fn decode(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| IgniteError::Decode(e.to_string()))
    }
}
