//! Feature bits negotiated in the `init` message.
//!
//! Features come in pairs: the even bit means the sender requires the
//! feature, the odd bit means it merely supports it ("it's OK to be odd").

use serde::{Deserialize, Serialize};

/// Init features understood by the gossip layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitFeature {
    /// Channel reestablish carries data-loss-protect fields.
    OptionDataLossProtect,
    /// Sender wants a full routing table dump on connect (odd bit only).
    InitialRoutingSync,
    /// Commits to a shutdown script at channel open.
    OptionUpfrontShutdownScript,
    /// Supports the gossip query messages.
    GossipQueries,
    /// Supports variable-size onion payloads.
    VarOnionOptin,
    /// Supports the extended gossip query fields.
    GossipQueriesEx,
    /// Static key for the remote output.
    OptionStaticRemoteKey,
}

impl InitFeature {
    /// The even ("required") bit of the feature pair.
    pub fn required_bit(self) -> usize {
        match self {
            InitFeature::OptionDataLossProtect => 0,
            InitFeature::InitialRoutingSync => 2,
            InitFeature::OptionUpfrontShutdownScript => 4,
            InitFeature::GossipQueries => 6,
            InitFeature::VarOnionOptin => 8,
            InitFeature::GossipQueriesEx => 10,
            InitFeature::OptionStaticRemoteKey => 12,
        }
    }

    /// The odd ("optional") bit of the feature pair.
    pub fn optional_bit(self) -> usize {
        self.required_bit() + 1
    }
}

/// Whether a feature is demanded or only offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureRequirement {
    /// Even bit.
    Required,
    /// Odd bit.
    Optional,
}

/// A set of feature bits.
///
/// Stored little-endian by byte (bit 0 is the lowest bit of `bits[0]`). The
/// wire form is big-endian; see [`FeatureFlags::from_wire`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    bits: Vec<u8>,
}

impl FeatureFlags {
    /// Create an empty feature set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the big-endian wire form.
    pub fn from_wire(bytes: &[u8]) -> Self {
        Self {
            bits: bytes.iter().rev().copied().collect(),
        }
    }

    /// Encode to the big-endian wire form, without leading zero bytes.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out: Vec<u8> = self.bits.iter().rev().copied().collect();
        let leading = out.iter().take_while(|b| **b == 0).count();
        out.drain(..leading);
        out
    }

    /// Check whether a raw bit is set.
    pub fn is_set(&self, bit: usize) -> bool {
        self.bits
            .get(bit / 8)
            .map(|byte| byte & (1 << (bit % 8)) != 0)
            .unwrap_or(false)
    }

    /// Set a raw bit.
    pub fn set(&mut self, bit: usize) {
        let index = bit / 8;
        if self.bits.len() <= index {
            self.bits.resize(index + 1, 0);
        }
        self.bits[index] |= 1 << (bit % 8);
    }

    /// Builder form of [`FeatureFlags::set_feature`].
    pub fn with(mut self, feature: InitFeature, requirement: FeatureRequirement) -> Self {
        self.set_feature(feature, requirement);
        self
    }

    /// Set the required or optional bit of a feature.
    pub fn set_feature(&mut self, feature: InitFeature, requirement: FeatureRequirement) {
        match requirement {
            FeatureRequirement::Required => self.set(feature.required_bit()),
            FeatureRequirement::Optional => self.set(feature.optional_bit()),
        }
    }

    /// True if either bit of the feature pair is set.
    pub fn supports(&self, feature: InitFeature) -> bool {
        self.is_set(feature.required_bit()) || self.is_set(feature.optional_bit())
    }

    /// How the feature is signalled, if at all. The required bit wins.
    pub fn requirement(&self, feature: InitFeature) -> Option<FeatureRequirement> {
        if self.is_set(feature.required_bit()) {
            Some(FeatureRequirement::Required)
        } else if self.is_set(feature.optional_bit()) {
            Some(FeatureRequirement::Optional)
        } else {
            None
        }
    }
}
