use serde::Deserialize;
use serde::Serialize;

use crate::effective_dated;
use crate::test::key::FareKey;
use crate::types::Date;

/// A trimmed down fare rule row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FareRule {
    pub vendor:           String,
    pub rule_tariff:      u32,
    pub rule:             String,
    pub seq_no:           u32,
    pub create_date:      Date,
    pub expire_date:      Date,
    pub effective_date:   Date,
    pub discontinue_date: Date,
    pub inhibited:        bool,
}

effective_dated!(FareRule {
    create: create_date,
    expire: expire_date,
    effective: effective_date,
    discontinue: discontinue_date,
    inhibit: inhibited,
});

impl FareRule {
    /// A rule valid and usable within `[create, expire]`.
    pub fn new(key: &FareKey, seq_no: u32, create: Date, expire: Date) -> Self {
        Self {
            vendor: key.vendor.clone(),
            rule_tariff: key.rule_tariff,
            rule: key.rule.clone(),
            seq_no,
            create_date: create,
            expire_date: expire,
            effective_date: create,
            discontinue_date: expire,
            inhibited: false,
        }
    }

    pub fn with_usage(mut self, effective: Date, discontinue: Date) -> Self {
        self.effective_date = effective;
        self.discontinue_date = discontinue;
        self
    }

    pub fn inhibit(mut self) -> Self {
        self.inhibited = true;
        self
    }

    pub fn key(&self) -> FareKey {
        FareKey::new(self.vendor.clone(), self.rule_tariff, self.rule.clone())
    }
}
