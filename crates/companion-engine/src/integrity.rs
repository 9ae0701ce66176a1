//! Load-time integrity checks.
//!
//! Records written by older builds or edited by hand can carry values the
//! engine never produces. [`sanitize`] clamps them back into range and logs
//! every fault so that it shows up in operations dashboards.

use companion_types::{Companion, Vital};
use tracing::warn;

use crate::config::EngineConfig;

/// One clamped field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityFault {
    /// Name of the offending field.
    pub field: &'static str,
    /// Value found in the record.
    pub found: u64,
    /// Value written back.
    pub clamped_to: u64,
}

/// Clamp out-of-range fields in place and return what was fixed.
pub fn sanitize(companion: &mut Companion, config: &EngineConfig) -> Vec<IntegrityFault> {
    let mut faults = Vec::new();
    let max = config.vitals.max_vital;

    for (vital, value, bound) in [
        (Vital::Hunger, &mut companion.hunger, max),
        (Vital::Happiness, &mut companion.happiness, max),
        (Vital::Health, &mut companion.health, max),
        (Vital::Intimacy, &mut companion.intimacy, config.vitals.max_intimacy),
    ] {
        if *value > bound {
            faults.push(IntegrityFault {
                field: vital.as_str(),
                found: u64::from(*value),
                clamped_to: u64::from(bound),
            });
            *value = bound;
        }
    }

    if companion.level == 0 {
        faults.push(IntegrityFault {
            field: "level",
            found: 0,
            clamped_to: 1,
        });
        companion.level = 1;
    }

    let stages = config.progression.sub_stages_per_stage;
    if companion.sub_stage == 0 || companion.sub_stage > stages {
        let clamped = companion.sub_stage.max(1).min(stages.max(1));
        faults.push(IntegrityFault {
            field: "sub_stage",
            found: u64::from(companion.sub_stage),
            clamped_to: u64::from(clamped),
        });
        companion.sub_stage = clamped;
    }

    for fault in &faults {
        warn!(
            companion_id = %companion.id,
            field = fault.field,
            found = fault.found,
            clamped_to = fault.clamped_to,
            "integrity fault: value out of range"
        );
    }
    faults
}
