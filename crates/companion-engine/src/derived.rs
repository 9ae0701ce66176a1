//! Health derived from hunger.
//!
//! A starving companion's health is capped by how far hunger has fallen
//! below the health threshold. The rule only ever lowers health; feeding
//! raises it through the action effects.

use companion_types::Companion;
use tracing::debug;

use crate::config::VitalsConfig;

/// Health ceiling imposed by the given hunger, if hunger is below the
/// threshold.
///
/// `max(1, max_vital / 2 - (threshold - hunger))`.
pub fn starvation_ceiling(hunger: u32, config: &VitalsConfig) -> Option<u32> {
    if hunger >= config.health_hunger_threshold {
        return None;
    }
    let deficit = config.health_hunger_threshold.saturating_sub(hunger);
    let half = config.max_vital.checked_div(2).unwrap_or(0);
    Some(half.saturating_sub(deficit).max(1))
}

/// Lower health to the starvation ceiling when it is above it.
///
/// Returns how much health was lost.
pub fn apply_health_rule(companion: &mut Companion, config: &VitalsConfig) -> u32 {
    let Some(ceiling) = starvation_ceiling(companion.hunger, config) else {
        return 0;
    };
    if companion.health <= ceiling {
        return 0;
    }
    let lost = companion.health.saturating_sub(ceiling);
    debug!(
        companion_id = %companion.id,
        hunger = companion.hunger,
        from = companion.health,
        to = ceiling,
        "starvation lowered health"
    );
    companion.health = ceiling;
    lost
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_only_below_threshold() {
        let cfg = VitalsConfig::default();
        assert_eq!(starvation_ceiling(5, &cfg), None);
        assert_eq!(starvation_ceiling(10, &cfg), None);
        assert_eq!(starvation_ceiling(4, &cfg), Some(4));
        assert_eq!(starvation_ceiling(3, &cfg), Some(3));
        assert_eq!(starvation_ceiling(0, &cfg), Some(1));
    }

    #[test]
    fn ceiling_never_below_one() {
        let cfg = VitalsConfig {
            max_vital: 4,
            ..VitalsConfig::default()
        };
        assert_eq!(starvation_ceiling(0, &cfg), Some(1));
    }
}
