#![deny(warnings)]

//! Damage formulas for armored and unarmored hits.
//!
//! This crate provides pure helpers for:
//! - Penetration rates by tier difference, with per-ammo overrides
//! - Distance-based weapon damage decay
//! - Resolving one hit into health damage and durability consumed

use armor_core::{
    validate_distance, validate_profile, DamageProfile, DistanceDecay, HitEvent, InputError, Location,
    PenetrationRules, Precision, ProtectiveItem, Slot, UnderPenetration, MAX_PROTECTION_LEVEL,
};
use rust_decimal::Decimal;
use tracing::debug;

/// Penetration rate with the built-in rules.
///
/// Example:
/// assert_eq!(penetration_rate(3, 3, false), Decimal::new(75, 2));
/// assert_eq!(penetration_rate(1, 5, false), Decimal::new(8, 2));
pub fn penetration_rate(penetration_level: u8, protection_level: u8, is_head: bool) -> Decimal {
    penetration_rate_with(
        &PenetrationRules::default(),
        penetration_level,
        protection_level,
        is_head,
    )
}

/// Penetration rate under ammo-specific rules.
///
/// Below the protection tier the rate comes from the ammo's under-penetration
/// policy; at the same tier and one above, overrides (when present) replace
/// the head/body constants; two or more tiers above always yields 1.0.
pub fn penetration_rate_with(
    rules: &PenetrationRules,
    penetration_level: u8,
    protection_level: u8,
    is_head: bool,
) -> Decimal {
    if penetration_level < protection_level {
        return match &rules.under {
            UnderPenetration::Formula => {
                let gap = Decimal::from(protection_level - penetration_level);
                let rate = Decimal::new(16, 2) - Decimal::new(2, 2) * gap;
                rate.max(Decimal::new(2, 2))
            }
            UnderPenetration::Table(t) => {
                let idx = protection_level.min(MAX_PROTECTION_LEVEL) - 1;
                t[usize::from(idx)]
            }
        };
    }
    match (penetration_level - protection_level, &rules.overrides) {
        (0, Some(o)) => o.same_tier,
        (0, None) if is_head => Decimal::new(5, 1),
        (0, None) => Decimal::new(75, 2),
        (1, Some(o)) => o.next_tier,
        (1, None) if is_head => Decimal::new(75, 2),
        (1, None) => Decimal::new(9, 1),
        _ => Decimal::ONE,
    }
}

/// Weapon damage multiplier at `distance` meters.
///
/// Breakpoints are inclusive: at or below the first breakpoint there is no
/// decay, past breakpoint `i` the multiplier of breakpoint `i` applies, and
/// past the last one its multiplier applies.
pub fn weapon_decay(distance: Decimal, decay: &DistanceDecay) -> Result<Decimal, InputError> {
    validate_distance(distance)?;
    let multiplier = match decay {
        DistanceDecay::None => Decimal::ONE,
        DistanceDecay::Threshold {
            max_distance,
            reduced,
        } => {
            if distance <= *max_distance {
                Decimal::ONE
            } else {
                *reduced
            }
        }
        DistanceDecay::Breakpoints { points } => match points.first() {
            None => Decimal::ONE,
            Some(first) if distance <= first.distance => Decimal::ONE,
            Some(_) => points
                .windows(2)
                .find(|w| distance <= w[1].distance)
                .or_else(|| points.windows(1).last())
                .map_or(Decimal::ONE, |w| w[0].multiplier),
        },
    };
    Ok(multiplier)
}

/// Outcome of one resolved hit, before elapsed time is known.
#[derive(Clone, Debug, PartialEq)]
pub struct Impact {
    /// Damage to health, 2 dp.
    pub damage: Decimal,
    /// Durability removed from the struck item, 1 dp.
    pub durability_consumed: Decimal,
    /// Durability left on the struck item, 1 dp.
    pub remaining_durability: Option<Decimal>,
    pub item_destroyed: bool,
    pub slot: Option<Slot>,
    pub penetration_rate: Option<Decimal>,
    /// Fraction absorbed during a partial breakthrough, 2 dp.
    pub absorbed_ratio: Option<Decimal>,
    pub bypassed: bool,
    pub is_miss: bool,
}

impl Impact {
    pub fn miss() -> Self {
        Self {
            damage: Precision::Damage.apply(Decimal::ZERO),
            durability_consumed: Precision::Durability.apply(Decimal::ZERO),
            remaining_durability: None,
            item_destroyed: false,
            slot: None,
            penetration_rate: None,
            absorbed_ratio: None,
            bypassed: false,
            is_miss: true,
        }
    }

    fn unarmored(damage: Decimal) -> Self {
        Self {
            damage: Precision::Damage.apply(damage),
            is_miss: false,
            ..Self::miss()
        }
    }
}

/// Durability a hit from `profile` removes from intact armor of tier `level`
/// at `distance`, 1 dp.
pub fn armor_damage_value(
    profile: &DamageProfile,
    level: u8,
    distance: Decimal,
) -> Result<Decimal, InputError> {
    let decay = weapon_decay(distance, &profile.decay)?;
    Ok(armor_value(profile, level, decay))
}

fn armor_value(profile: &DamageProfile, level: u8, decay: Decimal) -> Decimal {
    Precision::Durability.apply(
        profile.armor_damage
            * profile.armor_multiplier
            * profile.attenuation.for_level(level)
            * decay,
    )
}

fn tier_reduction(profile: &DamageProfile, level: u8) -> Decimal {
    match profile.tier_reduction_step {
        Some(step) if level >= 2 => (Decimal::ONE - Decimal::from(level) * step).max(Decimal::ZERO),
        _ => Decimal::ONE,
    }
}

/// Resolve one hit against the item in the defending slot.
///
/// `defender` is the item worn in the slot that defends the hit location
/// (helmet for the head, body armor elsewhere); it only intercepts the hit if
/// it is intact and covers the location. The function is pure: the caller
/// writes `remaining_durability` back to the item.
///
/// Full absorption when durability >= armor damage value:
///   damage = base * dmg_mult * loc * rate * decay
/// Partial breakthrough otherwise, with ratio = durability / value:
///   damage = ratio * armored + (1 - ratio) * unarmored
pub fn resolve_hit(
    profile: &DamageProfile,
    event: HitEvent,
    distance: Decimal,
    defender: Option<&ProtectiveItem>,
) -> Result<Impact, InputError> {
    validate_profile(profile)?;
    let decay = weapon_decay(distance, &profile.decay)?;
    let location = match event {
        HitEvent::Miss => return Ok(Impact::miss()),
        HitEvent::Hit(location) => location,
    };
    let bare = profile.base_damage
        * profile.damage_multiplier
        * profile.locations.get(location)
        * decay;

    let Some(item) = defender.filter(|i| i.defends(location)) else {
        debug!(%location, %bare, "unprotected hit");
        return Ok(Impact::unarmored(bare));
    };
    let durability = item.current_durability();

    if profile.bypass_armor {
        debug!(%location, item = %item.name, "ammo bypasses armor");
        return Ok(Impact {
            slot: Some(item.slot()),
            remaining_durability: Some(durability),
            bypassed: true,
            ..Impact::unarmored(bare)
        });
    }

    let level = item.protection_level;
    let armor_value = armor_value(profile, level, decay);
    let rate = penetration_rate_with(
        &profile.penetration,
        profile.penetration_level,
        level,
        location == Location::Head,
    );
    let armored = bare * rate * tier_reduction(profile, level);

    // A zero armor value cannot form a ratio; the armor absorbs the hit.
    let (damage, remaining, ratio) = if armor_value.is_zero() || durability >= armor_value {
        (armored, (durability - armor_value).max(Decimal::ZERO), None)
    } else {
        let ratio = durability / armor_value;
        let blended = ratio * armored + (Decimal::ONE - ratio) * bare;
        (blended, Decimal::ZERO, Some(ratio))
    };
    let remaining = Precision::Durability.apply(remaining);
    let consumed = durability - remaining;

    debug!(
        %location,
        item = %item.name,
        level,
        %armor_value,
        %rate,
        ratio = ?ratio,
        %damage,
        %remaining,
        "protected hit"
    );

    Ok(Impact {
        damage: Precision::Damage.apply(damage),
        durability_consumed: Precision::Durability.apply(consumed),
        remaining_durability: Some(remaining),
        item_destroyed: remaining.is_zero(),
        slot: Some(item.slot()),
        penetration_rate: Some(rate),
        absorbed_ratio: ratio.map(|r| Precision::Ratio.apply(r)),
        bypassed: false,
        is_miss: false,
    })
}
