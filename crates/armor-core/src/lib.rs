#![deny(warnings)]

//! Core domain models and invariants for the armor damage engine.
//!
//! This crate defines the serializable weapon/ammo profiles, protective gear
//! and combatant types shared by the resolver and the simulation loop, plus
//! validation helpers and the single decimal rounding point, [`quantize`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Highest protection tier a helmet or body armor can carry.
pub const MAX_PROTECTION_LEVEL: u8 = 6;

/// Longest engagement distance accepted by the engine, in meters.
pub const MAX_DISTANCE_M: i64 = 400;

/// Largest magnitude accepted for any damage, multiplier, durability or time
/// field. Products of bounded fields stay far inside `Decimal`'s range.
pub const MAX_MAGNITUDE: i64 = 1_000_000;

/// Health of a combatant at the start of a simulation.
pub fn starting_health() -> Decimal {
    Decimal::new(100, 0)
}

/// Round `value` half-up (ties away from zero) to `places` decimal digits.
///
/// The result always carries exactly `places` digits so that it displays the
/// same way the game does, e.g. `10.3` at two places prints as `10.30`.
///
/// Example:
/// let d = quantize(Decimal::new(57375, 3), 2); // 57.375
/// assert_eq!(d, Decimal::new(5738, 2));
pub fn quantize(value: Decimal, places: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(places);
    rounded
}

/// Fixed output precision of each semantic quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    /// Health damage, 2 dp.
    Damage,
    /// Protective item durability, 1 dp.
    Durability,
    /// Elapsed milliseconds, 2 dp.
    Time,
    /// Ratios shown to the user, 2 dp.
    Ratio,
}

impl Precision {
    pub const fn places(self) -> u32 {
        match self {
            Precision::Damage => 2,
            Precision::Durability => 1,
            Precision::Time => 2,
            Precision::Ratio => 2,
        }
    }

    pub fn apply(self, value: Decimal) -> Decimal {
        quantize(value, self.places())
    }
}

/// Caller-supplied data outside its documented domain.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    /// Location text not among the canonical body locations.
    #[error("unknown hit location: {0:?}")]
    UnknownLocation(String),
    /// Distance negative or beyond the supported range.
    #[error("distance {0} m is outside [0, 400]")]
    DistanceOutOfRange(Decimal),
    /// Protection tier above the highest tier.
    #[error("protection level {0} is outside [0, 6]")]
    ProtectionLevelOutOfRange(u8),
    /// A numeric field that must be >= 0 was negative.
    #[error("{0} must not be negative")]
    Negative(&'static str),
    /// Current durability outside `[0, max]`.
    #[error("durability {current} is outside [0, {max}]")]
    DurabilityOutOfRange { current: Decimal, max: Decimal },
    /// Rate of fire must be strictly positive.
    #[error("rounds per minute must be > 0, got {0}")]
    NonPositiveFireRate(Decimal),
    /// Breakpoint table is empty, unsorted or has a multiplier outside (0, 1].
    #[error("invalid distance decay table: {0}")]
    InvalidDecayTable(&'static str),
    /// Item placed in a slot it cannot occupy.
    #[error("{item} cannot be worn as {slot}")]
    WrongSlot { item: String, slot: Slot },
    /// A numeric field above `MAX_MAGNITUDE`.
    #[error("{0} exceeds {MAX_MAGNITUDE}")]
    TooLarge(&'static str),
}

/// Canonical body locations a hit can land on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Location {
    Head,
    Chest,
    Abdomen,
    LowerAbdomen,
    UpperArm,
    Forearm,
    Thigh,
    Calf,
}

impl Location {
    /// All locations in display order.
    pub const ALL: [Location; 8] = [
        Location::Head,
        Location::Chest,
        Location::Abdomen,
        Location::LowerAbdomen,
        Location::UpperArm,
        Location::Forearm,
        Location::Thigh,
        Location::Calf,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Location::Head => "head",
            Location::Chest => "chest",
            Location::Abdomen => "abdomen",
            Location::LowerAbdomen => "lower-abdomen",
            Location::UpperArm => "upper-arm",
            Location::Forearm => "forearm",
            Location::Thigh => "thigh",
            Location::Calf => "calf",
        }
    }

    /// In-game label.
    pub const fn label_zh(self) -> &'static str {
        match self {
            Location::Head => "头部",
            Location::Chest => "胸部",
            Location::Abdomen => "腹部",
            Location::LowerAbdomen => "下腹部",
            Location::UpperArm => "大臂",
            Location::Forearm => "小臂",
            Location::Thigh => "大腿",
            Location::Calf => "小腿",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Location {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('_', "-");
        Location::ALL
            .into_iter()
            .find(|l| l.name() == key || l.label_zh() == key)
            .ok_or_else(|| InputError::UnknownLocation(s.trim().to_string()))
    }
}

/// One incoming shot: a hit on a location, or a miss.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HitEvent {
    Hit(Location),
    Miss,
}

impl HitEvent {
    pub fn location(self) -> Option<Location> {
        match self {
            HitEvent::Hit(l) => Some(l),
            HitEvent::Miss => None,
        }
    }
}

impl fmt::Display for HitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitEvent::Hit(l) => l.fmt(f),
            HitEvent::Miss => f.write_str("miss"),
        }
    }
}

impl FromStr for HitEvent {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "miss" | "未命中" => Ok(HitEvent::Miss),
            _ => s.parse::<Location>().map(HitEvent::Hit),
        }
    }
}

/// Per-location damage multipliers of a weapon.
///
/// There is no lower-abdomen field: it always uses the abdomen multiplier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationMultipliers {
    pub head: Decimal,
    pub chest: Decimal,
    pub abdomen: Decimal,
    pub upper_arm: Decimal,
    pub forearm: Decimal,
    pub thigh: Decimal,
    pub calf: Decimal,
}

impl LocationMultipliers {
    /// Same multiplier on every limb, 1.0 on the torso.
    pub fn with_limbs(head: Decimal, limbs: Decimal) -> Self {
        Self {
            head,
            chest: Decimal::ONE,
            abdomen: Decimal::ONE,
            upper_arm: limbs,
            forearm: limbs,
            thigh: limbs,
            calf: limbs,
        }
    }

    pub fn get(&self, location: Location) -> Decimal {
        match location {
            Location::Head => self.head,
            Location::Chest => self.chest,
            Location::Abdomen | Location::LowerAbdomen => self.abdomen,
            Location::UpperArm => self.upper_arm,
            Location::Forearm => self.forearm,
            Location::Thigh => self.thigh,
            Location::Calf => self.calf,
        }
    }
}

/// One row of a breakpoint decay table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayPoint {
    /// Breakpoint distance in meters.
    pub distance: Decimal,
    /// Multiplier applied once `distance` is exceeded.
    pub multiplier: Decimal,
}

/// Distance-based weapon damage decay.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistanceDecay {
    /// No decay at any distance.
    #[default]
    None,
    /// Full damage up to `max_distance`, `reduced` beyond it.
    Threshold {
        max_distance: Decimal,
        reduced: Decimal,
    },
    /// Ordered breakpoints, nearest first.
    Breakpoints { points: Vec<DecayPoint> },
}

/// Ammo attenuation of armor damage against each protection tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmorAttenuation {
    /// Same factor against every tier.
    Constant(Decimal),
    /// Factors for tiers 1..=6.
    PerTier([Decimal; 6]),
}

impl ArmorAttenuation {
    pub fn for_level(&self, level: u8) -> Decimal {
        match self {
            ArmorAttenuation::Constant(c) => *c,
            ArmorAttenuation::PerTier(t) => {
                let idx = level.clamp(1, MAX_PROTECTION_LEVEL) - 1;
                t[usize::from(idx)]
            }
        }
    }

    fn factors(&self) -> &[Decimal] {
        match self {
            ArmorAttenuation::Constant(c) => std::slice::from_ref(c),
            ArmorAttenuation::PerTier(t) => t.as_slice(),
        }
    }
}

/// How ammo fares against armor of a higher tier than its penetration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderPenetration {
    /// `max(0.02, 0.16 - 0.02 * tier gap)`.
    #[default]
    Formula,
    /// Flat rate per protection tier 1..=6.
    Table([Decimal; 6]),
}

/// Ammo-specific rates replacing the built-in same-tier and next-tier rates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierOverrides {
    pub same_tier: Decimal,
    pub next_tier: Decimal,
}

/// Penetration behaviour selected per ammunition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PenetrationRules {
    #[serde(default)]
    pub under: UnderPenetration,
    #[serde(default)]
    pub overrides: Option<TierOverrides>,
}

/// Trigger discipline used for elapsed-time accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    /// Trigger delay once, then one interval per follow-up shot.
    Automatic,
    /// Trigger delay on every shot plus the interval between shots.
    SemiAutomatic,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    IntervalMs(Decimal),
    RoundsPerMinute(Decimal),
}

/// Fire-control parameters of a weapon.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FireControl {
    pub mode: FireMode,
    pub trigger_delay_ms: Decimal,
    pub cadence: Cadence,
}

impl FireControl {
    /// No trigger delay and no interval; time never accumulates.
    pub fn untimed() -> Self {
        Self {
            mode: FireMode::SemiAutomatic,
            trigger_delay_ms: Decimal::ZERO,
            cadence: Cadence::IntervalMs(Decimal::ZERO),
        }
    }

    /// Milliseconds between consecutive shots, rounded to 2 dp when derived
    /// from a rate of fire.
    pub fn shot_interval_ms(&self) -> Decimal {
        match self.cadence {
            Cadence::IntervalMs(ms) => ms,
            Cadence::RoundsPerMinute(rpm) if rpm > Decimal::ZERO => {
                Precision::Time.apply(Decimal::new(60_000, 0) / rpm)
            }
            Cadence::RoundsPerMinute(_) => Decimal::ZERO,
        }
    }
}

/// Immutable damage profile of one weapon + ammo + fire-mode combination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageProfile {
    /// Display name, e.g. "M4A1 / M855".
    pub name: String,
    pub base_damage: Decimal,
    pub armor_damage: Decimal,
    pub damage_multiplier: Decimal,
    pub armor_multiplier: Decimal,
    pub penetration_level: u8,
    pub locations: LocationMultipliers,
    #[serde(default)]
    pub decay: DistanceDecay,
    pub attenuation: ArmorAttenuation,
    #[serde(default)]
    pub penetration: PenetrationRules,
    /// Ignore armor entirely: unarmored damage, no durability consumed.
    #[serde(default)]
    pub bypass_armor: bool,
    /// Flat reduction `1 - level * step` on armored damage for tiers >= 2.
    #[serde(default)]
    pub tier_reduction_step: Option<Decimal>,
    pub fire_control: FireControl,
}

/// Body armor cut, deciding which locations it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmorClass {
    /// Chest and abdomen.
    Half,
    /// Adds the lower abdomen.
    Full,
    /// Adds the upper arms.
    Heavy,
}

impl ArmorClass {
    pub fn covers(self, location: Location) -> bool {
        match location {
            Location::Chest | Location::Abdomen => true,
            Location::LowerAbdomen => matches!(self, ArmorClass::Full | ArmorClass::Heavy),
            Location::UpperArm => self == ArmorClass::Heavy,
            _ => false,
        }
    }
}

/// Equipment slot a protective item occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Helmet,
    Armor,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Slot::Helmet => "helmet",
            Slot::Armor => "armor",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Helmet,
    BodyArmor(ArmorClass),
}

/// A helmet or body armor with its current durability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveItem {
    pub name: String,
    pub kind: ItemKind,
    pub protection_level: u8,
    pub max_durability: Decimal,
    current_durability: Decimal,
}

impl ProtectiveItem {
    pub fn new(
        name: impl Into<String>,
        kind: ItemKind,
        protection_level: u8,
        max_durability: Decimal,
        current_durability: Decimal,
    ) -> Result<Self, InputError> {
        if protection_level > MAX_PROTECTION_LEVEL {
            return Err(InputError::ProtectionLevelOutOfRange(protection_level));
        }
        check_magnitude(max_durability, "max durability")?;
        let max_durability = Precision::Durability.apply(max_durability);
        let current_durability = Precision::Durability.apply(current_durability);
        if current_durability < Decimal::ZERO || current_durability > max_durability {
            return Err(InputError::DurabilityOutOfRange {
                current: current_durability,
                max: max_durability,
            });
        }
        Ok(Self {
            name: name.into(),
            kind,
            protection_level,
            max_durability,
            current_durability,
        })
    }

    pub fn slot(&self) -> Slot {
        match self.kind {
            ItemKind::Helmet => Slot::Helmet,
            ItemKind::BodyArmor(_) => Slot::Armor,
        }
    }

    pub fn covers(&self, location: Location) -> bool {
        match self.kind {
            ItemKind::Helmet => location == Location::Head,
            ItemKind::BodyArmor(class) => class.covers(location),
        }
    }

    /// Has a tier and durability left.
    pub fn is_intact(&self) -> bool {
        self.protection_level > 0 && self.current_durability > Decimal::ZERO
    }

    /// Would intercept a hit on `location` right now.
    pub fn defends(&self, location: Location) -> bool {
        self.is_intact() && self.covers(location)
    }

    pub fn current_durability(&self) -> Decimal {
        self.current_durability
    }

    /// Lower durability to `remaining`, kept at 1 dp. Durability never rises
    /// and never drops below zero.
    pub fn wear_to(&mut self, remaining: Decimal) {
        let remaining = Precision::Durability.apply(remaining.max(Decimal::ZERO));
        self.current_durability = remaining.min(self.current_durability);
    }
}

/// The target of a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    health: Decimal,
    helmet: Option<ProtectiveItem>,
    armor: Option<ProtectiveItem>,
}

impl Combatant {
    /// Full-health combatant wearing the given gear.
    pub fn new(
        helmet: Option<ProtectiveItem>,
        armor: Option<ProtectiveItem>,
    ) -> Result<Self, InputError> {
        for (item, slot) in [(&helmet, Slot::Helmet), (&armor, Slot::Armor)] {
            if let Some(item) = item {
                if item.slot() != slot {
                    return Err(InputError::WrongSlot {
                        item: item.name.clone(),
                        slot,
                    });
                }
            }
        }
        Ok(Self {
            health: starting_health(),
            helmet,
            armor,
        })
    }

    pub fn unarmored() -> Self {
        Self {
            health: starting_health(),
            helmet: None,
            armor: None,
        }
    }

    pub fn health(&self) -> Decimal {
        self.health
    }

    pub fn is_dead(&self) -> bool {
        self.health <= Decimal::ZERO
    }

    pub fn helmet(&self) -> Option<&ProtectiveItem> {
        self.helmet.as_ref()
    }

    pub fn armor(&self) -> Option<&ProtectiveItem> {
        self.armor.as_ref()
    }

    /// The item whose slot defends `location`, whether or not it covers it.
    pub fn defender_for(&self, location: Location) -> Option<&ProtectiveItem> {
        match location {
            Location::Head => self.helmet.as_ref(),
            _ => self.armor.as_ref(),
        }
    }

    pub fn item_mut(&mut self, slot: Slot) -> Option<&mut ProtectiveItem> {
        match slot {
            Slot::Helmet => self.helmet.as_mut(),
            Slot::Armor => self.armor.as_mut(),
        }
    }

    /// Subtract `amount` from health; health may go negative.
    pub fn take_damage(&mut self, amount: Decimal) {
        self.health -= amount;
    }
}

/// Result of one shot as seen by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitOutcome {
    pub event: HitEvent,
    /// Damage dealt to health, 2 dp.
    pub damage_to_health: Decimal,
    /// Durability removed from the struck item, 1 dp.
    pub durability_consumed: Decimal,
    pub item_destroyed: bool,
    /// Total elapsed time since the first shot, 2 dp.
    pub elapsed_time_ms: Decimal,
    pub is_miss: bool,
    /// Slot whose item intercepted the hit.
    pub slot: Option<Slot>,
    pub remaining_durability: Option<Decimal>,
    pub penetration_rate: Option<Decimal>,
    /// Share of a partial breakthrough the armor still absorbed, 2 dp.
    pub absorbed_ratio: Option<Decimal>,
    pub bypassed: bool,
}

fn check_magnitude(value: Decimal, field: &'static str) -> Result<(), InputError> {
    if value < Decimal::ZERO {
        return Err(InputError::Negative(field));
    }
    if value > Decimal::from(MAX_MAGNITUDE) {
        return Err(InputError::TooLarge(field));
    }
    Ok(())
}

/// Validate an engagement distance.
pub fn validate_distance(distance: Decimal) -> Result<(), InputError> {
    if distance < Decimal::ZERO || distance > Decimal::new(MAX_DISTANCE_M, 0) {
        return Err(InputError::DistanceOutOfRange(distance));
    }
    Ok(())
}

/// Validate a decay table.
pub fn validate_decay(decay: &DistanceDecay) -> Result<(), InputError> {
    let in_range = |m: Decimal| m > Decimal::ZERO && m <= Decimal::ONE;
    match decay {
        DistanceDecay::None => Ok(()),
        DistanceDecay::Threshold {
            max_distance,
            reduced,
        } => {
            if *max_distance < Decimal::ZERO {
                return Err(InputError::Negative("decay threshold"));
            }
            if !in_range(*reduced) {
                return Err(InputError::InvalidDecayTable("multiplier outside (0, 1]"));
            }
            Ok(())
        }
        DistanceDecay::Breakpoints { points } => {
            if points.is_empty() {
                return Err(InputError::InvalidDecayTable("no breakpoints"));
            }
            if points.windows(2).any(|w| w[0].distance >= w[1].distance) {
                return Err(InputError::InvalidDecayTable("breakpoints not increasing"));
            }
            if points.iter().any(|p| !in_range(p.multiplier)) {
                return Err(InputError::InvalidDecayTable("multiplier outside (0, 1]"));
            }
            Ok(())
        }
    }
}

/// Validate fire-control parameters.
pub fn validate_fire_control(fc: &FireControl) -> Result<(), InputError> {
    check_magnitude(fc.trigger_delay_ms, "trigger delay")?;
    match fc.cadence {
        Cadence::IntervalMs(ms) => check_magnitude(ms, "shot interval"),
        Cadence::RoundsPerMinute(rpm) if rpm <= Decimal::ZERO => {
            Err(InputError::NonPositiveFireRate(rpm))
        }
        // 60000 / rpm must stay within bounds as an interval
        Cadence::RoundsPerMinute(rpm) if rpm < Decimal::new(6, 2) => {
            Err(InputError::TooLarge("shot interval"))
        }
        Cadence::RoundsPerMinute(rpm) => check_magnitude(rpm, "rounds per minute"),
    }
}

/// Validate a damage profile, including its decay table and fire control.
pub fn validate_profile(p: &DamageProfile) -> Result<(), InputError> {
    let scalars = [
        (p.base_damage, "base damage"),
        (p.armor_damage, "armor damage"),
        (p.damage_multiplier, "damage multiplier"),
        (p.armor_multiplier, "armor multiplier"),
    ];
    for (value, field) in scalars {
        check_magnitude(value, field)?;
    }
    for l in Location::ALL {
        check_magnitude(p.locations.get(l), "location multiplier")?;
    }
    for f in p.attenuation.factors() {
        check_magnitude(*f, "armor attenuation")?;
    }
    if let UnderPenetration::Table(rates) = &p.penetration.under {
        for r in rates {
            check_magnitude(*r, "penetration rate")?;
        }
    }
    if let Some(o) = &p.penetration.overrides {
        check_magnitude(o.same_tier, "penetration rate")?;
        check_magnitude(o.next_tier, "penetration rate")?;
    }
    if let Some(step) = p.tier_reduction_step {
        check_magnitude(step, "tier reduction step")?;
    }
    validate_decay(&p.decay)?;
    validate_fire_control(&p.fire_control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn body_armor(class: ArmorClass, current: i64) -> ProtectiveItem {
        ProtectiveItem::new(
            "FS Vest",
            ItemKind::BodyArmor(class),
            4,
            Decimal::new(100, 0),
            Decimal::new(current, 0),
        )
        .unwrap()
    }

    fn profile() -> DamageProfile {
        DamageProfile {
            name: "M4A1 / M855".to_string(),
            base_damage: Decimal::new(38, 0),
            armor_damage: Decimal::new(40, 0),
            damage_multiplier: Decimal::ONE,
            armor_multiplier: Decimal::ONE,
            penetration_level: 4,
            locations: LocationMultipliers::with_limbs(Decimal::new(19, 1), Decimal::new(45, 2)),
            decay: DistanceDecay::Breakpoints {
                points: vec![
                    DecayPoint {
                        distance: Decimal::new(50, 0),
                        multiplier: Decimal::new(9, 1),
                    },
                    DecayPoint {
                        distance: Decimal::new(100, 0),
                        multiplier: Decimal::new(8, 1),
                    },
                ],
            },
            attenuation: ArmorAttenuation::PerTier([Decimal::ONE; 6]),
            penetration: PenetrationRules::default(),
            bypass_armor: false,
            tier_reduction_step: None,
            fire_control: FireControl {
                mode: FireMode::Automatic,
                trigger_delay_ms: Decimal::new(50, 0),
                cadence: Cadence::RoundsPerMinute(Decimal::new(800, 0)),
            },
        }
    }

    #[test]
    fn quantize_rounds_half_up() {
        assert_eq!(quantize(Decimal::new(57375, 3), 2), Decimal::new(5738, 2));
        assert_eq!(quantize(Decimal::new(49725, 3), 1), Decimal::new(497, 1));
        assert_eq!(quantize(Decimal::new(10275, 3), 1), Decimal::new(103, 1));
        assert_eq!(quantize(Decimal::new(-25, 1), 0), Decimal::new(-3, 0));
    }

    #[test]
    fn quantize_pads_to_fixed_places() {
        let d = quantize(Decimal::new(103, 1), 2);
        assert_eq!(d.to_string(), "10.30");
        assert_eq!(Precision::Durability.apply(Decimal::new(60, 0)).to_string(), "60.0");
    }

    #[test]
    fn parse_locations_and_events() {
        assert_eq!("Chest".parse::<Location>().unwrap(), Location::Chest);
        assert_eq!(
            "lower_abdomen".parse::<Location>().unwrap(),
            Location::LowerAbdomen
        );
        assert_eq!("小腿".parse::<Location>().unwrap(), Location::Calf);
        assert_eq!("未命中".parse::<HitEvent>().unwrap(), HitEvent::Miss);
        assert_eq!(
            " head ".parse::<HitEvent>().unwrap(),
            HitEvent::Hit(Location::Head)
        );
        assert_eq!(
            "neck".parse::<HitEvent>(),
            Err(InputError::UnknownLocation("neck".to_string()))
        );
    }

    #[test]
    fn lower_abdomen_uses_abdomen_multiplier() {
        let mut m = LocationMultipliers::with_limbs(Decimal::new(2, 0), Decimal::new(5, 1));
        m.abdomen = Decimal::new(9, 1);
        assert_eq!(m.get(Location::LowerAbdomen), m.get(Location::Abdomen));
    }

    #[test]
    fn armor_class_coverage() {
        let half = body_armor(ArmorClass::Half, 50);
        let full = body_armor(ArmorClass::Full, 50);
        let heavy = body_armor(ArmorClass::Heavy, 50);
        assert!(half.covers(Location::Abdomen) && !half.covers(Location::LowerAbdomen));
        assert!(full.covers(Location::LowerAbdomen) && !full.covers(Location::UpperArm));
        assert!(heavy.covers(Location::UpperArm) && !heavy.covers(Location::Forearm));
        assert!(!heavy.covers(Location::Head));
    }

    #[test]
    fn helmet_defends_only_head_while_intact() {
        let mut helmet = ProtectiveItem::new(
            "DICH",
            ItemKind::Helmet,
            5,
            Decimal::new(45, 0),
            Decimal::new(10, 0),
        )
        .unwrap();
        assert!(helmet.defends(Location::Head));
        assert!(!helmet.defends(Location::Chest));
        helmet.wear_to(Decimal::new(-3, 0));
        assert_eq!(helmet.current_durability(), Decimal::ZERO);
        assert!(!helmet.defends(Location::Head));
    }

    #[test]
    fn wear_never_raises_durability() {
        let mut vest = body_armor(ArmorClass::Half, 30);
        vest.wear_to(Decimal::new(80, 0));
        assert_eq!(vest.current_durability(), Decimal::new(30, 0));
    }

    #[test]
    fn item_rejects_bad_durability_and_level() {
        let over = ProtectiveItem::new(
            "x",
            ItemKind::Helmet,
            3,
            Decimal::new(40, 0),
            Decimal::new(41, 0),
        );
        assert!(matches!(over, Err(InputError::DurabilityOutOfRange { .. })));
        let tier = ProtectiveItem::new("x", ItemKind::Helmet, 7, Decimal::ONE, Decimal::ONE);
        assert_eq!(tier, Err(InputError::ProtectionLevelOutOfRange(7)));
    }

    #[test]
    fn combatant_rejects_swapped_slots() {
        let vest = body_armor(ArmorClass::Full, 20);
        let err = Combatant::new(Some(vest), None).unwrap_err();
        assert!(matches!(err, InputError::WrongSlot { slot: Slot::Helmet, .. }));
        let c = Combatant::new(None, Some(body_armor(ArmorClass::Full, 20))).unwrap();
        assert_eq!(c.health(), Decimal::new(100, 0));
        assert!(c.defender_for(Location::Head).is_none());
        assert!(c.defender_for(Location::Calf).is_some());
    }

    #[test]
    fn shot_interval_from_rate_of_fire() {
        let fc = FireControl {
            mode: FireMode::Automatic,
            trigger_delay_ms: Decimal::ZERO,
            cadence: Cadence::RoundsPerMinute(Decimal::new(857, 0)),
        };
        // 60000 / 857 = 70.0116...
        assert_eq!(fc.shot_interval_ms(), Decimal::new(7001, 2));
        assert_eq!(FireControl::untimed().shot_interval_ms(), Decimal::ZERO);
    }

    #[test]
    fn per_tier_attenuation_lookup() {
        let a = ArmorAttenuation::PerTier([
            Decimal::new(9, 1),
            Decimal::new(9, 1),
            Decimal::new(9, 1),
            Decimal::ONE,
            Decimal::new(5, 1),
            Decimal::new(4, 1),
        ]);
        assert_eq!(a.for_level(3), Decimal::new(9, 1));
        assert_eq!(a.for_level(6), Decimal::new(4, 1));
        assert_eq!(
            ArmorAttenuation::Constant(Decimal::new(11, 1)).for_level(2),
            Decimal::new(11, 1)
        );
    }

    #[test]
    fn validate_profile_accepts_good_and_rejects_bad() {
        let p = profile();
        validate_profile(&p).unwrap();

        let mut bad = profile();
        bad.decay = DistanceDecay::Breakpoints {
            points: vec![
                DecayPoint {
                    distance: Decimal::new(100, 0),
                    multiplier: Decimal::new(9, 1),
                },
                DecayPoint {
                    distance: Decimal::new(50, 0),
                    multiplier: Decimal::new(8, 1),
                },
            ],
        };
        assert!(matches!(
            validate_profile(&bad),
            Err(InputError::InvalidDecayTable(_))
        ));

        let mut bad = profile();
        bad.fire_control.cadence = Cadence::RoundsPerMinute(Decimal::ZERO);
        assert_eq!(
            validate_profile(&bad),
            Err(InputError::NonPositiveFireRate(Decimal::ZERO))
        );

        let mut bad = profile();
        bad.armor_multiplier = Decimal::new(-1, 0);
        assert_eq!(
            validate_profile(&bad),
            Err(InputError::Negative("armor multiplier"))
        );
    }

    #[test]
    fn oversized_fields_are_rejected() {
        let mut bad = profile();
        bad.base_damage = Decimal::from_i128_with_scale(10i128.pow(20), 0);
        assert_eq!(validate_profile(&bad), Err(InputError::TooLarge("base damage")));

        let mut bad = profile();
        bad.fire_control.cadence = Cadence::RoundsPerMinute(Decimal::new(1, 20));
        assert_eq!(validate_profile(&bad), Err(InputError::TooLarge("shot interval")));

        let mut ok = profile();
        ok.fire_control.cadence = Cadence::RoundsPerMinute(Decimal::new(6, 2));
        validate_profile(&ok).unwrap();
        assert_eq!(ok.fire_control.shot_interval_ms(), Decimal::new(1_000_000, 0));
    }

    #[test]
    fn durability_is_kept_at_one_decimal() {
        let mut item = ProtectiveItem::new(
            "FS Vest",
            ItemKind::BodyArmor(ArmorClass::Half),
            3,
            Decimal::new(10004, 2),
            Decimal::new(6004, 2),
        )
        .unwrap();
        assert_eq!(item.max_durability, Decimal::new(1000, 1));
        assert_eq!(item.current_durability(), Decimal::new(600, 1));
        item.wear_to(Decimal::new(1036, 2));
        assert_eq!(item.current_durability(), Decimal::new(104, 1));

        // 100.04 rounds down to the max and is accepted
        let full = ProtectiveItem::new(
            "FS Vest",
            ItemKind::BodyArmor(ArmorClass::Half),
            3,
            Decimal::new(100, 0),
            Decimal::new(10004, 2),
        )
        .unwrap();
        assert_eq!(full.current_durability(), full.max_durability);
    }

    #[test]
    fn profile_json_roundtrip() {
        let p = profile();
        let s = serde_json::to_string(&p).unwrap();
        let back: DamageProfile = serde_json::from_str(&s).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn distance_domain() {
        assert!(validate_distance(Decimal::ZERO).is_ok());
        assert!(validate_distance(Decimal::new(400, 0)).is_ok());
        assert!(validate_distance(Decimal::new(4001, 1)).is_err());
        assert!(validate_distance(Decimal::new(-1, 1)).is_err());
    }

    proptest! {
        #[test]
        fn quantize_is_idempotent_and_close(mantissa in -10_000_000i64..10_000_000, scale in 0u32..6, places in 0u32..4) {
            let v = Decimal::new(mantissa, scale);
            let q = quantize(v, places);
            prop_assert_eq!(quantize(q, places), q);
            let half_step = Decimal::new(5, places + 1);
            prop_assert!((q - v).abs() <= half_step);
        }

        #[test]
        fn durability_never_negative(start in 0i64..1000, wear in -2000i64..2000) {
            let mut item = ProtectiveItem::new(
                "vest",
                ItemKind::BodyArmor(ArmorClass::Heavy),
                3,
                Decimal::new(1000, 0),
                Decimal::new(start, 1),
            ).unwrap();
            item.wear_to(Decimal::new(wear, 1));
            prop_assert!(item.current_durability() >= Decimal::ZERO);
            prop_assert!(item.current_durability() <= Decimal::new(start, 1));
        }
    }
}
