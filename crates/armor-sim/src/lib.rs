#![deny(warnings)]

//! Combat simulation loop: repeated hit resolution against one combatant.
//!
//! A [`CombatSim`] owns its [`Combatant`] and advances strictly one shot per
//! call to [`CombatSim::fire`]. Simulations share no state, so independent
//! scenarios can run on separate threads.

use armor_calc::{armor_damage_value, resolve_hit};
use armor_core::{
    starting_health, validate_distance, Combatant, DamageProfile, FireControl, FireMode,
    HitEvent, HitOutcome, InputError, ItemKind, Location, Precision, ProtectiveItem,
    MAX_PROTECTION_LEVEL,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// Errors produced by the simulation loop and scenario runners.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// The combatant is dead; no further shots are accepted.
    #[error("simulation already terminated")]
    Terminated,
    #[error(transparent)]
    Input(#[from] InputError),
    /// A combo or hit pattern with no entries.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimState {
    Running,
    Terminated,
}

/// Aggregate statistics of a simulation, emitted on death.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CombatSummary {
    pub shots: u32,
    pub hits: u32,
    pub misses: u32,
    /// Sum of health damage, 2 dp.
    pub total_damage: Decimal,
    /// Sum of durability consumed, 1 dp.
    pub total_armor_damage: Decimal,
    pub location_hits: BTreeMap<Location, u32>,
    /// Time from trigger pull to the last shot, 2 dp.
    pub elapsed_ms: Decimal,
    /// Health left, 2 dp; negative once overkilled.
    pub health: Decimal,
    pub helmet_durability: Option<Decimal>,
    pub armor_durability: Option<Decimal>,
    pub killed: bool,
}

/// Everything the caller learns from one shot.
#[derive(Clone, Debug, PartialEq)]
pub struct ShotReport {
    pub outcome: HitOutcome,
    /// Health after the shot, un-rounded.
    pub health: Decimal,
    /// Present exactly once: on the shot that kills.
    pub summary: Option<CombatSummary>,
}

/// Milliseconds added by the `shot_index`-th shot (1-based).
///
/// Automatic fire pays the trigger delay once; semi-automatic fire pays it
/// on every shot. Both add one shot interval per follow-up shot.
pub fn shot_time(fc: &FireControl, shot_index: u32) -> Decimal {
    let interval = if shot_index > 1 {
        fc.shot_interval_ms()
    } else {
        Decimal::ZERO
    };
    match fc.mode {
        FireMode::Automatic if shot_index == 1 => fc.trigger_delay_ms,
        FireMode::Automatic => interval,
        FireMode::SemiAutomatic => fc.trigger_delay_ms + interval,
    }
}

/// Total elapsed time after `shots` shots with one fire-control setting.
///
/// Automatic: `trigger + interval * (n - 1)`.
/// Semi-automatic: `trigger * n + interval * (n - 1)`.
pub fn elapsed_after(fc: &FireControl, shots: u32) -> Decimal {
    if shots == 0 {
        return Precision::Time.apply(Decimal::ZERO);
    }
    let n = Decimal::from(shots);
    let follow_ups = Decimal::from(shots - 1);
    let total = match fc.mode {
        FireMode::Automatic => fc.trigger_delay_ms + fc.shot_interval_ms() * follow_ups,
        FireMode::SemiAutomatic => fc.trigger_delay_ms * n + fc.shot_interval_ms() * follow_ups,
    };
    Precision::Time.apply(total)
}

/// Stateful driver for one combatant.
#[derive(Clone, Debug)]
pub struct CombatSim {
    combatant: Combatant,
    distance: Decimal,
    state: SimState,
    shots: u32,
    misses: u32,
    elapsed_ms: Decimal,
    total_damage: Decimal,
    total_armor_damage: Decimal,
    location_hits: BTreeMap<Location, u32>,
}

impl CombatSim {
    pub fn new(combatant: Combatant, distance: Decimal) -> Result<Self, SimError> {
        validate_distance(distance)?;
        let state = if combatant.is_dead() {
            SimState::Terminated
        } else {
            SimState::Running
        };
        Ok(Self {
            combatant,
            distance,
            state,
            shots: 0,
            misses: 0,
            elapsed_ms: Decimal::ZERO,
            total_damage: Decimal::ZERO,
            total_armor_damage: Decimal::ZERO,
            location_hits: BTreeMap::new(),
        })
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn combatant(&self) -> &Combatant {
        &self.combatant
    }

    pub fn shots(&self) -> u32 {
        self.shots
    }

    pub fn elapsed_ms(&self) -> Decimal {
        Precision::Time.apply(self.elapsed_ms)
    }

    /// Fire one shot with `profile`. Rejected shots leave the state untouched.
    pub fn fire(&mut self, profile: &DamageProfile, event: HitEvent) -> Result<ShotReport, SimError> {
        if self.state == SimState::Terminated {
            return Err(SimError::Terminated);
        }
        let defender = event
            .location()
            .and_then(|l| self.combatant.defender_for(l));
        let impact = resolve_hit(profile, event, self.distance, defender)?;

        self.shots += 1;
        self.elapsed_ms += shot_time(&profile.fire_control, self.shots);
        match event {
            HitEvent::Hit(location) => *self.location_hits.entry(location).or_insert(0) += 1,
            HitEvent::Miss => self.misses += 1,
        }

        if !impact.is_miss {
            self.combatant.take_damage(impact.damage);
            self.total_damage += impact.damage;
            self.total_armor_damage += impact.durability_consumed;
            if let (Some(slot), Some(remaining)) = (impact.slot, impact.remaining_durability) {
                if let Some(item) = self.combatant.item_mut(slot) {
                    item.wear_to(remaining);
                }
            }
        }

        let outcome = HitOutcome {
            event,
            damage_to_health: impact.damage,
            durability_consumed: impact.durability_consumed,
            item_destroyed: impact.item_destroyed,
            elapsed_time_ms: self.elapsed_ms(),
            is_miss: impact.is_miss,
            slot: impact.slot,
            remaining_durability: impact.remaining_durability,
            penetration_rate: impact.penetration_rate,
            absorbed_ratio: impact.absorbed_ratio,
            bypassed: impact.bypassed,
        };
        debug!(shot = self.shots, %event, damage = %outcome.damage_to_health, health = %self.combatant.health(), "shot resolved");

        let summary = if self.combatant.is_dead() {
            self.state = SimState::Terminated;
            let summary = self.summary();
            info!(
                shots = summary.shots,
                elapsed_ms = %summary.elapsed_ms,
                total_damage = %summary.total_damage,
                "combatant killed"
            );
            Some(summary)
        } else {
            None
        };
        Ok(ShotReport {
            outcome,
            health: self.combatant.health(),
            summary,
        })
    }

    /// Statistics so far; `killed` tells whether the simulation terminated.
    pub fn summary(&self) -> CombatSummary {
        let durability = |item: Option<&ProtectiveItem>| {
            item.map(|i| Precision::Durability.apply(i.current_durability()))
        };
        CombatSummary {
            shots: self.shots,
            hits: self.shots - self.misses,
            misses: self.misses,
            total_damage: Precision::Damage.apply(self.total_damage),
            total_armor_damage: Precision::Durability.apply(self.total_armor_damage),
            location_hits: self.location_hits.clone(),
            elapsed_ms: self.elapsed_ms(),
            health: Precision::Damage.apply(self.combatant.health()),
            helmet_durability: durability(self.combatant.helmet()),
            armor_durability: durability(self.combatant.armor()),
            killed: self.state == SimState::Terminated,
        }
    }
}

/// Profile used for the `shot`-th shot (0-based) of a combo.
fn combo_step(profiles: &[DamageProfile], shot: u32) -> Option<&DamageProfile> {
    let len = u32::try_from(profiles.len()).ok()?;
    profiles.get(usize::try_from(shot % len.max(1)).ok()?)
}

/// Replay `pattern` (cycled) until the combatant dies or `max_shots` is hit.
///
/// `profiles` are applied round-robin by shot index, misses included; pass a
/// single profile for ordinary weapons.
pub fn run_pattern(
    profiles: &[DamageProfile],
    combatant: Combatant,
    distance: Decimal,
    pattern: &[HitEvent],
    max_shots: u32,
) -> Result<CombatSummary, SimError> {
    if profiles.is_empty() {
        return Err(SimError::Empty("profile combo"));
    }
    if pattern.is_empty() {
        return Err(SimError::Empty("hit pattern"));
    }
    let mut sim = CombatSim::new(combatant, distance)?;
    for (shot, event) in (0..max_shots).zip(pattern.iter().cycle()) {
        let Some(profile) = combo_step(profiles, shot) else {
            break;
        };
        if let Some(summary) = sim.fire(profile, *event)?.summary {
            return Ok(summary);
        }
    }
    Ok(sim.summary())
}

/// Weighted distribution of hit events for sampling.
#[derive(Clone, Debug, PartialEq)]
pub struct HitDistribution {
    weights: Vec<(HitEvent, u32)>,
    total: u32,
}

impl HitDistribution {
    pub fn new(weights: Vec<(HitEvent, u32)>) -> Result<Self, SimError> {
        let total = weights
            .iter()
            .fold(0u32, |acc, (_, w)| acc.saturating_add(*w));
        if total == 0 {
            return Err(SimError::Empty("hit distribution"));
        }
        Ok(Self { weights, total })
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> HitEvent {
        let mut pick = rng.gen_range(0..self.total);
        for (event, weight) in &self.weights {
            if pick < *weight {
                return *event;
            }
            pick -= weight;
        }
        HitEvent::Miss
    }
}

/// Aggregate of seeded kill sampling.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KillSampling {
    pub trials: u32,
    pub kills: u32,
    /// Mean shots over killing trials, 2 dp.
    pub mean_shots: Option<Decimal>,
    /// Mean time to kill over killing trials, 2 dp.
    pub mean_elapsed_ms: Option<Decimal>,
    pub fastest_ms: Option<Decimal>,
    pub slowest_ms: Option<Decimal>,
}

/// Monte-Carlo time-to-kill over `trials` independent combatants.
///
/// Noise is seeded for reproducibility; each trial starts from a clone of
/// `combatant`.
pub fn sample_kills(
    profiles: &[DamageProfile],
    combatant: &Combatant,
    distance: Decimal,
    distribution: &HitDistribution,
    trials: u32,
    seed: u64,
    max_shots: u32,
) -> Result<KillSampling, SimError> {
    if profiles.is_empty() {
        return Err(SimError::Empty("profile combo"));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut kill_times = Vec::new();
    let mut kill_shots = 0u64;
    for _ in 0..trials {
        let mut sim = CombatSim::new(combatant.clone(), distance)?;
        for shot in 0..max_shots {
            let Some(profile) = combo_step(profiles, shot) else {
                break;
            };
            let event = distribution.sample(&mut rng);
            if let Some(summary) = sim.fire(profile, event)?.summary {
                kill_shots += u64::from(summary.shots);
                kill_times.push(summary.elapsed_ms);
                break;
            }
        }
    }
    let kills = u32::try_from(kill_times.len()).unwrap_or(u32::MAX);
    let mean = |sum: Decimal| {
        (kills > 0).then(|| Precision::Ratio.apply(sum / Decimal::from(kills)))
    };
    Ok(KillSampling {
        trials,
        kills,
        mean_shots: mean(Decimal::from(kill_shots)),
        mean_elapsed_ms: mean(kill_times.iter().copied().sum()),
        fastest_ms: kill_times.iter().copied().min(),
        slowest_ms: kill_times.iter().copied().max(),
    })
}

/// Smallest helmet durability at which a headshot volley no longer kills.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum KillThreshold {
    /// A volley of `shots` kills through any helmet of the ammo's tier.
    AlwaysKills { shots: u32 },
    /// A helmet with at least `durability` left survives a volley of `shots`.
    SurvivesFrom { shots: u32, durability: Decimal },
    /// Two rounds to the bare head still leave the target alive.
    CannotKill,
}

/// `profile` firing `shots` rounds at once, resolved as one impact.
fn volley(profile: &DamageProfile, shots: u32) -> DamageProfile {
    let n = Decimal::from(shots);
    DamageProfile {
        base_damage: profile.base_damage * n,
        armor_damage: profile.armor_damage * n,
        ..profile.clone()
    }
}

fn headshot(
    profile: &DamageProfile,
    level: u8,
    distance: Decimal,
    durability: Option<Decimal>,
) -> Result<Decimal, SimError> {
    let helmet = durability
        .map(|d| ProtectiveItem::new("helmet", ItemKind::Helmet, level, d, d))
        .transpose()?;
    let event = HitEvent::Hit(Location::Head);
    Ok(resolve_hit(profile, event, distance, helmet.as_ref())?.damage)
}

/// Minimum helmet durability that survives a one- or two-round headshot
/// volley from a full-health start.
///
/// The helmet's tier equals the ammo's penetration level (clamped to 1..=6).
/// Solving the partial-breakthrough blend for 100 damage gives
///   durability = value * (bare - 100) / (bare - armored)
/// whose 1 dp floor and ceiling are checked in that order against the
/// resolver.
pub fn min_surviving_durability(
    profile: &DamageProfile,
    distance: Decimal,
) -> Result<KillThreshold, SimError> {
    let level = profile.penetration_level.clamp(1, MAX_PROTECTION_LEVEL);
    let lethal = starting_health();
    for shots in 1..=2 {
        let v = volley(profile, shots);
        let value = armor_damage_value(&v, level, distance)?;
        let bare = headshot(&v, level, distance, None)?;
        let armored = headshot(&v, level, distance, Some(value.max(Decimal::new(1, 1))))?;
        if armored >= lethal {
            return Ok(KillThreshold::AlwaysKills { shots });
        }
        if bare < lethal {
            continue;
        }
        if bare == armored {
            return Ok(KillThreshold::AlwaysKills { shots });
        }
        let exact = value * (bare - lethal) / (bare - armored);
        let candidates = [
            RoundingStrategy::ToNegativeInfinity,
            RoundingStrategy::ToPositiveInfinity,
        ]
        .map(|strategy| exact.round_dp_with_strategy(1, strategy));
        for durability in candidates {
            if headshot(&v, level, distance, Some(durability))? < lethal {
                debug!(shots, %value, %exact, %durability, "kill threshold found");
                return Ok(KillThreshold::SurvivesFrom { shots, durability });
            }
        }
        return Ok(KillThreshold::AlwaysKills { shots });
    }
    Ok(KillThreshold::CannotKill)
}

/// Unarmored shots and time to kill for one hit location.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TtkRow {
    pub location: Location,
    /// Damage per hit, 2 dp.
    pub damage_per_shot: Decimal,
    /// `None` when the location takes no damage.
    pub shots_to_kill: Option<u32>,
    /// Time to kill with every shot on this location, 2 dp.
    pub time_to_kill_ms: Option<Decimal>,
}

/// Shots and time to kill an unarmored target, one row per location.
pub fn ttk_table(profile: &DamageProfile, distance: Decimal) -> Result<Vec<TtkRow>, SimError> {
    let health = starting_health();
    Location::ALL
        .into_iter()
        .map(|location| -> Result<TtkRow, SimError> {
            let damage = resolve_hit(profile, HitEvent::Hit(location), distance, None)?.damage;
            let shots_to_kill = (damage > Decimal::ZERO)
                .then(|| (health / damage).ceil().to_u32())
                .flatten();
            Ok(TtkRow {
                location,
                damage_per_shot: damage,
                shots_to_kill,
                time_to_kill_ms: shots_to_kill.map(|n| elapsed_after(&profile.fire_control, n)),
            })
        })
        .collect()
}
