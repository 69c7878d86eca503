#![deny(warnings)]

//! Weapon, ammunition, armor and melee catalogs.
//!
//! A catalog directory holds `weapons`, `ammo` and `armor` tables plus an
//! optional `melee` table, each as `.yaml`, `.yml` or `.json`. Entries are
//! looked up by id or by name, case-insensitively, and joined into
//! [`DamageProfile`]s for the resolver.

use armor_core::{
    validate_profile, ArmorAttenuation, ArmorClass, DamageProfile, DistanceDecay, FireControl,
    InputError, ItemKind, LocationMultipliers, PenetrationRules, ProtectiveItem,
    MAX_PROTECTION_LEVEL,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Melee strikes outclass every armor tier.
pub const MELEE_PENETRATION: u8 = MAX_PROTECTION_LEVEL + 2;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown weapon: {0}")]
    MissingWeapon(String),
    #[error("unknown ammo: {0}")]
    MissingAmmo(String),
    #[error("unknown helmet: {0}")]
    MissingHelmet(String),
    #[error("unknown body armor: {0}")]
    MissingArmor(String),
    #[error("unknown melee weapon: {0}")]
    MissingMelee(String),
    #[error("{ammo} ({ammo_caliber}) does not fit {weapon} ({weapon_caliber})")]
    CaliberMismatch {
        weapon: String,
        weapon_caliber: String,
        ammo: String,
        ammo_caliber: String,
    },
    #[error("duplicate {kind} id: {id}")]
    Duplicate { kind: &'static str, id: String },
    #[error("melee weapon {0} has no strikes")]
    NoStrikes(String),
    #[error("catalog has no {0} table (.yaml, .yml or .json)")]
    MissingTable(&'static str),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(String),
    #[error(transparent)]
    Invalid(#[from] InputError),
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::Io(e.to_string())
    }
}

/// Firearm or bow mode. Bow draw modes are separate entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSpec {
    pub id: String,
    pub name: String,
    pub category: String,
    pub caliber: String,
    pub base_damage: Decimal,
    pub armor_damage: Decimal,
    pub locations: LocationMultipliers,
    #[serde(default)]
    pub decay: DistanceDecay,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub fire_control: FireControl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmmoSpec {
    pub id: String,
    pub name: String,
    pub caliber: String,
    pub penetration_level: u8,
    pub damage_multiplier: Decimal,
    pub armor_multiplier: Decimal,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub attenuation: ArmorAttenuation,
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub penetration: PenetrationRules,
    /// Ignores armor entirely, e.g. magnum rifle rounds.
    #[serde(default)]
    pub bypass_armor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelmetSpec {
    pub id: String,
    pub name: String,
    pub protection_level: u8,
    pub max_durability: Decimal,
}

impl HelmetSpec {
    /// A helmet at `current` durability, or brand new.
    pub fn equip(&self, current: Option<Decimal>) -> Result<ProtectiveItem, InputError> {
        ProtectiveItem::new(
            self.name.clone(),
            ItemKind::Helmet,
            self.protection_level,
            self.max_durability,
            current.unwrap_or(self.max_durability),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorSpec {
    pub id: String,
    pub name: String,
    pub class: ArmorClass,
    pub protection_level: u8,
    pub max_durability: Decimal,
}

impl ArmorSpec {
    /// Body armor at `current` durability, or brand new.
    pub fn equip(&self, current: Option<Decimal>) -> Result<ProtectiveItem, InputError> {
        ProtectiveItem::new(
            self.name.clone(),
            ItemKind::BodyArmor(self.class),
            self.protection_level,
            self.max_durability,
            current.unwrap_or(self.max_durability),
        )
    }
}

/// One step of a melee combo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeleeStrike {
    pub damage: Decimal,
    pub armor_damage: Decimal,
    pub head: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeleeSpec {
    pub id: String,
    pub name: String,
    /// Multiplier shared by arms and legs.
    pub limbs: Decimal,
    #[serde(default)]
    pub tier_reduction_step: Option<Decimal>,
    pub strikes: Vec<MeleeStrike>,
}

impl MeleeSpec {
    fn strike_profile(&self, index: usize, strike: &MeleeStrike) -> DamageProfile {
        DamageProfile {
            name: format!("{} #{}", self.name, index + 1),
            base_damage: strike.damage,
            armor_damage: strike.armor_damage,
            damage_multiplier: Decimal::ONE,
            armor_multiplier: Decimal::ONE,
            penetration_level: MELEE_PENETRATION,
            locations: LocationMultipliers::with_limbs(strike.head, self.limbs),
            decay: DistanceDecay::None,
            attenuation: ArmorAttenuation::Constant(Decimal::ONE),
            penetration: PenetrationRules::default(),
            bypass_armor: false,
            tier_reduction_step: self.tier_reduction_step,
            fire_control: FireControl::untimed(),
        }
    }
}

#[derive(Deserialize)]
struct WeaponTable {
    weapons: Vec<WeaponSpec>,
}

#[derive(Deserialize)]
struct AmmoTable {
    ammo: Vec<AmmoSpec>,
}

#[derive(Deserialize)]
struct ArmorTable {
    #[serde(default)]
    helmets: Vec<HelmetSpec>,
    #[serde(default)]
    body_armor: Vec<ArmorSpec>,
}

#[derive(Deserialize)]
struct MeleeTable {
    melee: Vec<MeleeSpec>,
}

/// Catalog entry addressable by id or name.
trait Entry {
    const KIND: &'static str;
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

macro_rules! entry {
    ($ty:ty, $kind:literal) => {
        impl Entry for $ty {
            const KIND: &'static str = $kind;
            fn id(&self) -> &str {
                &self.id
            }
            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

entry!(WeaponSpec, "weapon");
entry!(AmmoSpec, "ammo");
entry!(HelmetSpec, "helmet");
entry!(ArmorSpec, "body armor");
entry!(MeleeSpec, "melee");

fn key(s: &str) -> String {
    s.trim().to_lowercase()
}

fn index<T: Entry>(items: Vec<T>) -> Result<BTreeMap<String, T>, CatalogError> {
    let mut map = BTreeMap::new();
    for item in items {
        let id = key(item.id());
        if map.contains_key(&id) {
            return Err(CatalogError::Duplicate {
                kind: T::KIND,
                id: item.id().to_string(),
            });
        }
        map.insert(id, item);
    }
    Ok(map)
}

fn lookup<'a, T: Entry>(
    map: &'a BTreeMap<String, T>,
    query: &str,
    missing: fn(String) -> CatalogError,
) -> Result<&'a T, CatalogError> {
    let k = key(query);
    map.get(&k)
        .or_else(|| map.values().find(|e| key(e.name()) == k))
        .ok_or_else(|| missing(query.trim().to_string()))
}

/// Canonical caliber text: no whitespace or dots, lower-case.
///
/// Example: `"5.56 x 45mm"` and `"556X45MM"` both become `"556x45mm"`.
pub fn normalize_caliber(caliber: &str) -> String {
    caliber
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_error(path: &Path, e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Parse(format!("{}: {e}", path.display()))
}

/// Read `<stem>.yaml`, `<stem>.yml` or `<stem>.json` from `dir`, first match wins.
fn read_table<T: DeserializeOwned>(dir: &Path, stem: &str) -> Result<Option<T>, CatalogError> {
    for ext in ["yaml", "yml", "json"] {
        let path = dir.join(format!("{stem}.{ext}"));
        if !path.is_file() {
            continue;
        }
        let text = fs::read_to_string(&path)?;
        let table = if ext == "json" {
            serde_json::from_str(&text).map_err(|e| parse_error(&path, e))?
        } else {
            serde_yaml::from_str(&text).map_err(|e| parse_error(&path, e))?
        };
        debug!(path = %path.display(), "read catalog table");
        return Ok(Some(table));
    }
    Ok(None)
}

/// Static game data, keyed by lower-cased id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    weapons: BTreeMap<String, WeaponSpec>,
    ammo: BTreeMap<String, AmmoSpec>,
    helmets: BTreeMap<String, HelmetSpec>,
    body_armor: BTreeMap<String, ArmorSpec>,
    melee: BTreeMap<String, MeleeSpec>,
}

impl Catalog {
    pub fn from_parts(
        weapons: Vec<WeaponSpec>,
        ammo: Vec<AmmoSpec>,
        helmets: Vec<HelmetSpec>,
        body_armor: Vec<ArmorSpec>,
        melee: Vec<MeleeSpec>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            weapons: index(weapons)?,
            ammo: index(ammo)?,
            helmets: index(helmets)?,
            body_armor: index(body_armor)?,
            melee: index(melee)?,
        })
    }

    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let weapons: WeaponTable =
            read_table(dir, "weapons")?.ok_or(CatalogError::MissingTable("weapons"))?;
        let ammo: AmmoTable = read_table(dir, "ammo")?.ok_or(CatalogError::MissingTable("ammo"))?;
        let armor: ArmorTable =
            read_table(dir, "armor")?.ok_or(CatalogError::MissingTable("armor"))?;
        let melee: Option<MeleeTable> = read_table(dir, "melee")?;
        let catalog = Self::from_parts(
            weapons.weapons,
            ammo.ammo,
            armor.helmets,
            armor.body_armor,
            melee.map(|m| m.melee).unwrap_or_default(),
        )?;
        info!(
            dir = %dir.display(),
            weapons = catalog.weapons.len(),
            ammo = catalog.ammo.len(),
            helmets = catalog.helmets.len(),
            body_armor = catalog.body_armor.len(),
            melee = catalog.melee.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn weapons(&self) -> impl Iterator<Item = &WeaponSpec> {
        self.weapons.values()
    }

    pub fn ammo_list(&self) -> impl Iterator<Item = &AmmoSpec> {
        self.ammo.values()
    }

    pub fn helmets(&self) -> impl Iterator<Item = &HelmetSpec> {
        self.helmets.values()
    }

    pub fn body_armor(&self) -> impl Iterator<Item = &ArmorSpec> {
        self.body_armor.values()
    }

    pub fn melee_weapons(&self) -> impl Iterator<Item = &MeleeSpec> {
        self.melee.values()
    }

    pub fn weapon(&self, id: &str) -> Result<&WeaponSpec, CatalogError> {
        lookup(&self.weapons, id, CatalogError::MissingWeapon)
    }

    pub fn ammo(&self, id: &str) -> Result<&AmmoSpec, CatalogError> {
        lookup(&self.ammo, id, CatalogError::MissingAmmo)
    }

    pub fn helmet_spec(&self, id: &str) -> Result<&HelmetSpec, CatalogError> {
        lookup(&self.helmets, id, CatalogError::MissingHelmet)
    }

    pub fn armor_spec(&self, id: &str) -> Result<&ArmorSpec, CatalogError> {
        lookup(&self.body_armor, id, CatalogError::MissingArmor)
    }

    pub fn melee(&self, id: &str) -> Result<&MeleeSpec, CatalogError> {
        lookup(&self.melee, id, CatalogError::MissingMelee)
    }

    /// Ammo that chambers in `weapon`.
    pub fn ammo_for(&self, weapon: &str) -> Result<Vec<&AmmoSpec>, CatalogError> {
        let caliber = normalize_caliber(&self.weapon(weapon)?.caliber);
        Ok(self
            .ammo
            .values()
            .filter(|a| normalize_caliber(&a.caliber) == caliber)
            .collect())
    }

    /// Join a weapon with a compatible ammo into a validated profile.
    pub fn profile(&self, weapon: &str, ammo: &str) -> Result<DamageProfile, CatalogError> {
        let w = self.weapon(weapon)?;
        let a = self.ammo(ammo)?;
        if normalize_caliber(&w.caliber) != normalize_caliber(&a.caliber) {
            return Err(CatalogError::CaliberMismatch {
                weapon: w.name.clone(),
                weapon_caliber: w.caliber.clone(),
                ammo: a.name.clone(),
                ammo_caliber: a.caliber.clone(),
            });
        }
        let profile = DamageProfile {
            name: format!("{} / {}", w.name, a.name),
            base_damage: w.base_damage,
            armor_damage: w.armor_damage,
            damage_multiplier: a.damage_multiplier,
            armor_multiplier: a.armor_multiplier,
            penetration_level: a.penetration_level,
            locations: w.locations.clone(),
            decay: w.decay.clone(),
            attenuation: a.attenuation.clone(),
            penetration: a.penetration.clone(),
            bypass_armor: a.bypass_armor,
            tier_reduction_step: None,
            fire_control: w.fire_control,
        };
        validate_profile(&profile)?;
        Ok(profile)
    }

    /// The combo of a melee weapon, one profile per strike.
    pub fn combo(&self, melee: &str) -> Result<Vec<DamageProfile>, CatalogError> {
        let m = self.melee(melee)?;
        if m.strikes.is_empty() {
            return Err(CatalogError::NoStrikes(m.name.clone()));
        }
        m.strikes
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let profile = m.strike_profile(i, s);
                validate_profile(&profile)?;
                Ok(profile)
            })
            .collect()
    }

    pub fn helmet(&self, id: &str, current: Option<Decimal>) -> Result<ProtectiveItem, CatalogError> {
        Ok(self.helmet_spec(id)?.equip(current)?)
    }

    pub fn armor(&self, id: &str, current: Option<Decimal>) -> Result<ProtectiveItem, CatalogError> {
        Ok(self.armor_spec(id)?.equip(current)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armor_core::{Cadence, Combatant, FireMode, HitEvent, Location, Slot, UnderPenetration};
    use std::path::PathBuf;

    fn fixtures() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/catalog")
    }

    fn catalog() -> Catalog {
        Catalog::load_dir(fixtures()).unwrap()
    }

    fn d(mantissa: i64, scale: u32) -> Decimal {
        Decimal::new(mantissa, scale)
    }

    #[test]
    fn loads_fixture_catalog() {
        let c = catalog();
        assert!(c.weapons().count() >= 5);
        assert!(c.ammo_list().any(|a| a.bypass_armor));
        assert!(c.helmets().count() >= 1);
        assert!(c.body_armor().count() >= 3);
        assert_eq!(c.melee_weapons().count(), 1);
    }

    #[test]
    fn missing_directory_has_no_tables() {
        let err = Catalog::load_dir(fixtures().join("does-not-exist")).unwrap_err();
        assert!(matches!(err, CatalogError::MissingTable("weapons")));
    }

    #[test]
    fn bow_profile_reproduces_vest_scenario() {
        let c = catalog();
        let p = c.profile("compound-bow-quick", "glass-fiber-arrow").unwrap();
        assert_eq!(p.fire_control.mode, FireMode::SemiAutomatic);
        let vest = c.armor("fs-vest", Some(d(60, 0))).unwrap();
        let hit = armor_calc::resolve_hit(
            &p,
            HitEvent::Hit(Location::Chest),
            d(30, 0),
            Some(&vest),
        )
        .unwrap();
        assert_eq!(hit.damage, d(5738, 2));
        assert_eq!(hit.remaining_durability, Some(d(103, 1)));
    }

    #[test]
    fn lookup_by_name_ignores_case() {
        let c = catalog();
        let by_id = c.weapon("m4a1").unwrap();
        let by_name = c.weapon(&by_id.name.to_uppercase()).unwrap();
        assert_eq!(by_id, by_name);
    }

    #[test]
    fn calibers_match_after_normalization() {
        assert_eq!(normalize_caliber("5.56 x 45mm"), "556x45mm");
        assert_eq!(normalize_caliber(" 556X45MM"), "556x45mm");
        let c = catalog();
        // fixture spells the rifle and ammo calibers differently
        assert!(c.profile("m4a1", "m855").is_ok());
        let names: Vec<&str> = c
            .ammo_for("m4a1")
            .unwrap()
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert!(names.contains(&"m855"));
        assert!(!names.contains(&"glass-fiber-arrow"));
    }

    #[test]
    fn caliber_mismatch_is_rejected() {
        let err = catalog().profile("m4a1", "glass-fiber-arrow").unwrap_err();
        assert!(matches!(err, CatalogError::CaliberMismatch { .. }));
    }

    #[test]
    fn unknown_ids_are_reported() {
        let c = catalog();
        assert!(matches!(c.weapon("nope"), Err(CatalogError::MissingWeapon(_))));
        assert!(matches!(c.ammo("nope"), Err(CatalogError::MissingAmmo(_))));
        assert!(matches!(c.helmet("nope", None), Err(CatalogError::MissingHelmet(_))));
        assert!(matches!(c.armor("nope", None), Err(CatalogError::MissingArmor(_))));
        assert!(matches!(c.combo("nope"), Err(CatalogError::MissingMelee(_))));
    }

    #[test]
    fn magnum_round_bypasses_armor() {
        let c = catalog();
        let p = c.profile("awm", "338-ap").unwrap();
        assert!(p.bypass_armor);
        let target =
            Combatant::new(Some(c.helmet("dich-1", None).unwrap()), None).unwrap();
        let hit = armor_calc::resolve_hit(
            &p,
            HitEvent::Hit(Location::Head),
            d(100, 0),
            target.defender_for(Location::Head),
        )
        .unwrap();
        assert!(hit.bypassed);
        assert_eq!(hit.slot, Some(Slot::Helmet));
        assert_eq!(hit.durability_consumed, Decimal::ZERO);
    }

    #[test]
    fn melee_expands_into_combo() {
        let c = catalog();
        let combo = c.combo("tactical-knife").unwrap();
        assert_eq!(combo.len(), 3);
        for p in &combo {
            assert_eq!(p.penetration_level, MELEE_PENETRATION);
            assert_eq!(p.locations.get(Location::Thigh), d(8, 1));
            assert_eq!(p.tier_reduction_step, Some(d(5, 2)));
        }
        assert!(combo[0].name.ends_with("#1"));
    }

    #[test]
    fn equip_defaults_to_full_durability() {
        let c = catalog();
        let vest = c.armor("fs-vest", None).unwrap();
        assert_eq!(vest.current_durability(), vest.max_durability);
        let err = c.armor("fs-vest", Some(d(1000, 0))).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Invalid(InputError::DurabilityOutOfRange { .. })
        ));
    }

    #[test]
    fn tagged_fields_parse_from_yaml_maps() {
        let yaml = "ammo:\n  - id: x\n    name: X\n    caliber: arrow\n    penetration_level: 4\n    damage_multiplier: 1.0\n    armor_multiplier: 1.0\n    attenuation:\n      per_tier: [1.0, 1.0, 1.0, 0.9, 0.6, 0.5]\n    penetration:\n      under:\n        table: [0.1, 0.1, 0.1, 0.1, 0.1, 0.1]\n";
        let table: AmmoTable = serde_yaml::from_str(yaml).unwrap();
        let ammo = &table.ammo[0];
        assert_eq!(ammo.attenuation.for_level(5), d(6, 1));
        assert_eq!(ammo.penetration.under, UnderPenetration::Table([d(1, 1); 6]));

        let yaml = "weapons:\n  - id: r\n    name: R\n    category: rifle\n    caliber: 556x45mm\n    base_damage: 30\n    armor_damage: 29\n    locations: {head: 2.1, chest: 1, abdomen: 0.9, upper_arm: 0.45, forearm: 0.45, thigh: 0.45, calf: 0.45}\n    fire_control:\n      mode: automatic\n      trigger_delay_ms: 50\n      cadence: {rounds_per_minute: 800}\n";
        let table: WeaponTable = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            table.weapons[0].fire_control.cadence,
            Cadence::RoundsPerMinute(d(800, 0))
        );
        let back = serde_json::to_value(&table.weapons[0]).unwrap();
        assert_eq!(back["fire_control"]["cadence"]["rounds_per_minute"], "800");
    }

    #[test]
    fn missing_multiplier_is_a_parse_error() {
        let yaml = "ammo:\n  - id: x\n    name: X\n    caliber: arrow\n    penetration_level: 3\n    damage_multiplier: 1.0\n    attenuation: {constant: 1.0}\n";
        assert!(serde_yaml::from_str::<AmmoTable>(yaml).is_err());
    }

    #[test]
    fn json_tables_are_accepted() {
        let json = r#"{"melee": [{"id": "axe", "name": "Axe", "limbs": 0.8,
            "strikes": [{"damage": 50, "armor_damage": 25, "head": 1.6}]}]}"#;
        let table: MeleeTable = serde_json::from_str(json).unwrap();
        let c = Catalog::from_parts(vec![], vec![], vec![], vec![], table.melee).unwrap();
        let combo = c.combo("AXE").unwrap();
        assert_eq!(combo[0].base_damage, d(50, 0));
        assert_eq!(combo[0].tier_reduction_step, None);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let helmet = HelmetSpec {
            id: "h".into(),
            name: "H".into(),
            protection_level: 2,
            max_durability: d(30, 0),
        };
        let err = Catalog::from_parts(vec![], vec![], vec![helmet.clone(), helmet], vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate { kind: "helmet", .. }));
    }

    #[test]
    fn invalid_profile_data_is_rejected() {
        let mut c = catalog();
        if let Some(w) = c.weapons.get_mut("m4a1") {
            w.base_damage = d(-1, 0);
        }
        assert!(matches!(
            c.profile("m4a1", "m855"),
            Err(CatalogError::Invalid(InputError::Negative("base damage")))
        ));
    }
}
